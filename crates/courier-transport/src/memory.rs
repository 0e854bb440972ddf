//! In-process star network.
//!
//! One hub peer is linked to every spoke; spokes reach each other only
//! through the hub. Each peer gets a [`MemoryPeer`] handle implementing
//! [`Network`] and a [`NetworkEvents`] stream. Delivery is immediate and
//! preserves each sender's program order.

use crate::traits::{Network, NetworkEvent, NetworkEvents, PeerId, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// Shared link table.
struct Star {
    hub: PeerId,
    links: DashMap<PeerId, mpsc::UnboundedSender<NetworkEvent>>,
}

impl Star {
    fn attach(&self, id: PeerId) -> Result<NetworkEvents, TransportError> {
        let (tx, rx) = mpsc::unbounded_channel();
        match self.links.entry(id) {
            dashmap::mapref::entry::Entry::Occupied(e) => Err(TransportError::Other(format!(
                "peer {} already attached",
                e.key()
            ))),
            dashmap::mapref::entry::Entry::Vacant(e) => {
                e.insert(tx);
                Ok(rx)
            }
        }
    }

    fn is_attached(&self, id: &PeerId) -> bool {
        self.links.contains_key(id)
    }

    /// Route one message. Spoke-to-spoke traffic needs the hub to relay it.
    fn deliver(&self, from: &PeerId, to: &PeerId, data: Bytes) -> Result<(), TransportError> {
        if from != &self.hub && to != &self.hub {
            if !self.is_attached(&self.hub) {
                return Err(TransportError::PeerUnreachable(to.clone()));
            }
            trace!(from = %from, to = %to, relay = %self.hub, "Relaying via hub");
        }

        let link = self
            .links
            .get(to)
            .ok_or_else(|| TransportError::PeerUnreachable(to.clone()))?;

        link.send(NetworkEvent::Message {
            from: from.clone(),
            data,
        })
        .map_err(|_| TransportError::PeerUnreachable(to.clone()))
    }

    fn notify_left(&self, peer: &PeerId) {
        for link in self.links.iter() {
            let _ = link.value().send(NetworkEvent::PeerLeft(peer.clone()));
        }
    }
}

/// An in-memory star network.
#[derive(Clone)]
pub struct StarNetwork {
    star: Arc<Star>,
}

impl StarNetwork {
    /// Create a network around `hub`.
    ///
    /// Returns the network plus the hub's handle and event stream.
    #[must_use]
    pub fn new(hub: impl Into<PeerId>) -> (Self, MemoryPeer, NetworkEvents) {
        let hub = hub.into();
        let (tx, rx) = mpsc::unbounded_channel();
        let links = DashMap::new();
        links.insert(hub.clone(), tx);

        let star = Arc::new(Star {
            hub: hub.clone(),
            links,
        });
        debug!(hub = %hub, "Created star network");

        let peer = MemoryPeer {
            id: hub,
            star: Arc::clone(&star),
        };
        (Self { star }, peer, rx)
    }

    /// Attach a spoke to the hub.
    ///
    /// # Errors
    ///
    /// Returns an error if a peer with this ID is already attached.
    pub fn join(
        &self,
        spoke: impl Into<PeerId>,
    ) -> Result<(MemoryPeer, NetworkEvents), TransportError> {
        let id = spoke.into();
        let rx = self.star.attach(id.clone())?;
        debug!(peer = %id, hub = %self.star.hub, "Spoke joined");

        Ok((
            MemoryPeer {
                id,
                star: Arc::clone(&self.star),
            },
            rx,
        ))
    }

    /// Detach a peer and tell every remaining peer it left.
    ///
    /// When the hub leaves, spokes also lose each other. Returns `false` if
    /// the peer was not attached.
    pub fn leave(&self, peer: &PeerId) -> bool {
        if self.star.links.remove(peer).is_none() {
            return false;
        }
        debug!(peer = %peer, "Peer left");

        self.star.notify_left(peer);

        if peer == &self.star.hub {
            let spokes: Vec<PeerId> = self.star.links.iter().map(|e| e.key().clone()).collect();
            for spoke in &spokes {
                for link in self.star.links.iter() {
                    if link.key() != spoke {
                        let _ = link.value().send(NetworkEvent::PeerLeft(spoke.clone()));
                    }
                }
            }
        }

        true
    }

    /// Get the hub's ID.
    #[must_use]
    pub fn hub_id(&self) -> &PeerId {
        &self.star.hub
    }

    /// Get all attached peer IDs.
    #[must_use]
    pub fn peers(&self) -> Vec<PeerId> {
        self.star.links.iter().map(|e| e.key().clone()).collect()
    }
}

/// One peer's handle onto a [`StarNetwork`].
pub struct MemoryPeer {
    id: PeerId,
    star: Arc<Star>,
}

#[async_trait]
impl Network for MemoryPeer {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn broadcast(&self, data: Bytes) -> Result<(), TransportError> {
        if !self.star.is_attached(&self.id) {
            return Err(TransportError::Closed);
        }

        let targets: Vec<PeerId> = self
            .star
            .links
            .iter()
            .map(|e| e.key().clone())
            .filter(|id| id != &self.id)
            .collect();

        for target in &targets {
            // Peers that vanish mid-broadcast simply miss the message.
            if let Err(e) = self.star.deliver(&self.id, target, data.clone()) {
                trace!(from = %self.id, error = %e, "Broadcast delivery skipped");
            }
        }
        Ok(())
    }

    async fn send_to(&self, peer: &PeerId, data: Bytes) -> Result<(), TransportError> {
        if !self.star.is_attached(&self.id) {
            return Err(TransportError::Closed);
        }
        self.star.deliver(&self.id, peer, data)
    }
}
