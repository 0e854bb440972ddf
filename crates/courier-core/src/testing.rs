//! Test network that records outbound frames and lets tests inject inbound
//! events directly.

use async_trait::async_trait;
use bytes::Bytes;
use courier_transport::{Network, NetworkEvent, NetworkEvents, PeerId, TransportError};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// One outbound frame. `to` is `None` for broadcasts.
#[derive(Debug, Clone)]
pub(crate) struct Sent {
    pub(crate) to: Option<PeerId>,
    pub(crate) data: Bytes,
}

pub(crate) type SentLog = Arc<Mutex<Vec<Sent>>>;

pub(crate) struct RecordingNetwork {
    id: PeerId,
    sent: SentLog,
}

impl RecordingNetwork {
    /// Create the network, the injector for inbound events and the events
    /// stream to hand to the router.
    pub(crate) fn new(
        id: &str,
    ) -> (
        Self,
        SentLog,
        mpsc::UnboundedSender<NetworkEvent>,
        NetworkEvents,
    ) {
        let sent = SentLog::default();
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                id: PeerId::new(id),
                sent: Arc::clone(&sent),
            },
            sent,
            tx,
            rx,
        )
    }
}

#[async_trait]
impl Network for RecordingNetwork {
    fn local_id(&self) -> &PeerId {
        &self.id
    }

    async fn broadcast(&self, data: Bytes) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent { to: None, data });
        Ok(())
    }

    async fn send_to(&self, peer: &PeerId, data: Bytes) -> Result<(), TransportError> {
        self.sent.lock().unwrap().push(Sent {
            to: Some(peer.clone()),
            data,
        });
        Ok(())
    }
}

/// Build an inbound message event.
pub(crate) fn inbound(from: &str, data: Bytes) -> NetworkEvent {
    NetworkEvent::Message {
        from: PeerId::new(from),
        data,
    }
}
