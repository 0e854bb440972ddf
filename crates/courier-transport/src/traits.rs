//! Network adapter traits for Courier.
//!
//! The router consumes a peer network through these types and never looks
//! beneath them: connection setup, relaying and encryption belong to the
//! adapter.

use async_trait::async_trait;
use bytes::Bytes;
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;

/// Stable identity of a peer, supplied by the network substrate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PeerId(pub String);

impl PeerId {
    /// Create a new peer ID.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for PeerId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for PeerId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Something the network delivers to a peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
    /// A message attributed to its originating peer.
    Message {
        /// Originating peer, as established by the network.
        from: PeerId,
        /// Raw frame bytes.
        data: Bytes,
    },

    /// A peer is no longer reachable from this one.
    PeerLeft(PeerId),
}

/// Inbound event stream handed to the router alongside its network handle.
pub type NetworkEvents = mpsc::UnboundedReceiver<NetworkEvent>;

/// Transport errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The destination peer is not connected.
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(PeerId),

    /// The local peer has left the network.
    #[error("Connection closed")]
    Closed,

    /// Failed to send data.
    #[error("Send failed: {0}")]
    SendFailed(String),

    /// Other error.
    #[error("{0}")]
    Other(String),
}

/// Outbound half of a peer network, as seen by one peer.
///
/// Implementations must attribute every delivered message to its originating
/// peer and must not deliver a peer's own broadcasts back to it.
#[async_trait]
pub trait Network: Send + Sync {
    /// Identity of the local peer.
    fn local_id(&self) -> &PeerId;

    /// Send to every other connected peer, never to self.
    async fn broadcast(&self, data: Bytes) -> Result<(), TransportError>;

    /// Send point-to-point to `peer`.
    async fn send_to(&self, peer: &PeerId, data: Bytes) -> Result<(), TransportError>;
}
