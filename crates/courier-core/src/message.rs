//! Inbound message types handed to handlers.

use crate::channel::ChannelId;
use crate::responder::Responder;
use crate::router::RouterError;
use bytes::Bytes;
use courier_protocol::RequestId;
use courier_transport::PeerId;
use std::fmt;

/// Responder-side identity of an inbound request.
///
/// Request IDs are only unique per requesting router, so the responder keys
/// a request by the requester's peer ID together with the ID it allocated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    /// The requesting peer, where the response is sent.
    pub peer: PeerId,
    /// ID allocated by the requester.
    pub id: RequestId,
}

impl RequestKey {
    /// Create a new request key.
    #[must_use]
    pub fn new(peer: impl Into<PeerId>, id: RequestId) -> Self {
        Self {
            peer: peer.into(),
            id,
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.peer, self.id)
    }
}

/// A notification received on a channel.
#[derive(Debug, Clone)]
pub struct Notification {
    /// Originating peer, as attributed by the network.
    pub sender: PeerId,
    /// Channel the notification was published on.
    pub channel: ChannelId,
    /// Message body.
    pub message: Bytes,
}

/// A request received on a channel.
///
/// The handler is expected to eventually answer it, either directly with
/// [`respond`](IncomingRequest::respond) or later through a
/// [`Responder`] taken from it.
#[derive(Debug, Clone)]
pub struct IncomingRequest {
    /// Originating peer, as attributed by the network.
    pub sender: PeerId,
    /// Key identifying the request to [`Router::respond`](crate::Router::respond).
    pub request_id: RequestKey,
    /// Channel the request was addressed to.
    pub channel: ChannelId,
    /// Request body, zero-length when the requester sent none.
    pub request: Bytes,
    pub(crate) responder: Responder,
}

impl IncomingRequest {
    /// Answer this request.
    ///
    /// # Errors
    ///
    /// See [`Responder::respond`].
    pub async fn respond(&self, payload: Option<Bytes>) -> Result<(), RouterError> {
        self.responder.respond(payload).await
    }

    /// A handle that can answer this request after the handler returns.
    #[must_use]
    pub fn responder(&self) -> Responder {
        self.responder.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_key_identity() {
        let a = RequestKey::new("s1", 1);
        let b = RequestKey::new("s2", 1);
        assert_ne!(a, b);
        assert_eq!(a, RequestKey::new(PeerId::new("s1"), 1));
        assert_eq!(a.to_string(), "s1#1");
    }
}
