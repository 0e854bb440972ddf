//! Envelope types for the Courier protocol.
//!
//! An envelope is the unit exchanged between routers. The sending peer's
//! identity is never part of the envelope: the network attributes every
//! received message to its originating peer.

use serde::{Deserialize, Serialize};

/// Identifier correlating a request with its response.
///
/// Unique among the outstanding requests of the router that issued it.
pub type RequestId = u64;

/// Envelope kind identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EnvelopeKind {
    Notification = 0x01,
    Request = 0x02,
    Response = 0x03,
}

impl EnvelopeKind {
    /// Lowercase name used in logs and metric labels.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Notification => "notification",
            EnvelopeKind::Request => "request",
            EnvelopeKind::Response => "response",
        }
    }
}

impl From<EnvelopeKind> for u8 {
    fn from(kind: EnvelopeKind) -> u8 {
        kind as u8
    }
}

impl TryFrom<u8> for EnvelopeKind {
    type Error = &'static str;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(EnvelopeKind::Notification),
            0x02 => Ok(EnvelopeKind::Request),
            0x03 => Ok(EnvelopeKind::Response),
            _ => Err("Invalid envelope kind"),
        }
    }
}

impl std::fmt::Display for EnvelopeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A routed message.
///
/// Payloads are always present on the wire; a zero-length payload is a valid
/// body and decodes back to an empty vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Envelope {
    /// One-way message broadcast on a channel.
    #[serde(rename = "notification")]
    Notification {
        /// Target channel.
        channel: String,
        /// Message body.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Point-to-point request expecting exactly one response.
    #[serde(rename = "request")]
    Request {
        /// Correlation ID allocated by the requester.
        id: RequestId,
        /// Target channel.
        channel: String,
        /// Request body.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },

    /// Response to a request, correlated by ID alone.
    #[serde(rename = "response")]
    Response {
        /// ID of the request being answered.
        id: RequestId,
        /// Response body.
        #[serde(with = "serde_bytes")]
        payload: Vec<u8>,
    },
}

impl Envelope {
    /// Get the envelope kind.
    #[must_use]
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::Notification { .. } => EnvelopeKind::Notification,
            Envelope::Request { .. } => EnvelopeKind::Request,
            Envelope::Response { .. } => EnvelopeKind::Response,
        }
    }

    /// Create a new Notification envelope.
    #[must_use]
    pub fn notification(channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Envelope::Notification {
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Create a new Request envelope.
    #[must_use]
    pub fn request(id: RequestId, channel: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Envelope::Request {
            id,
            channel: channel.into(),
            payload: payload.into(),
        }
    }

    /// Create a new Response envelope.
    #[must_use]
    pub fn response(id: RequestId, payload: impl Into<Vec<u8>>) -> Self {
        Envelope::Response {
            id,
            payload: payload.into(),
        }
    }

    /// The channel this envelope is addressed to, if its kind carries one.
    #[must_use]
    pub fn channel(&self) -> Option<&str> {
        match self {
            Envelope::Notification { channel, .. } | Envelope::Request { channel, .. } => {
                Some(channel)
            }
            Envelope::Response { .. } => None,
        }
    }

    /// The request ID, for requests and responses.
    #[must_use]
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Envelope::Request { id, .. } | Envelope::Response { id, .. } => Some(*id),
            Envelope::Notification { .. } => None,
        }
    }

    /// The message body.
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        match self {
            Envelope::Notification { payload, .. }
            | Envelope::Request { payload, .. }
            | Envelope::Response { payload, .. } => payload,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_kind() {
        let notification = Envelope::notification("c1", b"x".to_vec());
        assert_eq!(notification.kind(), EnvelopeKind::Notification);
        assert_eq!(notification.channel(), Some("c1"));
        assert_eq!(notification.request_id(), None);

        let response = Envelope::response(7, Vec::new());
        assert_eq!(response.kind(), EnvelopeKind::Response);
        assert_eq!(response.channel(), None);
        assert_eq!(response.request_id(), Some(7));
        assert!(response.payload().is_empty());
    }

    #[test]
    fn test_envelope_kind_conversion() {
        assert_eq!(EnvelopeKind::try_from(1), Ok(EnvelopeKind::Notification));
        assert_eq!(EnvelopeKind::try_from(2), Ok(EnvelopeKind::Request));
        assert_eq!(EnvelopeKind::try_from(3), Ok(EnvelopeKind::Response));
        assert!(EnvelopeKind::try_from(0).is_err());
        assert!(EnvelopeKind::try_from(4).is_err());
        assert_eq!(u8::from(EnvelopeKind::Request), 2);
        assert_eq!(EnvelopeKind::Response.to_string(), "response");
    }
}
