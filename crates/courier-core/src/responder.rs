//! Responder-side bookkeeping for inbound requests.
//!
//! A key is admitted when its request is dispatched to a handler and claimed
//! by the first `respond` for it. A key can be claimed once, so a second
//! response for the same request is refused before anything is sent.

use crate::message::RequestKey;
use crate::router::{RouterError, RouterState};
use bytes::Bytes;
use dashmap::DashSet;
use std::fmt;
use std::sync::{Arc, Weak};

/// Answers one inbound request.
///
/// Holds only a weak reference to its router: once the router is dropped or
/// shut down, `respond` fails with `Shutdown`.
#[derive(Clone)]
pub struct Responder {
    state: Weak<RouterState>,
    key: RequestKey,
}

impl Responder {
    pub(crate) fn new(state: &Arc<RouterState>, key: RequestKey) -> Self {
        Self {
            state: Arc::downgrade(state),
            key,
        }
    }

    /// The request this responder answers.
    #[must_use]
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    /// Send the response. A `None` payload is sent as a zero-length body.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResponse` if the request was already answered,
    /// `Shutdown` if the router is gone and `Transport` if the network
    /// refuses the send.
    pub async fn respond(&self, payload: Option<Bytes>) -> Result<(), RouterError> {
        let state = self.state.upgrade().ok_or(RouterError::Shutdown)?;
        state.respond(&self.key, payload).await
    }
}

impl fmt::Debug for Responder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Responder")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Inbound requests that have not been answered yet.
#[derive(Debug, Default)]
pub struct AwaitingResponses {
    keys: DashSet<RequestKey>,
}

impl AwaitingResponses {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an inbound request. Returns `false` if it is already awaiting.
    pub fn admit(&self, key: RequestKey) -> bool {
        self.keys.insert(key)
    }

    /// Take the right to answer `key`. Returns `false` if it was already
    /// answered or never received.
    pub fn claim(&self, key: &RequestKey) -> bool {
        self.keys.remove(key).is_some()
    }

    /// Check if `key` is still awaiting a response.
    #[must_use]
    pub fn is_awaiting(&self, key: &RequestKey) -> bool {
        self.keys.contains(key)
    }

    /// Number of unanswered requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Check if no request is awaiting a response.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn clear(&self) {
        self.keys.clear();
    }
}
