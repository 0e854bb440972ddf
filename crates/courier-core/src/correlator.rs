//! Request correlator.
//!
//! Allocates request IDs on the requesting side, keeps one completion slot
//! per outstanding request and fulfils it exactly once. An entry leaves the
//! table in the same step that resolves it, so a late or repeated response
//! finds nothing and is refused.

use crate::metrics;
use crate::router::RouterError;
use bytes::Bytes;
use courier_protocol::RequestId;
use courier_transport::PeerId;
use dashmap::DashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, trace};

type Completion = oneshot::Sender<Result<Bytes, RouterError>>;

struct PendingEntry {
    destination: PeerId,
    started: Instant,
    completion: Completion,
}

impl PendingEntry {
    fn finish(self, outcome: &'static str, result: Result<Bytes, RouterError>) {
        metrics::record_request_finished(outcome, self.started.elapsed().as_secs_f64());
        // The caller may have stopped waiting.
        let _ = self.completion.send(result);
    }
}

/// Outstanding requests issued by one router.
pub struct RequestCorrelator {
    next_id: AtomicU64,
    pending: DashMap<RequestId, PendingEntry>,
}

impl RequestCorrelator {
    /// Create an empty correlator. IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            pending: DashMap::new(),
        }
    }

    /// Allocate an ID for a request to `destination`.
    ///
    /// Returns the ID and a future completing with the response payload or a
    /// failure.
    pub fn create_pending(&self, destination: PeerId) -> (RequestId, PendingResponse) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (completion, rx) = oneshot::channel();

        trace!(request_id = id, peer = %destination, "Request pending");
        self.pending.insert(
            id,
            PendingEntry {
                destination,
                started: Instant::now(),
                completion,
            },
        );
        metrics::record_request_started();

        (id, PendingResponse { id, rx })
    }

    /// Fulfil request `id` with a response payload.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResponse` if the ID is unknown or already resolved.
    pub fn resolve(&self, id: RequestId, payload: Bytes) -> Result<(), RouterError> {
        let (_, entry) = self
            .pending
            .remove(&id)
            .ok_or(RouterError::DuplicateResponse(id))?;
        entry.finish("ok", Ok(payload));
        Ok(())
    }

    /// Fulfil request `id` with a payload received from `from`.
    ///
    /// A response from a peer other than the one the request was sent to is
    /// refused and the request stays pending.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedResponder` for a foreign sender and
    /// `DuplicateResponse` if the ID is unknown or already resolved.
    pub fn resolve_from(
        &self,
        from: &PeerId,
        id: RequestId,
        payload: Bytes,
    ) -> Result<(), RouterError> {
        match self.pending.remove_if(&id, |_, entry| &entry.destination == from) {
            Some((_, entry)) => {
                entry.finish("ok", Ok(payload));
                Ok(())
            }
            None if self.pending.contains_key(&id) => Err(RouterError::UnexpectedResponder {
                id,
                peer: from.clone(),
            }),
            None => Err(RouterError::DuplicateResponse(id)),
        }
    }

    /// Fail request `id` with `error`. Returns `false` if it was not pending.
    pub fn reject(&self, id: RequestId, error: RouterError) -> bool {
        match self.pending.remove(&id) {
            Some((_, entry)) => {
                debug!(request_id = id, error = %error, "Request rejected");
                entry.finish("error", Err(error));
                true
            }
            None => false,
        }
    }

    /// Fail every request addressed to `peer` with `PeerUnreachable`.
    ///
    /// Returns the number of requests rejected.
    pub fn reject_peer(&self, peer: &PeerId) -> usize {
        let ids: Vec<RequestId> = self
            .pending
            .iter()
            .filter(|e| &e.value().destination == peer)
            .map(|e| *e.key())
            .collect();

        ids.into_iter()
            .filter(|id| self.reject(*id, RouterError::PeerUnreachable(peer.clone())))
            .count()
    }

    /// Fail every outstanding request with `Shutdown`.
    pub fn reject_all(&self) -> usize {
        let ids: Vec<RequestId> = self.pending.iter().map(|e| *e.key()).collect();
        ids.into_iter()
            .filter(|id| self.reject(*id, RouterError::Shutdown))
            .count()
    }

    /// Forget request `id` without fulfilling it.
    ///
    /// Used when the caller gave up (timeout or dropped future). Returns
    /// `false` if it was not pending.
    pub fn cancel(&self, id: RequestId) -> bool {
        match self.pending.remove(&id) {
            Some((_, entry)) => {
                trace!(request_id = id, "Request cancelled");
                let elapsed = entry.started.elapsed().as_secs_f64();
                metrics::record_request_finished("cancelled", elapsed);
                true
            }
            None => false,
        }
    }

    /// Number of outstanding requests.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}

/// Completion of one outstanding request.
///
/// Resolves to `Shutdown` if the entry is dropped without being fulfilled.
#[derive(Debug)]
pub struct PendingResponse {
    id: RequestId,
    rx: oneshot::Receiver<Result<Bytes, RouterError>>,
}

impl PendingResponse {
    /// The request ID this completion belongs to.
    #[must_use]
    pub fn id(&self) -> RequestId {
        self.id
    }
}

impl Future for PendingResponse {
    type Output = Result<Bytes, RouterError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.rx).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(RouterError::Shutdown)),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer(id: &str) -> PeerId {
        PeerId::new(id)
    }

    #[test]
    fn test_ids_are_unique_and_increasing() {
        let correlator = RequestCorrelator::new();
        let (a, _pa) = correlator.create_pending(peer("hub"));
        let (b, _pb) = correlator.create_pending(peer("hub"));
        let (c, _pc) = correlator.create_pending(peer("s2"));

        assert_eq!(a, 1);
        assert!(a < b && b < c);
        assert_eq!(correlator.outstanding(), 3);
    }

    #[tokio::test]
    async fn test_resolve_fulfils_only_matching_request() {
        let correlator = RequestCorrelator::new();
        let (a, pending_a) = correlator.create_pending(peer("hub"));
        let (b, _pending_b) = correlator.create_pending(peer("hub"));
        assert_eq!(pending_a.id(), a);

        correlator.resolve(a, Bytes::from_static(b"answer")).unwrap();

        assert_eq!(&pending_a.await.unwrap()[..], b"answer");
        assert_eq!(correlator.outstanding(), 1);
        assert!(correlator.resolve(b, Bytes::new()).is_ok());
    }

    #[tokio::test]
    async fn test_second_resolution_is_refused() {
        let correlator = RequestCorrelator::new();
        let (id, pending) = correlator.create_pending(peer("hub"));

        correlator.resolve(id, Bytes::from_static(b"first")).unwrap();
        assert!(matches!(
            correlator.resolve(id, Bytes::from_static(b"second")),
            Err(RouterError::DuplicateResponse(dup)) if dup == id
        ));

        assert_eq!(&pending.await.unwrap()[..], b"first");
    }

    #[test]
    fn test_resolve_unknown_id() {
        let correlator = RequestCorrelator::new();
        assert!(matches!(
            correlator.resolve(77, Bytes::new()),
            Err(RouterError::DuplicateResponse(77))
        ));
    }

    #[tokio::test]
    async fn test_resolve_from_wrong_peer_keeps_request_pending() {
        let correlator = RequestCorrelator::new();
        let (id, pending) = correlator.create_pending(peer("hub"));

        assert!(matches!(
            correlator.resolve_from(&peer("s2"), id, Bytes::new()),
            Err(RouterError::UnexpectedResponder { .. })
        ));
        assert_eq!(correlator.outstanding(), 1);

        correlator
            .resolve_from(&peer("hub"), id, Bytes::new())
            .unwrap();
        assert!(pending.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reject() {
        let correlator = RequestCorrelator::new();
        let (id, pending) = correlator.create_pending(peer("hub"));

        assert!(correlator.reject(id, RouterError::Shutdown));
        assert!(!correlator.reject(id, RouterError::Shutdown));
        assert!(matches!(pending.await, Err(RouterError::Shutdown)));
    }

    #[tokio::test]
    async fn test_reject_peer_only_affects_that_peer() {
        let correlator = RequestCorrelator::new();
        let (_, to_s2_a) = correlator.create_pending(peer("s2"));
        let (_, to_s2_b) = correlator.create_pending(peer("s2"));
        let (hub_id, _to_hub) = correlator.create_pending(peer("hub"));

        assert_eq!(correlator.reject_peer(&peer("s2")), 2);

        for pending in [to_s2_a, to_s2_b] {
            match pending.await {
                Err(RouterError::PeerUnreachable(p)) => assert_eq!(p, peer("s2")),
                other => panic!("Expected PeerUnreachable, got {:?}", other),
            }
        }
        assert_eq!(correlator.outstanding(), 1);
        assert!(correlator.resolve(hub_id, Bytes::new()).is_ok());
    }

    #[tokio::test]
    async fn test_cancel_drops_completion() {
        let correlator = RequestCorrelator::new();
        let (id, pending) = correlator.create_pending(peer("hub"));

        assert!(correlator.cancel(id));
        assert!(!correlator.cancel(id));
        assert!(matches!(pending.await, Err(RouterError::Shutdown)));
        assert!(matches!(
            correlator.resolve(id, Bytes::new()),
            Err(RouterError::DuplicateResponse(_))
        ));
    }

    #[tokio::test]
    async fn test_reject_all() {
        let correlator = RequestCorrelator::new();
        let (_, a) = correlator.create_pending(peer("hub"));
        let (_, b) = correlator.create_pending(peer("s1"));

        assert_eq!(correlator.reject_all(), 2);
        assert!(matches!(a.await, Err(RouterError::Shutdown)));
        assert!(matches!(b.await, Err(RouterError::Shutdown)));
        assert_eq!(correlator.outstanding(), 0);
    }
}
