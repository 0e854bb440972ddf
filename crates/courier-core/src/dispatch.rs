//! Inbound dispatch loop.
//!
//! Each router runs two tasks:
//!
//! - a **pump** reading the network's event stream, pushing messages onto a
//!   bounded queue and failing outstanding requests when their peer leaves.
//!   When the queue is full the pump holds messages in its own backlog and
//!   keeps reading, so a departing peer is noticed behind a slow handler;
//! - a single **worker** popping one message at a time and awaiting its
//!   handler to completion before popping the next.
//!
//! The single worker is what makes dispatch strictly ordered: no two
//! handlers of one router ever run at the same time, however long either
//! one suspends.

use crate::handler::HandlerResult;
use crate::message::{IncomingRequest, Notification, RequestKey};
use crate::metrics;
use crate::responder::Responder;
use crate::router::{RouterError, RouterState};
use bytes::Bytes;
use courier_protocol::{codec, Envelope, EnvelopeKind};
use courier_transport::{NetworkEvent, NetworkEvents, PeerId};
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, error, trace, warn};

/// A raw message waiting for the worker.
struct Inbound {
    from: PeerId,
    data: Bytes,
}

/// Handles to a router's pump and worker tasks.
///
/// Dropping the handles aborts both tasks.
pub(crate) struct DispatchTasks {
    pump: JoinHandle<()>,
    worker: JoinHandle<()>,
}

impl DispatchTasks {
    pub(crate) fn abort(&self) {
        self.pump.abort();
        self.worker.abort();
    }

    pub(crate) fn is_finished(&self) -> bool {
        self.pump.is_finished() && self.worker.is_finished()
    }
}

impl Drop for DispatchTasks {
    fn drop(&mut self) {
        self.abort();
    }
}

/// Start the pump and worker for `state`.
pub(crate) fn spawn(state: Arc<RouterState>, events: NetworkEvents) -> DispatchTasks {
    let (queue_tx, queue_rx) = mpsc::channel(state.config.queue_capacity.max(1));

    let pump = tokio::spawn(pump(Arc::clone(&state), events, queue_tx));
    let worker = tokio::spawn(work(state, queue_rx));

    DispatchTasks { pump, worker }
}

async fn pump(
    state: Arc<RouterState>,
    mut events: NetworkEvents,
    queue: mpsc::Sender<Inbound>,
) {
    // Messages that arrived while the queue was full, oldest first.
    let mut backlog: VecDeque<Inbound> = VecDeque::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(NetworkEvent::Message { from, data }) => {
                    state.queue_depth.fetch_add(1, Ordering::Relaxed);
                    let inbound = Inbound { from, data };
                    if !backlog.is_empty() {
                        backlog.push_back(inbound);
                        continue;
                    }
                    match queue.try_send(inbound) {
                        Ok(()) => {}
                        Err(TrySendError::Full(inbound)) => {
                            trace!(local = %state.local_id(), "Dispatch queue full");
                            backlog.push_back(inbound);
                        }
                        Err(TrySendError::Closed(_)) => return,
                    }
                }
                Some(NetworkEvent::PeerLeft(peer)) => {
                    // Not queued: the worker may be parked on a handler that
                    // is itself waiting on one of these requests.
                    let rejected = state.correlator.reject_peer(&peer);
                    debug!(
                        local = %state.local_id(),
                        peer = %peer,
                        rejected,
                        "Peer left"
                    );
                }
                None => break,
            },
            permit = queue.reserve(), if !backlog.is_empty() => {
                let Ok(permit) = permit else { return };
                if let Some(inbound) = backlog.pop_front() {
                    permit.send(inbound);
                }
            }
        }
    }

    debug!(local = %state.local_id(), "Network event stream closed");

    for inbound in backlog {
        if queue.send(inbound).await.is_err() {
            return;
        }
    }
}

async fn work(state: Arc<RouterState>, mut queue: mpsc::Receiver<Inbound>) {
    while let Some(Inbound { from, data }) = queue.recv().await {
        state.queue_depth.fetch_sub(1, Ordering::Relaxed);
        dispatch(&state, from, data).await;
    }

    let rejected = state.correlator.reject_all();
    debug!(
        local = %state.network.local_id(),
        rejected,
        "Dispatch loop stopped"
    );
}

/// Decode one raw message and run its destination to completion.
async fn dispatch(state: &Arc<RouterState>, from: PeerId, data: Bytes) {
    if &from == state.network.local_id() {
        trace!(peer = %from, "Dropping self-originated frame");
        return;
    }

    let envelope = match codec::decode(&data) {
        Ok(envelope) => envelope,
        Err(e) => {
            let err = RouterError::MalformedEnvelope(e);
            warn!(peer = %from, bytes = data.len(), error = %err, "Dropping frame");
            metrics::record_malformed();
            return;
        }
    };

    let kind = envelope.kind();
    metrics::record_received(kind, data.len());

    match envelope {
        Envelope::Notification { channel, payload } => {
            let Some(handler) = state.registry.notification_handler(&channel) else {
                trace!(peer = %from, channel = %channel, "No notification handler");
                metrics::record_unrouted(kind);
                return;
            };

            let notification = Notification {
                sender: from.clone(),
                channel: channel.clone(),
                message: Bytes::from(payload),
            };
            let call = async move { handler.call(notification).await };
            run_handler(kind, &from, &channel, call.boxed()).await;
        }

        Envelope::Request {
            id,
            channel,
            payload,
        } => {
            let Some(handler) = state.registry.request_handler(&channel) else {
                debug!(peer = %from, channel = %channel, request_id = id, "No request handler");
                metrics::record_unrouted(kind);
                return;
            };

            let key = RequestKey::new(from.clone(), id);
            if !state.awaiting.admit(key.clone()) {
                warn!(peer = %from, request_id = id, "Request already awaiting a response");
                metrics::record_unrouted(kind);
                return;
            }

            let request = IncomingRequest {
                sender: from.clone(),
                responder: Responder::new(state, key.clone()),
                request_id: key,
                channel: channel.clone(),
                request: Bytes::from(payload),
            };
            let call = async move { handler.call(request).await };
            run_handler(kind, &from, &channel, call.boxed()).await;
        }

        Envelope::Response { id, payload } => {
            match state
                .correlator
                .resolve_from(&from, id, Bytes::from(payload))
            {
                Ok(()) => trace!(peer = %from, request_id = id, "Response delivered"),
                Err(e) => {
                    debug!(peer = %from, request_id = id, error = %e, "Dropping response");
                    metrics::record_unrouted(kind);
                }
            }
        }
    }
}

/// Await a handler, isolating its failure or panic to this one message.
async fn run_handler(
    kind: EnvelopeKind,
    from: &PeerId,
    channel: &str,
    call: BoxFuture<'static, HandlerResult>,
) {
    match AssertUnwindSafe(call).catch_unwind().await {
        Ok(Ok(())) => {
            trace!(%kind, peer = %from, channel = %channel, "Handler completed");
        }
        Ok(Err(e)) => {
            warn!(%kind, peer = %from, channel = %channel, error = %e, "Handler failed");
            metrics::record_handler_failure(kind, "error");
        }
        Err(_) => {
            error!(%kind, peer = %from, channel = %channel, "Handler panicked");
            metrics::record_handler_failure(kind, "panic");
        }
    }
}
