//! Channel router facade.
//!
//! A [`Router`] wraps one peer's network handle and gives the application
//! notifications, request/response calls and per-channel handler binding.
//! Outbound calls encode and hand off to the network without waiting on the
//! inbound dispatch loop.

use crate::channel::validate_channel_name;
use crate::correlator::RequestCorrelator;
use crate::dispatch::{self, DispatchTasks};
use crate::handler::{NotificationHandler, RequestHandler};
use crate::message::RequestKey;
use crate::metrics;
use crate::registry::SubscriptionRegistry;
use crate::responder::AwaitingResponses;
use bytes::Bytes;
use courier_protocol::{codec, Envelope, EnvelopeKind, ProtocolError, RequestId};
use courier_transport::{Network, NetworkEvents, PeerId, TransportError};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, trace, warn};

/// Router errors.
#[derive(Debug, Error)]
pub enum RouterError {
    /// Invalid channel name.
    #[error("Invalid channel name: {0}")]
    InvalidChannel(&'static str),

    /// Frame could not be decoded.
    #[error("Malformed envelope: {0}")]
    MalformedEnvelope(#[from] ProtocolError),

    /// A response for this request was already sent or received.
    #[error("Duplicate response for request {0}")]
    DuplicateResponse(RequestId),

    /// A response came from a peer the request was not sent to.
    #[error("Response to request {id} from unexpected peer {peer}")]
    UnexpectedResponder {
        /// The request ID carried by the response.
        id: RequestId,
        /// The peer that sent it.
        peer: PeerId,
    },

    /// The destination peer left before responding.
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(PeerId),

    /// No response arrived within the configured timeout.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// A request was addressed to the local peer.
    #[error("Cannot send a request to the local peer {0}")]
    SelfRequest(PeerId),

    /// The network refused an outbound send.
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    /// The router was shut down.
    #[error("Router shut down")]
    Shutdown,
}

/// Router configuration.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    /// How long `request` waits for a response. `None` waits until the
    /// response arrives, the peer leaves or the router shuts down.
    pub request_timeout: Option<Duration>,
    /// Capacity of the inbound dispatch queue.
    pub queue_capacity: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            request_timeout: Some(Duration::from_secs(30)),
            queue_capacity: 1024,
        }
    }
}

/// State shared by a router's handles and its dispatch tasks.
pub(crate) struct RouterState {
    pub(crate) network: Arc<dyn Network>,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) correlator: RequestCorrelator,
    pub(crate) awaiting: AwaitingResponses,
    pub(crate) queue_depth: AtomicUsize,
    pub(crate) closed: AtomicBool,
    pub(crate) config: RouterConfig,
}

impl RouterState {
    pub(crate) fn local_id(&self) -> &PeerId {
        self.network.local_id()
    }

    pub(crate) fn ensure_open(&self) -> Result<(), RouterError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(RouterError::Shutdown);
        }
        Ok(())
    }

    /// Claim `key` and send its response.
    pub(crate) async fn respond(
        &self,
        key: &RequestKey,
        payload: Option<Bytes>,
    ) -> Result<(), RouterError> {
        self.ensure_open()?;

        if !self.awaiting.claim(key) {
            warn!(request = %key, "Refusing duplicate response");
            return Err(RouterError::DuplicateResponse(key.id));
        }

        let body = payload.map(|p| p.to_vec()).unwrap_or_default();
        let data = codec::encode(&Envelope::response(key.id, body))?;
        let len = data.len();

        self.network.send_to(&key.peer, data).await?;
        metrics::record_sent(EnvelopeKind::Response, len);
        trace!(request = %key, bytes = len, "Responded");
        Ok(())
    }

    /// Drop every handler and fail every outstanding request. Returns
    /// `false` if the router was already closed.
    fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }

        self.registry.clear();
        self.awaiting.clear();
        let rejected = self.correlator.reject_all();
        info!(peer = %self.local_id(), rejected, "Router shut down");
        true
    }
}

/// Owner of a router's dispatch tasks, shared by every `Router` clone.
struct RouterHandle {
    state: Arc<RouterState>,
    tasks: DispatchTasks,
}

impl RouterHandle {
    fn shutdown(&self) {
        self.tasks.abort();
        self.state.close();
    }
}

impl Drop for RouterHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Removes a request from the correlator if its caller stops waiting.
struct PendingGuard<'a> {
    correlator: &'a RequestCorrelator,
    id: RequestId,
}

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.correlator.cancel(self.id);
    }
}

/// The channel router for one peer.
///
/// Cloning is cheap; all clones share the same registry, correlator and
/// dispatch loop. Dropping the last clone shuts the router down.
///
/// Request handlers answer through [`IncomingRequest::respond`], which does
/// not keep the router alive. A handler that captures a `Router` clone keeps
/// it running until [`shutdown`] is called.
///
/// Handlers run one at a time. A handler that awaits [`request`] inline
/// holds up every later message for this router, including the response it
/// is waiting for, until the request times out. Spawn a task for that
/// instead.
///
/// [`IncomingRequest::respond`]: crate::IncomingRequest::respond
/// [`shutdown`]: Router::shutdown
/// [`request`]: Router::request
#[derive(Clone)]
pub struct Router {
    handle: Arc<RouterHandle>,
}

impl Router {
    /// Create a router over `network`, consuming its inbound `events`.
    ///
    /// Must be called from within a Tokio runtime.
    #[must_use]
    pub fn new<N>(network: N, events: NetworkEvents) -> Self
    where
        N: Network + 'static,
    {
        Self::with_config(network, events, RouterConfig::default())
    }

    /// Create a router with custom configuration.
    #[must_use]
    pub fn with_config<N>(network: N, events: NetworkEvents, config: RouterConfig) -> Self
    where
        N: Network + 'static,
    {
        info!(
            peer = %network.local_id(),
            "Creating router with config: {:?}", config
        );

        let state = Arc::new(RouterState {
            network: Arc::new(network),
            registry: SubscriptionRegistry::new(),
            correlator: RequestCorrelator::new(),
            awaiting: AwaitingResponses::new(),
            queue_depth: AtomicUsize::new(0),
            closed: AtomicBool::new(false),
            config,
        });
        let tasks = dispatch::spawn(Arc::clone(&state), events);

        Self {
            handle: Arc::new(RouterHandle { state, tasks }),
        }
    }

    fn state(&self) -> &RouterState {
        &self.handle.state
    }

    /// Identity of the local peer.
    #[must_use]
    pub fn local_id(&self) -> &PeerId {
        self.state().network.local_id()
    }

    /// Broadcast a notification on `channel` to every other peer.
    ///
    /// Returns once the network has accepted the message; there is no
    /// delivery confirmation.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid, encoding fails, the
    /// network refuses the send or the router is shut down.
    pub async fn notify(
        &self,
        channel: &str,
        payload: impl Into<Bytes>,
    ) -> Result<(), RouterError> {
        self.ensure_open()?;
        validate_channel_name(channel).map_err(RouterError::InvalidChannel)?;

        let payload: Bytes = payload.into();
        let data = codec::encode(&Envelope::notification(channel, payload.to_vec()))?;
        let len = data.len();

        self.state().network.broadcast(data).await?;
        metrics::record_sent(EnvelopeKind::Notification, len);
        trace!(peer = %self.local_id(), channel = %channel, bytes = len, "Notified");
        Ok(())
    }

    /// Bind the notification handler for `channel`.
    ///
    /// Returns `true` if a previous handler was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid.
    pub fn on_notification<H>(&self, channel: &str, handler: H) -> Result<bool, RouterError>
    where
        H: NotificationHandler,
    {
        self.state().registry.subscribe_notification(channel, handler)
    }

    /// Remove the notification handler for `channel`.
    pub fn off_notification(&self, channel: &str) -> bool {
        self.state().registry.unsubscribe_notification(channel)
    }

    /// Send a request on `channel` to peer `to` and wait for its response.
    ///
    /// A `None` payload is sent as a zero-length body. Dropping the returned
    /// future abandons the request.
    ///
    /// # Errors
    ///
    /// Returns `SelfRequest` if `to` is the local peer, `Transport` if the
    /// send is refused, `PeerUnreachable` if the peer leaves first, `Timeout`
    /// if the configured timeout elapses and `Shutdown` if the router stops.
    pub async fn request(
        &self,
        to: &PeerId,
        channel: &str,
        payload: Option<Bytes>,
    ) -> Result<Bytes, RouterError> {
        self.ensure_open()?;
        validate_channel_name(channel).map_err(RouterError::InvalidChannel)?;
        if to == self.local_id() {
            return Err(RouterError::SelfRequest(to.clone()));
        }

        let (id, pending) = self.state().correlator.create_pending(to.clone());
        let _guard = PendingGuard {
            correlator: &self.state().correlator,
            id,
        };

        let body = payload.map(|p| p.to_vec()).unwrap_or_default();
        let data = codec::encode(&Envelope::request(id, channel, body))?;
        let len = data.len();

        self.state().network.send_to(to, data).await?;
        metrics::record_sent(EnvelopeKind::Request, len);
        debug!(peer = %to, channel = %channel, request_id = id, "Request sent");

        match self.state().config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, pending).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(peer = %to, channel = %channel, request_id = id, "Request timed out");
                    Err(RouterError::Timeout(limit))
                }
            },
            None => pending.await,
        }
    }

    /// Bind the request handler for `channel`.
    ///
    /// Returns `true` if a previous handler was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid.
    pub fn on_request<H>(&self, channel: &str, handler: H) -> Result<bool, RouterError>
    where
        H: RequestHandler,
    {
        self.state().registry.subscribe_request(channel, handler)
    }

    /// Remove the request handler for `channel`.
    pub fn off_request(&self, channel: &str) -> bool {
        self.state().registry.unsubscribe_request(channel)
    }

    /// Answer an inbound request.
    ///
    /// Each request can be answered once. A `None` payload is sent as a
    /// zero-length body.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateResponse` without sending anything if `request` was
    /// already answered (or never received), and `Transport` if the network
    /// refuses the send.
    pub async fn respond(
        &self,
        request: &RequestKey,
        payload: Option<Bytes>,
    ) -> Result<(), RouterError> {
        self.state().respond(request, payload).await
    }

    /// Get router statistics.
    #[must_use]
    pub fn stats(&self) -> RouterStats {
        let registry = self.state().registry.stats();
        RouterStats {
            notification_channels: registry.notification_channels,
            request_channels: registry.request_channels,
            outstanding_requests: self.state().correlator.outstanding(),
            awaiting_responses: self.state().awaiting.len(),
            queued_messages: self.state().queue_depth.load(Ordering::Relaxed),
        }
    }

    /// Check if the dispatch loop is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.state().closed.load(Ordering::Acquire) && !self.handle.tasks.is_finished()
    }

    /// Stop the dispatch loop, drop every handler and fail every outstanding
    /// request with `Shutdown`.
    pub fn shutdown(&self) {
        self.handle.shutdown();
    }

    fn ensure_open(&self) -> Result<(), RouterError> {
        self.state().ensure_open()
    }
}

/// Router statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouterStats {
    /// Channels with a notification handler.
    pub notification_channels: usize,
    /// Channels with a request handler.
    pub request_channels: usize,
    /// Requests sent and still waiting for a response.
    pub outstanding_requests: usize,
    /// Requests received and not answered yet.
    pub awaiting_responses: usize,
    /// Inbound messages queued behind the current handler.
    pub queued_messages: usize,
}
