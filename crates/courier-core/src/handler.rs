//! Handler traits.
//!
//! Handlers are async: the dispatch loop awaits the returned future to
//! completion before it takes the next inbound message. Plain closures
//! returning a future implement both traits.

use crate::message::{IncomingRequest, Notification};
use futures_util::future::BoxFuture;
use std::future::Future;

/// Error a handler may fail with.
pub type HandlerError = Box<dyn std::error::Error + Send + Sync>;

/// Result of running a handler.
pub type HandlerResult = Result<(), HandlerError>;

/// Handles notifications on one channel.
pub trait NotificationHandler: Send + Sync + 'static {
    /// Process one notification.
    fn call(&self, notification: Notification) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> NotificationHandler for F
where
    F: Fn(Notification) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, notification: Notification) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(notification))
    }
}

/// Handles requests on one channel.
pub trait RequestHandler: Send + Sync + 'static {
    /// Process one request.
    fn call(&self, request: IncomingRequest) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> RequestHandler for F
where
    F: Fn(IncomingRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, request: IncomingRequest) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(request))
    }
}
