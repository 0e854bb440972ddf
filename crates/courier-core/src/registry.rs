//! Subscription registry.
//!
//! Binds each channel to at most one handler per message kind. Binding a
//! channel that already has a handler replaces it and reports the
//! replacement to the caller.

use crate::channel::{validate_channel_name, ChannelId};
use crate::handler::{NotificationHandler, RequestHandler};
use crate::router::RouterError;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Per-channel handler bindings for one router.
#[derive(Default)]
pub struct SubscriptionRegistry {
    notifications: DashMap<ChannelId, Arc<dyn NotificationHandler>>,
    requests: DashMap<ChannelId, Arc<dyn RequestHandler>>,
}

impl SubscriptionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind the notification handler for `channel`.
    ///
    /// Returns `true` if a previous binding was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid.
    pub fn subscribe_notification<H>(&self, channel: &str, handler: H) -> Result<bool, RouterError>
    where
        H: NotificationHandler,
    {
        validate_channel_name(channel).map_err(RouterError::InvalidChannel)?;

        let replaced = self
            .notifications
            .insert(channel.to_string(), Arc::new(handler))
            .is_some();
        debug!(channel = %channel, replaced, "Notification handler bound");
        Ok(replaced)
    }

    /// Bind the request handler for `channel`.
    ///
    /// Returns `true` if a previous binding was replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if the channel name is invalid.
    pub fn subscribe_request<H>(&self, channel: &str, handler: H) -> Result<bool, RouterError>
    where
        H: RequestHandler,
    {
        validate_channel_name(channel).map_err(RouterError::InvalidChannel)?;

        let replaced = self
            .requests
            .insert(channel.to_string(), Arc::new(handler))
            .is_some();
        debug!(channel = %channel, replaced, "Request handler bound");
        Ok(replaced)
    }

    /// Remove the notification handler for `channel`.
    ///
    /// Returns `true` if one was bound.
    pub fn unsubscribe_notification(&self, channel: &str) -> bool {
        let removed = self.notifications.remove(channel).is_some();
        if removed {
            debug!(channel = %channel, "Notification handler unbound");
        }
        removed
    }

    /// Remove the request handler for `channel`.
    ///
    /// Returns `true` if one was bound.
    pub fn unsubscribe_request(&self, channel: &str) -> bool {
        let removed = self.requests.remove(channel).is_some();
        if removed {
            debug!(channel = %channel, "Request handler unbound");
        }
        removed
    }

    /// Current notification handler for `channel`.
    ///
    /// The handler is cloned out so no map lock is held while it runs.
    #[must_use]
    pub fn notification_handler(&self, channel: &str) -> Option<Arc<dyn NotificationHandler>> {
        self.notifications.get(channel).map(|h| Arc::clone(h.value()))
    }

    /// Current request handler for `channel`.
    #[must_use]
    pub fn request_handler(&self, channel: &str) -> Option<Arc<dyn RequestHandler>> {
        self.requests.get(channel).map(|h| Arc::clone(h.value()))
    }

    /// Get registry statistics.
    #[must_use]
    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            notification_channels: self.notifications.len(),
            request_channels: self.requests.len(),
        }
    }

    /// Drop every binding.
    pub fn clear(&self) {
        self.notifications.clear();
        self.requests.clear();
    }
}

/// Registry statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryStats {
    /// Channels with a notification handler.
    pub notification_channels: usize,
    /// Channels with a request handler.
    pub request_channels: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::HandlerResult;
    use crate::message::{IncomingRequest, Notification, RequestKey};
    use bytes::Bytes;
    use courier_transport::PeerId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting(hits: Arc<AtomicUsize>) -> impl NotificationHandler {
        move |_n: Notification| {
            hits.fetch_add(1, Ordering::SeqCst);
            async { HandlerResult::Ok(()) }
        }
    }

    fn notification(channel: &str) -> Notification {
        Notification {
            sender: PeerId::new("s1"),
            channel: channel.to_string(),
            message: Bytes::from_static(b"m"),
        }
    }

    #[tokio::test]
    async fn test_subscribe_and_lookup() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(!registry
            .subscribe_notification("c1", counting(Arc::clone(&hits)))
            .unwrap());
        assert!(registry.notification_handler("c2").is_none());
        assert!(registry.request_handler("c1").is_none());

        let handler = registry.notification_handler("c1").unwrap();
        handler.call(notification("c1")).await.unwrap();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rebinding_replaces_handler() {
        let registry = SubscriptionRegistry::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        registry
            .subscribe_notification("c1", counting(Arc::clone(&first)))
            .unwrap();
        assert!(registry
            .subscribe_notification("c1", counting(Arc::clone(&second)))
            .unwrap());

        let handler = registry.notification_handler("c1").unwrap();
        handler.call(notification("c1")).await.unwrap();
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
        assert_eq!(registry.stats().notification_channels, 1);
    }

    #[test]
    fn test_kinds_are_independent() {
        let registry = SubscriptionRegistry::new();

        registry
            .subscribe_request("c1", |_r: IncomingRequest| async { HandlerResult::Ok(()) })
            .unwrap();
        assert!(registry.request_handler("c1").is_some());
        assert!(registry.notification_handler("c1").is_none());

        let stats = registry.stats();
        assert_eq!(stats.request_channels, 1);
        assert_eq!(stats.notification_channels, 0);
    }

    #[test]
    fn test_unsubscribe() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        registry.subscribe_notification("c1", counting(hits)).unwrap();
        assert!(registry.unsubscribe_notification("c1"));
        assert!(!registry.unsubscribe_notification("c1"));
        assert!(!registry.unsubscribe_request("c1"));
        assert!(registry.notification_handler("c1").is_none());
    }

    #[test]
    fn test_invalid_channel_rejected() {
        let registry = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));

        assert!(matches!(
            registry.subscribe_notification("", counting(hits)),
            Err(RouterError::InvalidChannel(_))
        ));
        assert!(matches!(
            registry.subscribe_request("bad\nname", |r: IncomingRequest| async move {
                let _key: RequestKey = r.request_id;
                HandlerResult::Ok(())
            }),
            Err(RouterError::InvalidChannel(_))
        ));
    }

    #[test]
    fn test_clear() {
        let registry = SubscriptionRegistry::new();
        registry
            .subscribe_notification("a", counting(Arc::new(AtomicUsize::new(0))))
            .unwrap();
        registry
            .subscribe_request("b", |_r: IncomingRequest| async { HandlerResult::Ok(()) })
            .unwrap();

        registry.clear();
        assert_eq!(
            registry.stats(),
            RegistryStats {
                notification_channels: 0,
                request_channels: 0
            }
        );
    }
}
