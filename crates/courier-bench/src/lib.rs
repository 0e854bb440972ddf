//! Shared setup for the Courier benchmarks.
//!
//! Routers spawn their dispatch tasks on the current runtime, so every
//! helper here must run inside one (typically `Runtime::block_on`).

use bytes::Bytes;
use courier_core::{HandlerResult, IncomingRequest, Notification, Router};
use courier_transport::StarNetwork;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// A hub and its spokes.
pub struct BenchStar {
    /// The network, kept alive for the routers.
    pub net: StarNetwork,
    /// The hub router.
    pub hub: Router,
    /// Spoke routers, `spoke-1` onwards.
    pub spokes: Vec<Router>,
}

impl BenchStar {
    /// Build a star with `spokes` spokes.
    ///
    /// # Panics
    ///
    /// Panics if a spoke cannot join.
    #[must_use]
    pub fn new(spokes: usize) -> Self {
        let (net, hub_peer, hub_events) = StarNetwork::new("hub");
        let hub = Router::new(hub_peer, hub_events);
        let spokes = (1..=spokes)
            .map(|i| {
                let (peer, events) = net.join(format!("spoke-{}", i)).expect("spoke join");
                Router::new(peer, events)
            })
            .collect();

        Self { net, hub, spokes }
    }

    /// Every router, hub first.
    pub fn routers(&self) -> impl Iterator<Item = &Router> {
        std::iter::once(&self.hub).chain(self.spokes.iter())
    }

    /// Shut every router down.
    pub fn shutdown(&self) {
        for router in self.routers() {
            router.shutdown();
        }
    }
}

/// Bind an echo request handler on `channel`.
///
/// # Panics
///
/// Panics if the channel name is invalid.
pub fn bind_echo(router: &Router, channel: &str) {
    router
        .on_request(channel, |req: IncomingRequest| async move {
            req.respond(Some(req.request.clone())).await?;
            HandlerResult::Ok(())
        })
        .expect("valid channel");
}

/// Bind a notification handler on `channel` that counts deliveries.
///
/// # Panics
///
/// Panics if the channel name is invalid.
pub fn bind_counter(router: &Router, channel: &str, count: &Arc<AtomicUsize>) {
    let count = Arc::clone(count);
    router
        .on_notification(channel, move |_n: Notification| {
            count.fetch_add(1, Ordering::Relaxed);
            async { HandlerResult::Ok(()) }
        })
        .expect("valid channel");
}

/// Yield until `count` reaches `target`.
pub async fn wait_for(count: &AtomicUsize, target: usize) {
    while count.load(Ordering::Relaxed) < target {
        tokio::time::sleep(Duration::from_micros(50)).await;
    }
}

/// A payload of `size` bytes.
#[must_use]
pub fn payload(size: usize) -> Bytes {
    Bytes::from(vec![0u8; size])
}
