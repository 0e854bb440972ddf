//! Star session scenario.
//!
//! Builds a hub and its spokes over the in-memory star network, then has
//! every peer publish notifications and issue echo requests (spoke to hub,
//! and spoke to spoke through the hub).

use crate::config::Config;
use anyhow::{bail, Context, Result};
use bytes::Bytes;
use courier_core::{HandlerResult, IncomingRequest, Notification, Router};
use courier_transport::{PeerId, StarNetwork};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

const CHATTER: &str = "chatter";
const ECHO: &str = "echo";

/// How long to wait for notifications to finish fanning out.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Outcome of one session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Peers in the session, hub included.
    pub peers: usize,
    /// Notifications published.
    pub notifications_sent: usize,
    /// Notifications delivered to handlers, across all peers.
    pub notifications_received: usize,
    /// Requests answered with their own payload.
    pub requests_ok: usize,
    /// Requests that failed or came back wrong.
    pub requests_failed: usize,
    /// Wall time of the session.
    pub elapsed: Duration,
}

impl Report {
    /// Notifications every peer should have seen.
    #[must_use]
    pub fn notifications_expected(&self) -> usize {
        self.notifications_sent * self.peers.saturating_sub(1)
    }
}

/// The routers of one star session.
pub struct Session {
    net: StarNetwork,
    hub: Router,
    spokes: Vec<Router>,
    received: Arc<AtomicUsize>,
}

impl Session {
    /// Build the star and bind the scenario handlers on every peer.
    ///
    /// # Errors
    ///
    /// Returns an error if a spoke cannot join.
    pub fn build(config: &Config) -> Result<Self> {
        let router_config = config.router.to_router_config();
        let received = Arc::new(AtomicUsize::new(0));

        let (net, hub_peer, hub_events) = StarNetwork::new(config.session.hub.as_str());
        let hub = Router::with_config(hub_peer, hub_events, router_config.clone());
        bind(&hub, &received)?;

        let mut spokes = Vec::with_capacity(config.session.spokes);
        for index in 0..config.session.spokes {
            let (peer, events) = net
                .join(format!("spoke-{}", index + 1))
                .context("Failed to join spoke")?;
            let spoke = Router::with_config(peer, events, router_config.clone());
            bind(&spoke, &received)?;
            spokes.push(spoke);
        }

        info!(
            hub = %hub.local_id(),
            spokes = spokes.len(),
            "Session built"
        );

        Ok(Self {
            net,
            hub,
            spokes,
            received,
        })
    }

    fn peers(&self) -> impl Iterator<Item = &Router> {
        std::iter::once(&self.hub).chain(self.spokes.iter())
    }

    /// Run the workload and collect a report.
    ///
    /// # Errors
    ///
    /// Returns an error if a notification cannot be published.
    pub async fn run(&self, rounds: usize, payload_size: usize) -> Result<Report> {
        let started = Instant::now();
        let payload = Bytes::from(vec![0xA5; payload_size]);

        let mut notifications_sent = 0;
        for round in 0..rounds {
            for router in self.peers() {
                router
                    .notify(CHATTER, payload.clone())
                    .await
                    .with_context(|| format!("{} failed to notify", router.local_id()))?;
                notifications_sent += 1;
            }
            debug!(round, "Notification round published");
        }

        let (requests_ok, requests_failed) = self.requests(rounds, &payload).await;

        let expected = notifications_sent * self.spokes.len();
        self.drain(expected).await;

        let report = Report {
            peers: self.spokes.len() + 1,
            notifications_sent,
            notifications_received: self.received.load(Ordering::Relaxed),
            requests_ok,
            requests_failed,
            elapsed: started.elapsed(),
        };
        info!(?report, "Session finished");
        Ok(report)
    }

    /// Issue every spoke's echo requests concurrently.
    async fn requests(&self, rounds: usize, payload: &Bytes) -> (usize, usize) {
        let mut calls = JoinSet::new();

        for (index, spoke) in self.spokes.iter().enumerate() {
            let mut targets = vec![self.hub.local_id().clone()];
            if self.spokes.len() > 1 {
                let neighbour = &self.spokes[(index + 1) % self.spokes.len()];
                targets.push(neighbour.local_id().clone());
            }

            for target in targets {
                let spoke = spoke.clone();
                let payload = payload.clone();
                calls.spawn(async move { echo_rounds(spoke, target, rounds, payload).await });
            }
        }

        let mut ok = 0;
        let mut failed = 0;
        while let Some(result) = calls.join_next().await {
            match result {
                Ok((o, f)) => {
                    ok += o;
                    failed += f;
                }
                Err(e) => {
                    warn!(error = %e, "Request task failed");
                    failed += rounds;
                }
            }
        }
        (ok, failed)
    }

    /// Wait until `expected` notifications were handled or give up.
    async fn drain(&self, expected: usize) {
        let deadline = Instant::now() + DRAIN_TIMEOUT;
        while self.received.load(Ordering::Relaxed) < expected {
            if Instant::now() >= deadline {
                warn!(
                    expected,
                    received = self.received.load(Ordering::Relaxed),
                    "Gave up waiting for notifications"
                );
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }

    /// Shut down every router and take the peers off the network.
    pub fn shutdown(&self) {
        for router in self.peers() {
            router.shutdown();
        }
        for peer in self.net.peers() {
            self.net.leave(&peer);
        }
    }
}

async fn echo_rounds(
    spoke: Router,
    target: PeerId,
    rounds: usize,
    payload: Bytes,
) -> (usize, usize) {
    let mut ok = 0;
    let mut failed = 0;

    for _ in 0..rounds {
        match spoke.request(&target, ECHO, Some(payload.clone())).await {
            Ok(reply) if reply == payload => ok += 1,
            Ok(reply) => {
                warn!(peer = %target, bytes = reply.len(), "Echo came back altered");
                failed += 1;
            }
            Err(e) => {
                warn!(peer = %target, error = %e, "Echo request failed");
                failed += 1;
            }
        }
    }
    (ok, failed)
}

fn bind(router: &Router, received: &Arc<AtomicUsize>) -> Result<()> {
    let received = Arc::clone(received);
    router.on_notification(CHATTER, move |_n: Notification| {
        received.fetch_add(1, Ordering::Relaxed);
        async { HandlerResult::Ok(()) }
    })?;

    router.on_request(ECHO, |req: IncomingRequest| async move {
        req.respond(Some(req.request.clone())).await?;
        HandlerResult::Ok(())
    })?;
    Ok(())
}

/// Build a session from `config`, run it and tear it down.
///
/// # Errors
///
/// Returns an error if the session cannot be built or run, or if any
/// request failed.
pub async fn run(config: &Config) -> Result<Report> {
    let session = Session::build(config)?;
    let report = session
        .run(config.session.rounds, config.session.payload_size)
        .await;
    session.shutdown();

    let report = report?;
    if report.requests_failed > 0 {
        bail!(
            "{} of {} requests failed",
            report.requests_failed,
            report.requests_failed + report.requests_ok
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, RouterSettings, SessionConfig};

    fn config(spokes: usize, rounds: usize) -> Config {
        Config {
            session: SessionConfig {
                hub: "hub".to_string(),
                spokes,
                rounds,
                payload_size: 16,
            },
            router: RouterSettings {
                request_timeout_ms: 5_000,
                queue_capacity: 64,
            },
            ..Config::default()
        }
    }

    #[tokio::test]
    async fn test_session_delivers_everything() {
        let report = run(&config(3, 4)).await.unwrap();

        assert_eq!(report.peers, 4);
        assert_eq!(report.notifications_sent, 16);
        assert_eq!(report.notifications_received, report.notifications_expected());
        // Three spokes, each echoing with the hub and one neighbour.
        assert_eq!(report.requests_ok, 3 * 2 * 4);
        assert_eq!(report.requests_failed, 0);
    }

    #[tokio::test]
    async fn test_hub_only_session() {
        let report = run(&config(0, 2)).await.unwrap();

        assert_eq!(report.peers, 1);
        assert_eq!(report.notifications_received, 0);
        assert_eq!(report.requests_ok, 0);
    }

    #[tokio::test]
    async fn test_shutdown_stops_routers() {
        let session = Session::build(&config(2, 1)).unwrap();
        session.shutdown();

        assert!(session.peers().all(|r| !r.is_running()));
        assert!(session.net.peers().is_empty());
    }
}
