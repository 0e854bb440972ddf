//! # Courier Simulator
//!
//! Runs a star-topology session over the in-memory network: a hub and its
//! spokes exchange notifications and echo requests through their routers.
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! courier-sim
//!
//! # Run with custom config
//! courier-sim /path/to/courier.toml
//!
//! # Run with environment variables
//! COURIER_SPOKES=8 COURIER_ROUNDS=100 courier-sim
//! ```

mod config;
mod metrics;
mod scenario;

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "courier_core=debug,courier_transport=debug,courier_sim=info".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let path = std::env::args().nth(1);
    let config = config::Config::load(path.as_deref())?;

    tracing::info!(
        hub = %config.session.hub,
        spokes = config.session.spokes,
        rounds = config.session.rounds,
        "Starting Courier session"
    );

    metrics::init_metrics();
    if config.metrics.enabled {
        metrics::start_metrics_server(config.metrics.port)?;
    }

    let report = scenario::run(&config).await?;

    tracing::info!(
        notifications = report.notifications_received,
        expected = report.notifications_expected(),
        requests = report.requests_ok,
        elapsed_ms = report.elapsed.as_millis() as u64,
        "Session complete"
    );

    Ok(())
}
