//! Metrics export for the simulator.
//!
//! The router records through the `metrics` facade; this module describes
//! those metrics and installs a Prometheus exporter for them.

use courier_core::metrics::names;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

/// Describe every router metric.
pub fn init_metrics() {
    metrics::describe_counter!(names::ENVELOPES_SENT, "Envelopes handed to the network");
    metrics::describe_counter!(names::ENVELOPES_RECEIVED, "Envelopes decoded from the network");
    metrics::describe_counter!(names::BYTES_SENT, "Encoded bytes handed to the network");
    metrics::describe_counter!(names::BYTES_RECEIVED, "Encoded bytes decoded from the network");
    metrics::describe_counter!(names::MALFORMED_TOTAL, "Inbound frames that failed to decode");
    metrics::describe_counter!(
        names::UNROUTED_TOTAL,
        "Inbound envelopes dropped for lack of a destination"
    );
    metrics::describe_counter!(
        names::HANDLER_FAILURES_TOTAL,
        "Handlers that returned an error or panicked"
    );
    metrics::describe_gauge!(
        names::REQUESTS_OUTSTANDING,
        "Requests sent and still waiting for a response"
    );
    metrics::describe_counter!(names::REQUESTS_TOTAL, "Finished requests by outcome");
    metrics::describe_histogram!(
        names::REQUEST_LATENCY_SECONDS,
        "Time from request send to outcome in seconds"
    );

    info!("Metrics initialized");
}

/// Start the Prometheus metrics server.
///
/// # Errors
///
/// Returns an error if the exporter cannot be installed.
pub fn start_metrics_server(port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("0.0.0.0:{}", port).parse()?;

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    info!("Metrics server listening on {}", addr);
    Ok(())
}
