//! Router instrumentation.
//!
//! Recorded through the `metrics` facade; without an installed recorder
//! every call is a no-op.

use courier_protocol::EnvelopeKind;
use metrics::{counter, gauge, histogram};

/// Metric names.
pub mod names {
    pub const ENVELOPES_SENT: &str = "courier_envelopes_sent_total";
    pub const ENVELOPES_RECEIVED: &str = "courier_envelopes_received_total";
    pub const BYTES_SENT: &str = "courier_bytes_sent_total";
    pub const BYTES_RECEIVED: &str = "courier_bytes_received_total";
    pub const MALFORMED_TOTAL: &str = "courier_malformed_envelopes_total";
    pub const UNROUTED_TOTAL: &str = "courier_unrouted_total";
    pub const HANDLER_FAILURES_TOTAL: &str = "courier_handler_failures_total";
    pub const REQUESTS_OUTSTANDING: &str = "courier_requests_outstanding";
    pub const REQUESTS_TOTAL: &str = "courier_requests_total";
    pub const REQUEST_LATENCY_SECONDS: &str = "courier_request_latency_seconds";
}

/// Record an envelope handed to the network.
pub fn record_sent(kind: EnvelopeKind, bytes: usize) {
    counter!(names::ENVELOPES_SENT, "kind" => kind.as_str()).increment(1);
    counter!(names::BYTES_SENT, "kind" => kind.as_str()).increment(bytes as u64);
}

/// Record a decoded inbound envelope.
pub fn record_received(kind: EnvelopeKind, bytes: usize) {
    counter!(names::ENVELOPES_RECEIVED, "kind" => kind.as_str()).increment(1);
    counter!(names::BYTES_RECEIVED, "kind" => kind.as_str()).increment(bytes as u64);
}

/// Record a frame that failed to decode.
pub fn record_malformed() {
    counter!(names::MALFORMED_TOTAL).increment(1);
}

/// Record an inbound envelope with no destination.
pub fn record_unrouted(kind: EnvelopeKind) {
    counter!(names::UNROUTED_TOTAL, "kind" => kind.as_str()).increment(1);
}

/// Record a handler that returned an error or panicked.
pub fn record_handler_failure(kind: EnvelopeKind, reason: &'static str) {
    counter!(names::HANDLER_FAILURES_TOTAL, "kind" => kind.as_str(), "reason" => reason)
        .increment(1);
}

/// Record a newly outstanding request.
pub fn record_request_started() {
    gauge!(names::REQUESTS_OUTSTANDING).increment(1.0);
}

/// Record a request leaving the outstanding table.
pub fn record_request_finished(outcome: &'static str, seconds: f64) {
    gauge!(names::REQUESTS_OUTSTANDING).decrement(1.0);
    counter!(names::REQUESTS_TOTAL, "outcome" => outcome).increment(1);
    histogram!(names::REQUEST_LATENCY_SECONDS, "outcome" => outcome).record(seconds);
}
