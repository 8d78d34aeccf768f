//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_decisions_total` (counter): admission outcomes by outcome, reason
//! - `gateway_offender_attempts_total` (counter): recorded failed attempts
//! - `gateway_offender_blocks_total` (counter): addresses newly blocked
//! - `gateway_tracked_offenders` (gauge): records held by the tracker
//! - `gateway_invalid_patterns_total` (counter): malformed allow-rules hit at runtime
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every call is a no-op
//! - Prometheus exporter is optional and bound to its own address

use std::net::SocketAddr;

use metrics::{counter, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus recorder and its HTTP scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

/// Count one admission decision.
pub fn record_decision(outcome: &'static str, reason: &'static str) {
    counter!("gateway_decisions_total", "outcome" => outcome, "reason" => reason).increment(1);
}

pub fn record_offender_attempt() {
    counter!("gateway_offender_attempts_total").increment(1);
}

pub fn record_offender_block() {
    counter!("gateway_offender_blocks_total").increment(1);
}

pub fn record_tracked_offenders(count: usize) {
    gauge!("gateway_tracked_offenders").set(count as f64);
}

pub fn record_invalid_pattern() {
    counter!("gateway_invalid_patterns_total").increment(1);
}
