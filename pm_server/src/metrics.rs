//! Prometheus metrics for settlement.
//!
//! Metrics are exposed in Prometheus text format on a separate listener.
//!
//! # Metrics
//!
//! - `settlements_total{outcome}`: settle requests by outcome
//! - `settlement_duration_ms{outcome}`: settle latency, lock wait included
//! - `settlement_paid_cents_total`: cents credited to wallets by settlements
//!
//! # Example Usage
//!
//! ```rust,no_run
//! use pm_server::metrics;
//! use std::net::SocketAddr;
//!
//! let addr: SocketAddr = "127.0.0.1:9090".parse().unwrap();
//! metrics::init_metrics(addr).unwrap();
//!
//! metrics::settlement_completed("settled", 14.2);
//! metrics::settlement_paid_cents(95_000);
//! ```

use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;

/// Initialize Prometheus metrics exporter.
///
/// Metrics will be available at `http://<addr>/metrics`.
///
/// # Errors
///
/// Returns an error message if the exporter can't be installed
pub fn init_metrics(addr: SocketAddr) -> Result<(), String> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| format!("Failed to install Prometheus exporter: {}", e))
}

/// Record a finished settle request.
pub fn settlement_completed(outcome: &'static str, duration_ms: f64) {
    metrics::counter!("settlements_total", "outcome" => outcome).increment(1);
    metrics::histogram!("settlement_duration_ms", "outcome" => outcome).record(duration_ms);
}

/// Add the cents a settlement credited to wallets.
///
/// Replays of an already settled tournament are counted again; the counter
/// tracks plans served, not ledger movements.
pub fn settlement_paid_cents(cents: i64) {
    metrics::counter!("settlement_paid_cents_total").increment(cents.max(0) as u64);
}
