//! Structured logging configuration.
//!
//! The library crate logs through the `log` facade; `tracing-subscriber`
//! picks those records up alongside the server's own `tracing` events.

use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize structured logging
///
/// Log levels are configurable via the `RUST_LOG` env var
/// (default: `info,sqlx=warn,hyper=warn`).
///
/// # Example
///
/// ```no_run
/// use pm_server::logging;
///
/// #[tokio::main]
/// async fn main() {
///     logging::init();
///     tracing::info!("Server starting");
/// }
/// ```
pub fn init() {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sqlx=warn,hyper=warn"));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();

    tracing::info!("Structured logging initialized");
}

/// Log a settlement request outcome with structured data
///
/// # Arguments
///
/// * `operation` - `settle` or `reset`
/// * `tournament_id` - Tournament the request targeted
/// * `outcome` - `settled`, `closed`, or an error code
/// * `duration_ms` - Time spent, lock wait included
///
/// # Example
///
/// ```
/// use pm_server::logging::log_settlement_event;
///
/// log_settlement_event("settle", 42, "settled", 18);
/// ```
pub fn log_settlement_event(operation: &str, tournament_id: i64, outcome: &str, duration_ms: u64) {
    if duration_ms > 1000 {
        tracing::warn!(
            operation = operation,
            tournament_id = tournament_id,
            outcome = outcome,
            duration_ms = duration_ms,
            "SETTLEMENT: Slow request"
        );
    } else {
        tracing::info!(
            operation = operation,
            tournament_id = tournament_id,
            outcome = outcome,
            duration_ms = duration_ms,
            "SETTLEMENT: Request completed"
        );
    }
}
