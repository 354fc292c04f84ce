//! Settlement server library: HTTP API, configuration, logging, and metrics.

pub mod api;
pub mod config;
pub mod logging;
pub mod metrics;
