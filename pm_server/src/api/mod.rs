//! HTTP API for the settlement server.
//!
//! Operators (or the scheduler that closes tournaments) trigger settlement
//! here. The server holds no state of its own beyond the coordinator, whose
//! per-tournament locks make concurrent requests for one tournament queue up.
//!
//! # Endpoints Overview
//!
//! ## Settlement
//! - `POST /admin/tournaments/{id}/settle` - Settle a closed tournament
//! - `POST /admin/tournaments/{id}/fail` - Mark a settlement stuck in settling as failed
//! - `POST /admin/tournaments/{id}/reset` - Return a failed settlement to closed
//! - `GET /admin/tournaments/{id}/settlement` - Persisted payout plan
//!
//! ## Health Check
//! - `GET /health` - Server health status
//!
//! # Security
//!
//! The admin routes carry no authentication of their own; deploy them behind
//! the internal network boundary.

pub mod settlement;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
    routing::{get, post},
};
use prediction_market::settlement::SettlementCoordinator;
use serde_json::json;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Application state shared across all HTTP handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<SettlementCoordinator>,
}

/// Create the API router with all endpoints and middleware.
///
/// # Example
///
/// ```rust,no_run
/// use pm_server::api::{AppState, create_router};
/// use prediction_market::settlement::{
///     InMemorySettlementStore, SettlementConfig, SettlementCoordinator,
/// };
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = Arc::new(InMemorySettlementStore::new());
/// let coordinator = SettlementCoordinator::new(store, SettlementConfig::default());
/// let app = create_router(AppState {
///     coordinator: Arc::new(coordinator),
/// });
/// let listener = tokio::net::TcpListener::bind("127.0.0.1:8080").await?;
/// axum::serve(listener, app).await?;
/// # Ok(())
/// # }
/// ```
pub fn create_router(state: AppState) -> Router {
    let admin_routes = Router::new()
        .route(
            "/tournaments/{tournament_id}/settle",
            post(settlement::settle),
        )
        .route("/tournaments/{tournament_id}/fail", post(settlement::mark_failed))
        .route("/tournaments/{tournament_id}/reset", post(settlement::reset))
        .route(
            "/tournaments/{tournament_id}/settlement",
            get(settlement::get_plan),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/admin", admin_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint for monitoring and load balancers.
///
/// Returns `200 OK` if the settlement store answers, or `503 Service
/// Unavailable` otherwise.
///
/// ```bash
/// curl http://localhost:8080/health
/// # {"status":"healthy","store":true,"version":"0.1.0","timestamp":"2026-10-19T10:30:00Z"}
/// ```
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let store_healthy = state.coordinator.store().health_check().await.is_ok();

    let status_code = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = json!({
        "status": if store_healthy { "healthy" } else { "unhealthy" },
        "version": env!("CARGO_PKG_VERSION"),
        "store": store_healthy,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    });

    (status_code, Json(response))
}
