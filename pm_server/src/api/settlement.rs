//! Settlement API handlers.
//!
//! Operator endpoints that trigger, recover, and read back tournament
//! settlements. Every failure is answered with the same JSON shape so a
//! caller can tell retryable conflicts from errors that need a human.
//!
//! # Examples
//!
//! Settle a closed tournament:
//! ```bash
//! curl -X POST http://localhost:8080/admin/tournaments/42/settle
//! ```
//!
//! Give up on a tournament left in settling by a process that died:
//! ```bash
//! curl -X POST http://localhost:8080/admin/tournaments/42/fail
//! ```
//!
//! Return a failed settlement to closed after reconciling the ledger:
//! ```bash
//! curl -X POST http://localhost:8080/admin/tournaments/42/reset
//! ```

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use prediction_market::payout::PayoutPlan;
use prediction_market::settlement::{SettlementError, SettlementStage};
use prediction_market::tournament::{TournamentId, TournamentStatus};
use serde::Serialize;
use std::time::Instant;

use super::AppState;
use crate::{logging, metrics};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
    pub stage: Option<SettlementStage>,
    pub tournament_id: TournamentId,
    pub retryable: bool,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub tournament_id: TournamentId,
    pub status: TournamentStatus,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

/// Stable machine-readable name of a settlement error
pub fn error_code(err: &SettlementError) -> &'static str {
    match err {
        SettlementError::NotFound(_) => "not_found",
        SettlementError::InvalidState { .. } => "invalid_state",
        SettlementError::InvalidFeeConfig { .. } => "invalid_fee_config",
        SettlementError::InsufficientData { .. } => "insufficient_data",
        SettlementError::LockTimeout { .. } => "lock_timeout",
        SettlementError::InProgress { .. } => "in_progress",
        SettlementError::PartialCommit {
            ambiguous: true, ..
        } => "partial_commit_ambiguous",
        SettlementError::PartialCommit { .. } => "partial_commit",
        SettlementError::Store { .. } => "store_error",
    }
}

/// HTTP status for a settlement error
pub fn status_for(err: &SettlementError) -> StatusCode {
    match err {
        SettlementError::NotFound(_) => StatusCode::NOT_FOUND,
        SettlementError::InvalidState { .. } | SettlementError::InProgress { .. } => {
            StatusCode::CONFLICT
        }
        SettlementError::LockTimeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
        SettlementError::InvalidFeeConfig { .. } | SettlementError::InsufficientData { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        SettlementError::PartialCommit { .. } | SettlementError::Store { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

fn error_response(err: &SettlementError) -> ApiError {
    let status = status_for(err);
    if status.is_server_error() {
        tracing::error!(
            tournament_id = err.tournament_id(),
            stage = %err.stage(),
            mutation_possible = err.mutation_possible(),
            "Settlement failed: {}",
            err
        );
    }

    (
        status,
        Json(ErrorResponse {
            error: err.client_message(),
            code: error_code(err),
            stage: Some(err.stage()),
            tournament_id: err.tournament_id(),
            retryable: err.is_retryable(),
        }),
    )
}

/// Settle a closed tournament.
///
/// # Path Parameters
///
/// - `tournament_id`: Tournament ID (integer)
///
/// # Response
///
/// Returns `200 OK` with the payout plan. Calling it again for a settled
/// tournament returns the same plan and pays nothing.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
/// - `409 Conflict`: Tournament is open, awaiting reset, or settling elsewhere
/// - `422 Unprocessable Entity`: No entries or unusable fee configuration
/// - `503 Service Unavailable`: Another settlement held the lock too long
/// - `500 Internal Server Error`: Commit failed; `code` says whether it was rolled back
pub async fn settle(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<PayoutPlan>, ApiError> {
    let start = Instant::now();
    let result = state.coordinator.settle(tournament_id).await;
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    match result {
        Ok(plan) => {
            metrics::settlement_completed("settled", duration_ms);
            metrics::settlement_paid_cents(plan.distributed_cents() + plan.creator_cents);
            logging::log_settlement_event("settle", tournament_id, "settled", duration_ms as u64);
            Ok(Json(plan))
        }
        Err(err) => {
            let code = error_code(&err);
            metrics::settlement_completed(code, duration_ms);
            logging::log_settlement_event("settle", tournament_id, code, duration_ms as u64);
            Err(error_response(&err))
        }
    }
}

/// Move a tournament from settlement_failed back to closed.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
/// - `409 Conflict`: Tournament is not in settlement_failed
pub async fn reset(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<StatusResponse>, ApiError> {
    let start = Instant::now();
    let result = state.coordinator.reset_failed(tournament_id).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            logging::log_settlement_event("reset", tournament_id, "closed", duration_ms);
            Ok(Json(StatusResponse {
                tournament_id,
                status: TournamentStatus::Closed,
            }))
        }
        Err(err) => {
            logging::log_settlement_event("reset", tournament_id, error_code(&err), duration_ms);
            Err(error_response(&err))
        }
    }
}

/// Move a tournament stuck in settling to settlement_failed.
///
/// For when the process that started the settlement is gone. Reconcile the
/// ledger, then call `reset`.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist
/// - `409 Conflict`: Tournament is not in settling
/// - `503 Service Unavailable`: A settlement in this server is still running
pub async fn mark_failed(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<StatusResponse>, ApiError> {
    let start = Instant::now();
    let result = state.coordinator.mark_stuck_failed(tournament_id).await;
    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok(()) => {
            logging::log_settlement_event(
                "mark_failed",
                tournament_id,
                "settlement_failed",
                duration_ms,
            );
            Ok(Json(StatusResponse {
                tournament_id,
                status: TournamentStatus::SettlementFailed,
            }))
        }
        Err(err) => {
            logging::log_settlement_event(
                "mark_failed",
                tournament_id,
                error_code(&err),
                duration_ms,
            );
            Err(error_response(&err))
        }
    }
}

/// Read back the plan persisted by a completed settlement.
///
/// # Errors
///
/// - `404 Not Found`: Tournament doesn't exist or isn't settled yet
pub async fn get_plan(
    State(state): State<AppState>,
    Path(tournament_id): Path<TournamentId>,
) -> Result<Json<PayoutPlan>, ApiError> {
    match state.coordinator.settlement_plan(tournament_id).await {
        Ok(Some(plan)) => Ok(Json(plan)),
        Ok(None) => Err((
            StatusCode::NOT_FOUND,
            Json(ErrorResponse {
                error: format!("Tournament {tournament_id} is not settled"),
                code: "not_settled",
                stage: None,
                tournament_id,
                retryable: false,
            }),
        )),
        Err(err) => Err(error_response(&err)),
    }
}
