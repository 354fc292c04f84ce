//! Tournament module: records, entries, and lifecycle.
//!
//! This module provides:
//! - Tournament creation with validated fee and payout configuration
//! - Entry registration and stack updates while a tournament is open
//! - Lifecycle transitions (open, closed, settling, settled, settlement_failed)
//! - Read-back of the payout plan persisted at settlement
//!
//! ## Example
//!
//! ```no_run
//! use prediction_market::tournament::{TournamentManager, TournamentConfig};
//! use prediction_market::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let tournaments = TournamentManager::new(Arc::new(db.pool().clone()));
//!
//!     let config = TournamentConfig::winner_takes_all("Sunday Derby".to_string());
//!     let tournament_id = tournaments.create_tournament(config).await?;
//!     tournaments.add_entry(tournament_id, 1).await?;
//!     tournaments.record_stack(tournament_id, 1, 12_500).await?;
//!     tournaments.close_tournament(tournament_id).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod manager;
pub mod models;

pub use manager::{TournamentError, TournamentManager, TournamentResult};
pub use models::{
    Entry, Tournament, TournamentConfig, TournamentId, TournamentStatus, UserId,
};
