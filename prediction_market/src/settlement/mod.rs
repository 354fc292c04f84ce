//! Settlement: turning a closed tournament into wallet credits, exactly once.
//!
//! This module provides:
//! - [`SettlementCoordinator`]: lock, rank, calculate, and commit atomically
//! - [`SettlementStore`]: the storage seam, with Postgres and in-memory stores
//! - Per-tournament locks bounded by a timeout
//! - Typed errors that say how far an attempt got and whether money may have moved
//!
//! ## Example
//!
//! ```
//! use prediction_market::payout::{FeeConfig, PayoutStructure};
//! use prediction_market::settlement::{
//!     InMemorySettlementStore, SettlementConfig, SettlementCoordinator,
//! };
//! use prediction_market::tournament::{Entry, Tournament, TournamentConfig, TournamentStatus};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(InMemorySettlementStore::new());
//! let config = TournamentConfig {
//!     name: "Monday Night".to_string(),
//!     fees: FeeConfig::new(10, 0)?,
//!     payout_structure: PayoutStructure::new([(1, 60), (2, 40)])?,
//!     creator_id: None,
//! };
//! store.insert_tournament(Tournament::from_config(1, config, 10_000).with_status(TournamentStatus::Closed));
//! for (user_id, stack) in [(10, 4_000), (11, 2_500)] {
//!     store.insert_entry(Entry::new(1, user_id, stack));
//!     store.open_wallet(user_id, 0);
//! }
//!
//! let coordinator = SettlementCoordinator::new(store.clone(), SettlementConfig::default());
//! let plan = coordinator.settle(1).await?;
//! assert_eq!(plan.payout_for(10), Some(5_400));
//! assert_eq!(store.balance(11), Some(3_600));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod coordinator;
pub mod errors;
pub mod lock;
pub mod memory;
pub mod pg_store;
pub mod store;

pub use config::{SettlementConfig, SettlementConfigError};
pub use coordinator::{SettlementCoordinator, credit_instructions};
pub use errors::{SettlementError, SettlementResult, SettlementStage};
pub use lock::{SettlementGuard, SettlementLocks};
pub use memory::{CommitFault, InMemorySettlementStore};
pub use pg_store::PgSettlementStore;
pub use store::{AuditEvent, AuditKind, SettlementStore, StoreError, StoreResult};
