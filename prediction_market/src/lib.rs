//! # Prediction Market
//!
//! Tournament settlement and payout engine for a social prediction market.
//!
//! When a tournament closes, the engine ranks its entries by final stack,
//! splits the pot into platform fee, creator fee, and net pool, distributes
//! the net pool along the tournament's payout curve, and commits every wallet
//! credit together with the flip to settled. A settlement happens at most
//! once; asking again returns the stored plan.
//!
//! ## Pipeline
//!
//! Store → [`ranking`] → [`payout`] → [`settlement`] → [`wallet`] ledger + store.
//!
//! ## Core Modules
//!
//! - [`payout`]: Pure fee and payout calculation, integer cents throughout
//! - [`ranking`]: Final standings with deterministic tie handling
//! - [`settlement`]: Coordinator, locks, and the storage seam
//! - [`tournament`]: Tournament records, entries, and lifecycle
//! - [`wallet`]: Double-entry ledger with idempotency keys
//! - [`db`]: Postgres connection pooling and query timeouts
//!
//! ## Example
//!
//! ```
//! use prediction_market::payout::{FeeConfig, PayoutStructure, compute_payouts};
//! use prediction_market::ranking::resolve_ranking;
//! use prediction_market::tournament::Entry;
//!
//! let entries = [Entry::new(1, 10, 800), Entry::new(1, 11, 500), Entry::new(1, 12, 100)];
//! let ranked = resolve_ranking(&entries).unwrap();
//! let curve = PayoutStructure::new([(1, 70), (2, 20), (3, 10)]).unwrap();
//!
//! let plan = compute_payouts(1_000, &FeeConfig::zero(), &curve, &ranked).unwrap();
//! assert_eq!(plan.payout_for(10), Some(700));
//! assert_eq!(plan.payout_for(12), Some(100));
//! ```

/// Database connection pooling and query timeouts.
pub mod db;

/// Fee and payout calculation.
pub mod payout;
pub use payout::{FeeConfig, PayoutPlan, PayoutStructure, compute_payouts};

/// Final standings.
pub mod ranking;
pub use ranking::{RankedEntry, resolve_ranking};

/// Settlement coordination.
pub mod settlement;
pub use settlement::{SettlementCoordinator, SettlementError};

/// Tournament records and lifecycle.
pub mod tournament;

/// Wallet ledger.
pub mod wallet;
