//! Wallet ledger: the only place user balances change.
//!
//! This module implements:
//! - Double-entry ledger for all wallet transactions
//! - Idempotency keys to prevent duplicate credits
//! - Relative increments that compose with concurrent activity
//! - Credits that join a caller's transaction for atomic settlement
//!
//! ## Example
//!
//! ```no_run
//! use prediction_market::wallet::{CreditInstruction, WalletManager};
//! use prediction_market::db::Database;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let db = Database::new(&Default::default()).await?;
//!     let wallet = WalletManager::new(Arc::new(db.pool().clone()));
//!
//!     let new_balance = wallet.credit(&CreditInstruction::payout(7, 1, 2_500)).await?;
//!     println!("New balance after payout: {}", new_balance);
//!
//!     Ok(())
//! }
//! ```

pub mod errors;
pub mod manager;
pub mod models;

pub use errors::{WalletError, WalletResult};
pub use manager::WalletManager;
pub use models::{CreditInstruction, EntryDirection, EntryType, Wallet, WalletEntry};
