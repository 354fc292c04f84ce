//! Fee and payout calculation.
//!
//! This module is pure: it turns a pot, a fee configuration, a payout curve,
//! and a ranked field into a [`PayoutPlan`]. It performs no I/O and never
//! touches wallet balances.
//!
//! ## Example
//!
//! ```
//! use prediction_market::payout::{FeeConfig, PayoutStructure, compute_payouts};
//! use prediction_market::ranking::resolve_ranking;
//! use prediction_market::tournament::Entry;
//!
//! let fees = FeeConfig::new(5, 5).unwrap();
//! let curve = PayoutStructure::new([(1, 70), (2, 30)]).unwrap();
//! let ranked = resolve_ranking(&[Entry::new(1, 10, 900), Entry::new(1, 11, 400)]).unwrap();
//!
//! let plan = compute_payouts(10_000, &fees, &curve, &ranked).unwrap();
//! assert_eq!(plan.net_pool_cents, 9_000);
//! assert_eq!(plan.payout_for(10), Some(6_300));
//! assert!(plan.is_balanced());
//! ```

pub mod calculator;
pub mod errors;
pub mod models;

pub use calculator::compute_payouts;
pub use errors::{PayoutError, PayoutResult};
pub use models::{FeeConfig, PayoutPlan, PayoutStructure, WinnerPayout};
