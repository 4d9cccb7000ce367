//! # Arbitrage Module
//!
//! Everything needed to decide whether two venue prices are worth trading:
//! price normalization, the two-stage profitability test, the live order
//! configuration and the engine tying them to a pair of venues.

/// Reconciliation loop between two venues
pub mod engine;
/// Spread and net-profit tests
pub mod opportunity;
/// Live trading parameters
pub mod order_config;
/// Fixed-point price conversion
pub mod price;
/// Test helpers and utilities
#[cfg(test)]
pub(crate) mod test_helpers;
/// Common type definitions
pub mod types;

pub use engine::{ArbEngine, EngineState, Phase};
pub use opportunity::{evaluate, Evaluation, ProfitReport, VenueFees};
pub use order_config::{OrderConfig, SharedOrderConfig};
pub use types::{Decision, LiquidityStatus, PriceQuote, VenueSide};
