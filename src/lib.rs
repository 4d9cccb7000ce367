/*!
 * # Arbitrator - Two-Venue DEX Arbitrage
 *
 * Arbitrator watches the same trading pair on two concentrated-liquidity
 * exchanges and trades the spread when it pays for both fees, slippage and
 * execution cost.
 *
 * ## Core Features
 *
 * - **Price Streams**: Normalized pool prices from live swap events
 * - **Decision Engine**: Spread test followed by a net-profit simulation
 * - **Live Configuration**: Validated updates to the trading parameters
 * - **Execution**: Router swaps, with a dry-run mode
 *
 * ## Module Structure
 *
 * - `arb`: Price normalization, profitability tests and the engine
 * - `config`: Configuration from the environment
 * - `dex`: Venues, price feeds, pool tables and chain adapters
 * - `notify`: Operator notifications
 * - `utils`: Networks, constants, logging and providers
 */

/// Arbitrage decision logic
pub mod arb;
/// Configuration management for the system
pub mod config;
/// Trading venues
pub mod dex;
/// Operator notifications
pub mod notify;
/// Utility functions and helpers
pub mod utils;
