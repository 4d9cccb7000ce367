//! # Venue Module
//!
//! Everything the engine knows about a trading venue goes through the
//! [`Venue`] trait: a price stream per symbol, a fee rate, and buy/sell.
//! Node connections, event decoding and transaction signing stay behind it.

use std::str::FromStr;

use alloy::primitives::TxHash;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use clap::ValueEnum;
use derive_more::Display;
use eyre::{bail, Error, Result};

/// Alloy-backed swap source and swap executor
pub mod chain;
/// Price subscriptions with per-symbol deduplication
pub mod feed;
/// Static pool reference data
pub mod pool_configs;
/// `Venue` implementation over a pool feed and a swap executor
pub mod pool_venue;
/// Token balances and router allowances of the trading account
pub mod wallet;

pub use feed::{PriceFeed, PriceStream, RawSwap, ReconnectPolicy, SwapSource, SwapStream};
pub use pool_configs::PoolConfig;

/// Supported exchanges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, ValueEnum)]
pub enum DexApp {
    /// Uniswap V3
    #[display("Uniswap")]
    Uniswap,
    /// PancakeSwap V3
    #[display("Pancakeswap")]
    Pancakeswap,
}

impl DexApp {
    /// Fee rate charged on the input token of every swap.
    #[must_use]
    pub fn default_fee_rate(self) -> BigDecimal {
        match self {
            Self::Uniswap => BigDecimal::new(3.into(), 3),
            Self::Pancakeswap => BigDecimal::new(25.into(), 4),
        }
    }
}

impl FromStr for DexApp {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "uniswap" | "uniswapv3" => Ok(Self::Uniswap),
            "pancakeswap" | "pancake" | "pancakeswapv3" => Ok(Self::Pancakeswap),
            other => bail!("unknown dex '{other}'"),
        }
    }
}

/// Trading capability of one venue, as seen by the arbitrage engine.
#[async_trait]
pub trait Venue: Send + Sync {
    /// Human readable venue name, attached to quotes and logs.
    fn name(&self) -> &str;

    /// Stream of normalized prices for `symbol`.
    ///
    /// # Errors
    /// * If the venue does not list `symbol` or the subscription fails
    async fn price_stream(&self, symbol: &str) -> Result<PriceStream>;

    /// Closes the price stream for `symbol`.
    ///
    /// # Returns
    /// * `true` if a subscription was open
    async fn unsubscribe(&self, symbol: &str) -> bool;

    /// Proportional fee taken on every swap, e.g. `0.003`.
    fn fee_rate(&self) -> BigDecimal;

    /// Spends `amount` of the quote token on the base token.
    ///
    /// `amount` is a human-scale token amount, scaled by the token's decimals
    /// only when the swap is built.
    ///
    /// # Errors
    /// * If the swap cannot be built or submitted
    async fn buy(&self, amount: &BigDecimal, symbol: &str) -> Result<TxHash>;

    /// Spends `amount` of the base token on the quote token.
    ///
    /// The engine passes its quote-currency notional to both legs unchanged,
    /// so here it is spent as that many base tokens.
    ///
    /// # Errors
    /// * If the swap cannot be built or submitted
    async fn sell(&self, amount: &BigDecimal, symbol: &str) -> Result<TxHash>;
}
