use std::fmt;

use alloy::primitives::U256;
use bigdecimal::BigDecimal;
use derive_more::Display;

use crate::utils::constants::LOW_LIQUIDITY_THRESHOLD;

/// Coarse classification of a pool's active liquidity at the time of a quote.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum LiquidityStatus {
    /// Liquidity at or above [`LOW_LIQUIDITY_THRESHOLD`]
    #[display("high")]
    High,
    /// Liquidity below [`LOW_LIQUIDITY_THRESHOLD`]
    #[display("low")]
    Low,
}

impl LiquidityStatus {
    /// Classifies a raw in-range liquidity value.
    #[must_use]
    pub fn classify(liquidity: U256) -> Self {
        if liquidity < U256::from(LOW_LIQUIDITY_THRESHOLD) {
            Self::Low
        } else {
            Self::High
        }
    }
}

/// A normalized price observed on one venue for one symbol.
///
/// Quotes are produced by a venue price stream for every swap seen on the pool
/// and are never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceQuote {
    /// Name of the venue that produced the quote, e.g. `Uniswap`
    pub venue: String,
    /// Trading pair symbol in `BASE/QUOTE` form
    pub symbol: String,
    /// Quote-per-base price in human units
    pub price: BigDecimal,
    /// Pool liquidity copied from the swap event
    pub liquidity: U256,
    /// Classification of `liquidity`
    pub liquidity_status: LiquidityStatus,
}

impl PriceQuote {
    /// Builds a quote, deriving the liquidity status from `liquidity`.
    #[must_use]
    pub fn new(venue: &str, symbol: &str, price: BigDecimal, liquidity: U256) -> Self {
        Self {
            venue: venue.to_string(),
            symbol: symbol.to_string(),
            price,
            liquidity,
            liquidity_status: LiquidityStatus::classify(liquidity),
        }
    }
}

impl fmt::Display for PriceQuote {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} @ {} (liquidity {} {})",
            self.venue, self.symbol, self.price, self.liquidity, self.liquidity_status
        )
    }
}

/// One of the two venues an engine reconciles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum VenueSide {
    /// The first venue passed to the engine
    A,
    /// The second venue passed to the engine
    B,
}

impl VenueSide {
    /// The other venue of the pair.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Outcome of one evaluation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// No profitable opportunity
    Hold,
    /// Buy on the cheap venue and sell on the rich one
    Arbitrage {
        /// Venue to buy the base token on
        buy_on: VenueSide,
        /// Venue to sell the base token on
        sell_on: VenueSide,
    },
}

impl Decision {
    /// A round trip that buys on `buy_on` and sells on the other venue.
    #[must_use]
    pub const fn buy_on(buy_on: VenueSide) -> Self {
        Self::Arbitrage {
            buy_on,
            sell_on: buy_on.other(),
        }
    }

    /// Whether this decision asks for a trade.
    #[must_use]
    pub const fn is_trade(&self) -> bool {
        matches!(self, Self::Arbitrage { .. })
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hold => write!(f, "hold"),
            Self::Arbitrage { buy_on, sell_on } => write!(f, "buy {buy_on} / sell {sell_on}"),
        }
    }
}
