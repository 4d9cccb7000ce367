use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use bigdecimal::{BigDecimal, Zero};
use eyre::{bail, Result};
use log::{error, info};

/// Trading parameters for one arbitrage session.
///
/// `notional_amount`, `profit_threshold` and `fixed_execution_cost` are all in
/// quote-currency units. No conversion happens anywhere in the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderConfig {
    /// Trade size spent on the buy leg, in quote currency
    pub notional_amount: BigDecimal,
    /// Minimum net profit, in quote currency, that triggers a trade
    pub profit_threshold: BigDecimal,
    /// Extra spread required on top of both venue fees
    pub slippage_buffer: BigDecimal,
    /// Gas and other per-trade costs, in quote currency
    pub fixed_execution_cost: BigDecimal,
    /// Symbol the engine subscribes to, in `BASE/QUOTE` form
    pub active_symbol: String,
}

impl Default for OrderConfig {
    fn default() -> Self {
        Self {
            notional_amount: BigDecimal::new(3.into(), 3),
            profit_threshold: BigDecimal::new(1.into(), 4),
            slippage_buffer: BigDecimal::new(1.into(), 3),
            fixed_execution_cost: BigDecimal::new(5.into(), 5),
            active_symbol: "USDT/WBNB".to_string(),
        }
    }
}

impl OrderConfig {
    /// Checks the invariants every applied configuration must hold.
    ///
    /// # Errors
    /// * If `notional_amount` or `profit_threshold` is not strictly positive
    /// * If `active_symbol` is empty
    pub fn validate(&self) -> Result<()> {
        if self.notional_amount <= BigDecimal::zero() {
            bail!("notional amount must be positive, got {}", self.notional_amount);
        }
        if self.profit_threshold <= BigDecimal::zero() {
            bail!("profit threshold must be positive, got {}", self.profit_threshold);
        }
        if self.active_symbol.is_empty() {
            bail!("active symbol must not be empty");
        }
        Ok(())
    }

    /// Parses a decimal parameter, naming it in the error.
    ///
    /// # Errors
    /// * If `value` is not a decimal number
    pub fn parse_decimal(name: &str, value: &str) -> Result<BigDecimal> {
        BigDecimal::from_str(value.trim())
            .map_err(|e| eyre::eyre!("invalid {name} '{value}': {e}"))
    }
}

/// The live order configuration shared between the engine and its operator.
///
/// Readers always get a full snapshot taken under the read lock, so one
/// evaluation never sees half of an update.
#[derive(Debug, Clone)]
pub struct SharedOrderConfig {
    /// The current configuration
    inner: Arc<RwLock<OrderConfig>>,
}

impl SharedOrderConfig {
    /// Wraps an initial configuration.
    ///
    /// # Errors
    /// * If `config` does not pass [`OrderConfig::validate`]
    pub fn new(config: OrderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(RwLock::new(config)),
        })
    }

    /// Replaces the configuration if `config` is valid.
    ///
    /// An invalid update is logged and dropped; the previous configuration
    /// stays in place.
    ///
    /// # Returns
    /// * `true` if the update was applied
    pub fn set_config(&self, config: OrderConfig) -> bool {
        if let Err(e) = config.validate() {
            error!("order_config::set_config: rejected update: {e}");
            return false;
        }

        info!(
            "order_config::set_config: notional={} threshold={} slippage={} fixed_cost={} symbol={}",
            config.notional_amount,
            config.profit_threshold,
            config.slippage_buffer,
            config.fixed_execution_cost,
            config.active_symbol
        );
        let mut current = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        *current = config;
        true
    }

    /// A consistent copy of the current configuration.
    #[must_use]
    pub fn current_config(&self) -> OrderConfig {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
