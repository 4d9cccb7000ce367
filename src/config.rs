use std::env;
use std::str::FromStr;

use alloy::signers::local::PrivateKeySigner;
use eyre::{bail, eyre, Result, WrapErr};

use crate::arb::OrderConfig;
use crate::dex::{DexApp, ReconnectPolicy};
use crate::utils::chains::{network, Network};

/// Everything the binary needs to start a session.
#[derive(Debug, Clone)]
pub struct Config {
    /// Network to connect to (`ARB_CHAIN`)
    pub network: Network,
    /// Initial trading parameters
    pub order: OrderConfig,
    /// First venue (`ARB_VENUE_A`); wins price ties
    pub venue_a: DexApp,
    /// Second venue (`ARB_VENUE_B`)
    pub venue_b: DexApp,
    /// Feed reconnect behaviour (`ARB_RECONNECT_ATTEMPTS`)
    pub reconnect: ReconnectPolicy,
    /// Hex private key of the trading account (`ARB_PRIVATE_KEY`)
    pub private_key: Option<String>,
    /// Log swaps instead of broadcasting them (`ARB_DRY_RUN`)
    pub dry_run: bool,
    /// Slack token for operator notifications (`SLACK_OAUTH_TOKEN`)
    pub slack_token: Option<String>,
}

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    ///
    /// # Errors
    /// * See [`Config::from_lookup`]
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from a variable lookup.
    ///
    /// # Errors
    /// * If a numeric or boolean variable does not parse
    /// * If the chain or a venue is unknown, or both venues are the same
    /// * If the order parameters are invalid
    /// * If live trading is requested without a private key
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let chain = var("ARB_CHAIN").unwrap_or_else(|| "BscMainnet".to_string());
        let infura_api_key = var("INFURA_API_KEY").unwrap_or_default();
        let network = network(chain.trim(), &infura_api_key)?;

        let defaults = OrderConfig::default();
        let decimal = |key: &str, default: bigdecimal::BigDecimal| match var(key) {
            Some(value) => OrderConfig::parse_decimal(key, &value),
            None => Ok(default),
        };
        let order = OrderConfig {
            notional_amount: decimal("ARB_NOTIONAL", defaults.notional_amount)?,
            profit_threshold: decimal("ARB_PROFIT_THRESHOLD", defaults.profit_threshold)?,
            slippage_buffer: decimal("ARB_SLIPPAGE", defaults.slippage_buffer)?,
            fixed_execution_cost: decimal("ARB_FIXED_COST", defaults.fixed_execution_cost)?,
            active_symbol: var("ARB_SYMBOL")
                .map_or(defaults.active_symbol, |symbol| symbol.trim().to_string()),
        };
        order.validate()?;

        let venue_a = var("ARB_VENUE_A").map_or(Ok(DexApp::Uniswap), |v| DexApp::from_str(&v))?;
        let venue_b =
            var("ARB_VENUE_B").map_or(Ok(DexApp::Pancakeswap), |v| DexApp::from_str(&v))?;
        if venue_a == venue_b {
            bail!("ARB_VENUE_A and ARB_VENUE_B must differ, both are {venue_a}");
        }

        let reconnect = match var("ARB_RECONNECT_ATTEMPTS") {
            Some(value) => {
                let attempts = value
                    .trim()
                    .parse::<u32>()
                    .wrap_err_with(|| format!("invalid ARB_RECONNECT_ATTEMPTS '{value}'"))?;
                if attempts == 0 {
                    ReconnectPolicy::disabled()
                } else {
                    ReconnectPolicy::exponential(attempts)
                }
            }
            None => ReconnectPolicy::disabled(),
        };

        let dry_run = var("ARB_DRY_RUN").map_or(Ok(true), |value| parse_bool(&value))?;
        let private_key = var("ARB_PRIVATE_KEY");
        if !dry_run && private_key.is_none() {
            bail!("ARB_PRIVATE_KEY is required when ARB_DRY_RUN is off");
        }

        Ok(Self {
            network,
            order,
            venue_a,
            venue_b,
            reconnect,
            private_key,
            dry_run,
            slack_token: var("SLACK_OAUTH_TOKEN"),
        })
    }

    /// The trading account. Dry runs without a key get a throwaway one.
    ///
    /// # Errors
    /// * If `ARB_PRIVATE_KEY` is not a valid key
    pub fn signer(&self) -> Result<PrivateKeySigner> {
        match &self.private_key {
            Some(key) => PrivateKeySigner::from_str(key.trim())
                .map_err(|e| eyre!("invalid ARB_PRIVATE_KEY: {e}")),
            None => Ok(PrivateKeySigner::random()),
        }
    }
}

/// Parses the usual spellings of a boolean flag.
fn parse_bool(value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => bail!("invalid boolean '{other}'"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::arb::test_helpers::decimal;

    fn config(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config(&[]).unwrap();
        assert_eq!(config.network.key, "BscMainnet");
        assert_eq!(config.order, OrderConfig::default());
        assert_eq!(config.venue_a, DexApp::Uniswap);
        assert_eq!(config.venue_b, DexApp::Pancakeswap);
        assert_eq!(config.reconnect, ReconnectPolicy::disabled());
        assert!(config.dry_run);
        assert!(config.slack_token.is_none());
        assert!(config.signer().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config(&[
            ("ARB_CHAIN", "EthSepolia"),
            ("INFURA_API_KEY", "key"),
            ("ARB_SYMBOL", "WETH/USDC"),
            ("ARB_NOTIONAL", "250"),
            ("ARB_PROFIT_THRESHOLD", "1.5"),
            ("ARB_VENUE_A", "pancakeswap"),
            ("ARB_VENUE_B", "uniswap"),
            ("ARB_RECONNECT_ATTEMPTS", "3"),
            ("ARB_DRY_RUN", "no"),
            (
                "ARB_PRIVATE_KEY",
                "0x0123456789012345678901234567890123456789012345678901234567890123",
            ),
        ])
        .unwrap();
        assert_eq!(config.network.ws_url, "wss://sepolia.infura.io/ws/v3/key");
        assert_eq!(config.order.active_symbol, "WETH/USDC");
        assert_eq!(config.order.notional_amount, decimal("250"));
        assert_eq!(config.order.profit_threshold, decimal("1.5"));
        assert_eq!(config.venue_a, DexApp::Pancakeswap);
        assert_eq!(config.reconnect, ReconnectPolicy::exponential(3));
        assert!(!config.dry_run);
        assert!(config.signer().is_ok());
    }

    #[test]
    fn test_invalid_values() {
        assert!(config(&[("ARB_NOTIONAL", "lots")]).is_err());
        assert!(config(&[("ARB_NOTIONAL", "0")]).is_err());
        assert!(config(&[("ARB_CHAIN", "Solana")]).is_err());
        assert!(config(&[("ARB_VENUE_A", "pancakeswap")]).is_err());
        assert!(config(&[("ARB_RECONNECT_ATTEMPTS", "-1")]).is_err());
        assert!(config(&[("ARB_DRY_RUN", "maybe")]).is_err());
        assert!(config(&[("ARB_DRY_RUN", "false")]).is_err());
    }

    #[test]
    fn test_bad_private_key() {
        let config = config(&[("ARB_PRIVATE_KEY", "not-a-key")]).unwrap();
        assert!(config.signer().is_err());
    }
}
