use std::sync::Arc;

use alloy::primitives::{Address, TxHash};
use alloy::providers::Provider;
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use eyre::{Result, WrapErr};
use log::info;

use super::chain::{ChainSwapSource, PoolPositions, SwapExecutor, TradeSide};
use super::feed::{PriceFeed, PriceStream, ReconnectPolicy, SwapSource};
use super::pool_configs::markets;
use super::{DexApp, Venue};
use crate::utils::chains::Network;
use crate::utils::constants::swap_router;

/// A V3 venue: prices from pool swap events, trades through the router.
pub struct PoolVenue<P> {
    /// Exchange, decides the fee rate
    dex: DexApp,
    /// Price subscriptions
    feed: PriceFeed,
    /// Router access
    executor: SwapExecutor<P>,
}

impl<P> PoolVenue<P>
where
    P: Provider + Clone + 'static,
{
    /// Assembles a venue from its parts.
    pub const fn new(dex: DexApp, feed: PriceFeed, executor: SwapExecutor<P>) -> Self {
        Self {
            dex,
            feed,
            executor,
        }
    }

    /// Builds `dex`'s venue on `network` from a signing provider.
    ///
    /// Swap output goes to `recipient`. With `dry_run` swaps are only logged.
    pub fn on_chain(
        dex: DexApp,
        network: &Network,
        provider: P,
        recipient: Address,
        dry_run: bool,
        reconnect: ReconnectPolicy,
    ) -> Self {
        let source: Arc<dyn SwapSource> = Arc::new(ChainSwapSource::new(provider.clone(), dex));
        let feed =
            PriceFeed::new(&dex.to_string(), markets(dex, network), source).with_reconnect(reconnect);
        let executor = SwapExecutor::new(
            provider,
            dex,
            swap_router(dex, network.chain),
            recipient,
            dry_run,
        );
        Self::new(dex, feed, executor)
    }

    /// Token balances and router allowances for `symbol`'s pool.
    ///
    /// # Errors
    /// * If the venue has no pool for `symbol` or a token call fails
    pub async fn positions(&self, symbol: &str) -> Result<PoolPositions> {
        self.executor.positions(self.feed.pool(symbol)?).await
    }

    /// Checks before a live session that both legs of a round trip of
    /// `amount` are funded and approved.
    ///
    /// # Errors
    /// * If the positions cannot be read or either leg would revert
    pub async fn preflight(&self, symbol: &str, amount: &BigDecimal) -> Result<()> {
        let positions = self.positions(symbol).await?;
        info!(
            "pool_venue::preflight: {} {symbol}: {} {} (router may spend {}), {} {} (router may spend {})",
            self.dex,
            positions.base.balance,
            positions.base.token,
            positions.base.allowance,
            positions.quote.balance,
            positions.quote.token,
            positions.quote.allowance
        );
        positions
            .check_round_trip(amount)
            .wrap_err_with(|| format!("{} cannot trade {amount} {symbol}", self.dex))
    }
}

#[async_trait]
impl<P> Venue for PoolVenue<P>
where
    P: Provider + Clone + 'static,
{
    fn name(&self) -> &str {
        self.feed.venue()
    }

    async fn price_stream(&self, symbol: &str) -> Result<PriceStream> {
        self.feed.subscribe(symbol).await
    }

    async fn unsubscribe(&self, symbol: &str) -> bool {
        self.feed.unsubscribe(symbol).await
    }

    fn fee_rate(&self) -> BigDecimal {
        self.dex.default_fee_rate()
    }

    async fn buy(&self, amount: &BigDecimal, symbol: &str) -> Result<TxHash> {
        let pool = self.feed.pool(symbol)?;
        self.executor.execute(pool, TradeSide::Buy, amount).await
    }

    async fn sell(&self, amount: &BigDecimal, symbol: &str) -> Result<TxHash> {
        let pool = self.feed.pool(symbol)?;
        self.executor.execute(pool, TradeSide::Sell, amount).await
    }
}
