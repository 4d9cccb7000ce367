#![allow(clippy::unwrap_used)]

use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use alloy::primitives::{Address, TxHash, B256, U256};
use async_trait::async_trait;
use bigdecimal::BigDecimal;
use eyre::{bail, eyre, Result};
use tokio::sync::{mpsc, Semaphore};

use super::opportunity::VenueFees;
use super::order_config::OrderConfig;
use super::types::PriceQuote;
use crate::dex::{PoolConfig, PriceStream, Venue};

#[allow(dead_code)]
pub fn decimal(value: &str) -> BigDecimal {
    BigDecimal::from_str(value).unwrap()
}

#[allow(dead_code)]
pub fn order_config(notional: &str, threshold: &str, fixed_cost: &str) -> OrderConfig {
    OrderConfig {
        notional_amount: decimal(notional),
        profit_threshold: decimal(threshold),
        slippage_buffer: decimal("0.001"),
        fixed_execution_cost: decimal(fixed_cost),
        active_symbol: "WBNB/USDT".to_string(),
    }
}

#[allow(dead_code)]
pub fn venue_fees(a: &str, b: &str) -> VenueFees {
    VenueFees {
        a: decimal(a),
        b: decimal(b),
    }
}

#[allow(dead_code)]
pub fn pool_config(base_decimals: u8, quote_decimals: u8) -> PoolConfig {
    PoolConfig {
        base_token: "WBNB".to_string(),
        quote_token: "USDT".to_string(),
        base_decimals,
        quote_decimals,
        pool_address: Address::repeat_byte(0x11),
        base_token_contract: None,
        quote_token_contract: None,
        fee_tier: 3000,
    }
}

#[allow(dead_code)]
pub fn quote(venue: &str, price: &str) -> PriceQuote {
    PriceQuote::new(venue, "WBNB/USDT", decimal(price), U256::from(20_000_000_000_u64))
}

/// A trade a [`MockVenue`] was asked to make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTrade {
    pub venue: String,
    pub side: &'static str,
    pub amount: BigDecimal,
    pub symbol: String,
}

/// A venue whose prices are pushed by the test and whose trades are recorded.
pub struct MockVenue {
    name: String,
    fee: BigDecimal,
    stream: PriceStream,
    trades: mpsc::UnboundedSender<MockTrade>,
    fail_buys: bool,
    buy_gate: Option<Arc<Semaphore>>,
    unsubscribed: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl MockVenue {
    /// The venue, the sender feeding its price stream and the trade log.
    pub fn new(
        name: &str,
        fee: &str,
    ) -> (
        Self,
        mpsc::Sender<PriceQuote>,
        mpsc::UnboundedReceiver<MockTrade>,
    ) {
        let (prices, stream) = PriceStream::channel();
        let (trades, trade_log) = mpsc::unbounded_channel();
        let venue = Self {
            name: name.to_string(),
            fee: decimal(fee),
            stream,
            trades,
            fail_buys: false,
            buy_gate: None,
            unsubscribed: Arc::new(AtomicUsize::new(0)),
        };
        (venue, prices, trade_log)
    }

    /// Makes every buy fail after being recorded.
    pub fn failing_buys(mut self) -> Self {
        self.fail_buys = true;
        self
    }

    /// Holds every buy, after recording it, until the gate gets a permit.
    pub fn gated_buys(mut self) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        self.buy_gate = Some(Arc::clone(&gate));
        (self, gate)
    }

    /// Counts `unsubscribe` calls.
    pub fn unsubscribe_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.unsubscribed)
    }

    fn record(&self, side: &'static str, amount: &BigDecimal, symbol: &str) {
        let _ = self.trades.send(MockTrade {
            venue: self.name.clone(),
            side,
            amount: amount.clone(),
            symbol: symbol.to_string(),
        });
    }
}

#[async_trait]
impl Venue for MockVenue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn price_stream(&self, _symbol: &str) -> Result<PriceStream> {
        Ok(self.stream.clone())
    }

    async fn unsubscribe(&self, _symbol: &str) -> bool {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
        true
    }

    fn fee_rate(&self) -> BigDecimal {
        self.fee.clone()
    }

    async fn buy(&self, amount: &BigDecimal, symbol: &str) -> Result<TxHash> {
        self.record("buy", amount, symbol);
        if let Some(gate) = &self.buy_gate {
            let _permit = gate
                .acquire()
                .await
                .map_err(|e| eyre!("{} buy gate closed: {e}", self.name))?;
        }
        if self.fail_buys {
            bail!("{} rejected the buy", self.name);
        }
        Ok(B256::repeat_byte(0xb0))
    }

    async fn sell(&self, amount: &BigDecimal, symbol: &str) -> Result<TxHash> {
        self.record("sell", amount, symbol);
        Ok(B256::repeat_byte(0x5e))
    }
}
