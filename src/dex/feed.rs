use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use alloy::primitives::U256;
use async_trait::async_trait;
use eyre::{eyre, Result};
use futures::stream::BoxStream;
use futures::StreamExt;
use log::{error, info, warn};
use tokio::sync::{mpsc, oneshot, Mutex};

use super::pool_configs::PoolConfig;
use crate::arb::price::normalize_price;
use crate::arb::types::PriceQuote;

/// Capacity of a price stream. The worker reserves the slot before reading the
/// next swap, so at most one quote is ever waiting for the consumer.
const PRICE_STREAM_CAPACITY: usize = 1;

/// The fields of a pool `Swap` event the engine needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawSwap {
    /// Pool price after the swap, as `sqrt(token1/token0) * 2^96`
    pub sqrt_price_x96: U256,
    /// In-range liquidity after the swap
    pub liquidity: u128,
}

/// Stream of raw swaps for one pool. An `Err` item is a transport failure.
pub type SwapStream = BoxStream<'static, Result<RawSwap>>;

/// Where raw swap events come from, e.g. a websocket log subscription.
#[async_trait]
pub trait SwapSource: Send + Sync {
    /// Opens a new event stream for `pool`.
    ///
    /// # Errors
    /// * If the subscription cannot be established
    async fn watch_swaps(&self, pool: &PoolConfig) -> Result<SwapStream>;
}

/// How a feed worker reacts to its upstream ending or failing.
///
/// The default never reconnects: the stream closes on the first failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Reconnect attempts allowed in a row before giving up
    pub max_attempts: u32,
    /// Delay before the first attempt
    pub initial_backoff: Duration,
    /// Upper bound on the delay between attempts
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

impl ReconnectPolicy {
    /// Never reconnect.
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            max_attempts: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Reconnect up to `max_attempts` times, doubling the delay from one second
    /// up to one minute.
    #[must_use]
    pub const fn exponential(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
        }
    }

    /// Delay before reconnect attempt number `attempt` (zero based).
    #[must_use]
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Receiving end of a venue's price quotes for one symbol.
///
/// Clones share the same underlying channel; [`PriceStream::same_stream`] tells
/// whether two handles are the same subscription. Once `recv` returns `None`
/// the stream is closed for good. Dropping the last handle ends the
/// subscription.
#[derive(Debug, Clone)]
pub struct PriceStream {
    /// Shared receiver
    inner: Arc<Mutex<mpsc::Receiver<PriceQuote>>>,
}

impl PriceStream {
    /// Creates a single-slot stream and the sender that feeds it.
    #[must_use]
    pub fn channel() -> (mpsc::Sender<PriceQuote>, Self) {
        let (tx, rx) = mpsc::channel(PRICE_STREAM_CAPACITY);
        (
            tx,
            Self {
                inner: Arc::new(Mutex::new(rx)),
            },
        )
    }

    /// Waits for the next quote. `None` means the stream has closed.
    pub async fn recv(&self) -> Option<PriceQuote> {
        self.inner.lock().await.recv().await
    }

    /// Whether both handles refer to the same subscription.
    #[must_use]
    pub fn same_stream(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the stream alive.
    fn downgrade(&self) -> Weak<Mutex<mpsc::Receiver<PriceQuote>>> {
        Arc::downgrade(&self.inner)
    }

    /// The stream behind `weak`, if a consumer still holds it.
    fn upgrade(weak: &Weak<Mutex<mpsc::Receiver<PriceQuote>>>) -> Option<Self> {
        weak.upgrade().map(|inner| Self { inner })
    }
}

/// A live entry in the subscription registry.
struct Subscription {
    /// Registry-unique id, used by the worker to remove only its own entry
    id: u64,
    /// Handed out to later subscribers while a consumer holds the stream
    stream: Weak<Mutex<mpsc::Receiver<PriceQuote>>>,
    /// Stops the worker
    cancel: oneshot::Sender<()>,
}

/// Symbol → live subscription.
type Registry = Arc<Mutex<HashMap<String, Subscription>>>;

/// Subscription manager for one venue.
pub struct PriceFeed {
    /// Venue name attached to every quote
    venue: String,
    /// Pools this venue knows, by symbol
    pools: HashMap<String, PoolConfig>,
    /// Raw event provider
    source: Arc<dyn SwapSource>,
    /// What to do when the upstream drops
    reconnect: ReconnectPolicy,
    /// Active subscriptions
    registry: Registry,
    /// Source of subscription ids
    next_id: AtomicU64,
}

impl PriceFeed {
    /// Creates a feed for `venue` over the given pools.
    #[must_use]
    pub fn new(
        venue: &str,
        pools: HashMap<String, PoolConfig>,
        source: Arc<dyn SwapSource>,
    ) -> Self {
        Self {
            venue: venue.to_string(),
            pools,
            source,
            reconnect: ReconnectPolicy::disabled(),
            registry: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(0),
        }
    }

    /// Sets the reconnect policy used by workers started afterwards.
    #[must_use]
    pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
        self.reconnect = reconnect;
        self
    }

    /// Name of the venue this feed serves.
    #[must_use]
    pub fn venue(&self) -> &str {
        &self.venue
    }

    /// Pool configuration for `symbol`.
    ///
    /// # Errors
    /// * If the venue has no pool for `symbol`
    pub fn pool(&self, symbol: &str) -> Result<&PoolConfig> {
        self.pools
            .get(symbol)
            .ok_or_else(|| eyre!("no {} pool configured for {symbol}", self.venue))
    }

    /// Returns the price stream for `symbol`, opening it if needed.
    ///
    /// Repeated calls while the subscription is alive return the same stream.
    /// The registry lock is not held while the upstream is being opened.
    ///
    /// # Errors
    /// * If the venue has no pool for `symbol`
    /// * If the upstream subscription cannot be opened
    pub async fn subscribe(&self, symbol: &str) -> Result<PriceStream> {
        if let Some(stream) = self.live_stream(symbol).await {
            return Ok(stream);
        }

        let pool = self.pool(symbol)?.clone();
        let upstream = self.source.watch_swaps(&pool).await?;

        let mut registry = self.registry.lock().await;
        if let Some(stream) = registry
            .get(symbol)
            .and_then(|subscription| PriceStream::upgrade(&subscription.stream))
        {
            // Lost a race with another subscriber; the spare upstream is dropped
            return Ok(stream);
        }
        if let Some(stale) = registry.remove(symbol) {
            let _ = stale.cancel.send(());
        }

        let (tx, stream) = PriceStream::channel();
        let (cancel, cancelled) = oneshot::channel();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        registry.insert(
            symbol.to_string(),
            Subscription {
                id,
                stream: stream.downgrade(),
                cancel,
            },
        );
        drop(registry);
        info!(
            "feed::subscribe: {} subscribed to {symbol} at {}",
            self.venue, pool.pool_address
        );

        let worker = Worker {
            id,
            venue: self.venue.clone(),
            symbol: symbol.to_string(),
            pool,
            source: Arc::clone(&self.source),
            reconnect: self.reconnect.clone(),
            registry: Arc::clone(&self.registry),
            tx,
            cancelled,
        };
        tokio::spawn(worker.run(upstream));

        Ok(stream)
    }

    /// The registered stream for `symbol`, if a consumer still holds it.
    async fn live_stream(&self, symbol: &str) -> Option<PriceStream> {
        let registry = self.registry.lock().await;
        PriceStream::upgrade(&registry.get(symbol)?.stream)
    }

    /// Stops the subscription for `symbol`.
    ///
    /// # Returns
    /// * `true` if there was a live subscription
    pub async fn unsubscribe(&self, symbol: &str) -> bool {
        let Some(subscription) = self.registry.lock().await.remove(symbol) else {
            return false;
        };
        info!("feed::unsubscribe: {} unsubscribed from {symbol}", self.venue);
        // The worker may already be tearing down on its own
        let _ = subscription.cancel.send(());
        true
    }

    /// Whether `symbol` has a live subscription.
    pub async fn is_subscribed(&self, symbol: &str) -> bool {
        self.registry.lock().await.contains_key(symbol)
    }
}

/// Background task pumping one subscription.
struct Worker {
    /// Id of the registry entry this worker owns
    id: u64,
    /// Venue name for quotes and logs
    venue: String,
    /// Subscribed symbol
    symbol: String,
    /// Pool being watched
    pool: PoolConfig,
    /// Used to reopen the upstream
    source: Arc<dyn SwapSource>,
    /// Reconnect rules
    reconnect: ReconnectPolicy,
    /// Registry to clean up on exit
    registry: Registry,
    /// Output side of the price stream
    tx: mpsc::Sender<PriceQuote>,
    /// Fires on unsubscribe
    cancelled: oneshot::Receiver<()>,
}

impl Worker {
    /// Forwards quotes until the upstream is gone, the consumer drops the
    /// stream or the subscription is cancelled.
    async fn run(mut self, mut upstream: SwapStream) {
        let mut attempts = 0;

        loop {
            // Only read the next swap once the previous quote has been taken
            let permit = tokio::select! {
                _ = &mut self.cancelled => break,
                permit = self.tx.reserve() => permit,
            };
            let Some(permit) = permit.ok() else {
                info!(
                    "feed::worker: {} {} consumer dropped the stream",
                    self.venue, self.symbol
                );
                break;
            };

            let event = tokio::select! {
                _ = &mut self.cancelled => break,
                () = self.tx.closed() => {
                    info!(
                        "feed::worker: {} {} consumer dropped the stream",
                        self.venue, self.symbol
                    );
                    break;
                }
                event = upstream.next() => event,
            };

            match event {
                Some(Ok(raw)) => {
                    attempts = 0;
                    match self.quote(raw) {
                        Ok(quote) => permit.send(quote),
                        Err(e) => warn!(
                            "feed::worker: {} {} dropped swap event: {e}",
                            self.venue, self.symbol
                        ),
                    }
                }
                Some(Err(e)) => {
                    drop(permit);
                    error!(
                        "feed::worker: {} {} subscription error: {e}",
                        self.venue, self.symbol
                    );
                    match self.reopen(&mut attempts).await {
                        Some(next) => upstream = next,
                        None => break,
                    }
                }
                None => {
                    drop(permit);
                    warn!(
                        "feed::worker: {} {} upstream ended",
                        self.venue, self.symbol
                    );
                    match self.reopen(&mut attempts).await {
                        Some(next) => upstream = next,
                        None => break,
                    }
                }
            }
        }

        self.teardown().await;
    }

    /// Normalizes a raw swap into a quote.
    fn quote(&self, raw: RawSwap) -> Result<PriceQuote> {
        let price = normalize_price(
            raw.sqrt_price_x96,
            self.pool.base_decimals,
            self.pool.quote_decimals,
        )?;
        Ok(PriceQuote::new(
            &self.venue,
            &self.symbol,
            price,
            U256::from(raw.liquidity),
        ))
    }

    /// Tries to open a fresh upstream within the reconnect budget.
    async fn reopen(&mut self, attempts: &mut u32) -> Option<SwapStream> {
        while *attempts < self.reconnect.max_attempts {
            let delay = self.reconnect.backoff(*attempts);
            *attempts += 1;
            warn!(
                "feed::worker: {} {} reconnecting in {delay:?} (attempt {}/{})",
                self.venue, self.symbol, attempts, self.reconnect.max_attempts
            );

            tokio::select! {
                _ = &mut self.cancelled => return None,
                () = tokio::time::sleep(delay) => {}
            }

            match self.source.watch_swaps(&self.pool).await {
                Ok(upstream) => {
                    info!("feed::worker: {} {} reconnected", self.venue, self.symbol);
                    return Some(upstream);
                }
                Err(e) => error!(
                    "feed::worker: {} {} reconnect failed: {e}",
                    self.venue, self.symbol
                ),
            }
        }
        None
    }

    /// Removes this worker's registry entry, then closes the stream.
    async fn teardown(self) {
        {
            let mut registry = self.registry.lock().await;
            if registry
                .get(&self.symbol)
                .is_some_and(|subscription| subscription.id == self.id)
            {
                registry.remove(&self.symbol);
            }
        }
        info!(
            "feed::worker: {} {} unsubscribed from {}",
            self.venue, self.symbol, self.pool.pool_address
        );
        drop(self.tx);
    }
}
