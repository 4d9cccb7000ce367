use std::fmt;
use std::sync::Arc;

use bigdecimal::BigDecimal;
use eyre::{Result, WrapErr};
use log::{debug, error, info, warn};
use tokio::sync::watch;
use tokio::task::JoinSet;

use super::opportunity::{evaluate, VenueFees};
use super::order_config::SharedOrderConfig;
use super::types::{Decision, PriceQuote, VenueSide};
use crate::dex::Venue;
use crate::notify::SlackNotifier;

/// Where an engine session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// At least one venue has not quoted yet
    AwaitingBothPrices,
    /// Both prices known; every new quote is evaluated
    Evaluating,
    /// A stream closed or shutdown was requested; the session is over
    Stopped,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingBothPrices => write!(f, "awaiting both prices"),
            Self::Evaluating => write!(f, "evaluating"),
            Self::Stopped => write!(f, "stopped"),
        }
    }
}

/// What the engine knows; returned when a session ends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineState {
    /// Lifecycle phase
    pub phase: Phase,
    /// Last price seen on venue A
    pub price_a: Option<BigDecimal>,
    /// Last price seen on venue B
    pub price_b: Option<BigDecimal>,
    /// Number of evaluations run
    pub evaluations: u64,
    /// Number of round trips dispatched
    pub trades_dispatched: u64,
    /// Outcome of the latest evaluation
    pub last_decision: Option<Decision>,
}

impl Default for EngineState {
    fn default() -> Self {
        Self {
            phase: Phase::AwaitingBothPrices,
            price_a: None,
            price_b: None,
            evaluations: 0,
            trades_dispatched: 0,
            last_decision: None,
        }
    }
}

impl EngineState {
    /// Stores `price` as the latest for `side`; the older one is dropped.
    pub fn record(&mut self, side: VenueSide, price: BigDecimal) {
        match side {
            VenueSide::A => self.price_a = Some(price),
            VenueSide::B => self.price_b = Some(price),
        }
        if self.phase == Phase::AwaitingBothPrices
            && self.price_a.is_some()
            && self.price_b.is_some()
        {
            self.phase = Phase::Evaluating;
        }
    }

    /// Both latest prices, once each venue has quoted.
    #[must_use]
    pub fn prices(&self) -> Option<(&BigDecimal, &BigDecimal)> {
        Some((self.price_a.as_ref()?, self.price_b.as_ref()?))
    }
}

/// Arbitrage engine over a pair of venues.
///
/// Listens to both venues' price streams for one symbol, keeps the last price
/// of each and re-runs the two-stage test on every new quote. Round trips run
/// on their own tasks so a slow router never delays the next evaluation.
pub struct ArbEngine {
    /// First venue; wins price ties
    venue_a: Arc<dyn Venue>,
    /// Second venue
    venue_b: Arc<dyn Venue>,
    /// Live trading parameters
    config: SharedOrderConfig,
    /// Operator channel for trade outcomes
    notifier: Option<SlackNotifier>,
    /// Set once to end the session
    shutdown: watch::Sender<bool>,
}

impl ArbEngine {
    /// Creates an engine; nothing runs until [`ArbEngine::run`].
    #[must_use]
    pub fn new(venue_a: Arc<dyn Venue>, venue_b: Arc<dyn Venue>, config: SharedOrderConfig) -> Self {
        Self {
            venue_a,
            venue_b,
            config,
            notifier: None,
            shutdown: watch::Sender::new(false),
        }
    }

    /// Reports trade outcomes to Slack.
    #[must_use]
    pub fn with_notifier(mut self, notifier: SlackNotifier) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Handle to the live configuration; updates apply from the next quote.
    #[must_use]
    pub const fn config(&self) -> &SharedOrderConfig {
        &self.config
    }

    /// Asks the running session to stop taking quotes.
    ///
    /// Trades already dispatched still complete before [`ArbEngine::run`]
    /// returns. Later sessions on this engine stop immediately.
    pub fn shutdown(&self) {
        info!("engine::shutdown: stop requested");
        self.shutdown.send_replace(true);
    }

    /// The venue on `side`.
    fn venue(&self, side: VenueSide) -> &Arc<dyn Venue> {
        match side {
            VenueSide::A => &self.venue_a,
            VenueSide::B => &self.venue_b,
        }
    }

    /// Reconciles both venues' prices for `symbol` until either stream closes
    /// or [`ArbEngine::shutdown`] is called.
    ///
    /// Both venues are unsubscribed when the loop stops. Trades still in
    /// flight are awaited before returning.
    ///
    /// # Returns
    /// * The final state; a session that never saw both prices returns with
    ///   zero evaluations
    ///
    /// # Errors
    /// * If either venue cannot open a price stream for `symbol`
    pub async fn run(&self, symbol: &str) -> Result<EngineState> {
        let stream_a = self
            .venue_a
            .price_stream(symbol)
            .await
            .wrap_err_with(|| format!("{} price stream", self.venue_a.name()))?;
        let stream_b = self
            .venue_b
            .price_stream(symbol)
            .await
            .wrap_err_with(|| format!("{} price stream", self.venue_b.name()))?;
        info!(
            "engine::run: reconciling {symbol} between {} and {}",
            self.venue_a.name(),
            self.venue_b.name()
        );

        let mut state = EngineState::default();
        let mut trades = JoinSet::new();
        let stop = stop_requested(self.shutdown.subscribe());
        tokio::pin!(stop);

        loop {
            let (side, quote) = tokio::select! {
                quote = stream_a.recv() => (VenueSide::A, quote),
                quote = stream_b.recv() => (VenueSide::B, quote),
                () = &mut stop => {
                    info!("engine::run: {symbol} shutting down");
                    break;
                }
            };
            let Some(quote) = quote else {
                warn!(
                    "engine::run: {} stream for {symbol} closed",
                    self.venue(side).name()
                );
                break;
            };

            while let Some(finished) = trades.try_join_next() {
                log_trade_panic(finished);
            }
            self.reconcile(&mut state, side, quote, symbol, &mut trades);
        }

        state.phase = Phase::Stopped;
        drop((stream_a, stream_b));
        for venue in [&self.venue_a, &self.venue_b] {
            if venue.unsubscribe(symbol).await {
                debug!("engine::run: unsubscribed {} from {symbol}", venue.name());
            }
        }
        if !trades.is_empty() {
            info!("engine::run: waiting for {} trades in flight", trades.len());
        }
        while let Some(finished) = trades.join_next().await {
            log_trade_panic(finished);
        }
        info!(
            "engine::run: {symbol} stopped after {} evaluations and {} trades",
            state.evaluations, state.trades_dispatched
        );
        Ok(state)
    }

    /// Folds one quote into `state` and acts on the resulting decision.
    fn reconcile(
        &self,
        state: &mut EngineState,
        side: VenueSide,
        quote: PriceQuote,
        symbol: &str,
        trades: &mut JoinSet<()>,
    ) {
        debug!("engine::reconcile: {quote}");
        state.record(side, quote.price);
        let Some((price_a, price_b)) = state.prices() else {
            return;
        };

        let config = self.config.current_config();
        let fees = VenueFees {
            a: self.venue_a.fee_rate(),
            b: self.venue_b.fee_rate(),
        };
        let evaluation = evaluate(price_a, price_b, &fees, &config);

        if let Some(report) = &evaluation.report {
            match serde_json::to_string(report) {
                Ok(json) => info!("engine::reconcile: {symbol} profit simulation {json}"),
                Err(e) => warn!("engine::reconcile: failed to serialize profit report: {e}"),
            }
        }

        state.evaluations += 1;
        state.last_decision = Some(evaluation.decision);

        if let Decision::Arbitrage { buy_on, sell_on } = evaluation.decision {
            state.trades_dispatched += 1;
            self.dispatch(trades, buy_on, sell_on, config.notional_amount, symbol);
        }
    }

    /// Spawns the round trip; the loop does not wait for it.
    fn dispatch(
        &self,
        trades: &mut JoinSet<()>,
        buy_on: VenueSide,
        sell_on: VenueSide,
        amount: BigDecimal,
        symbol: &str,
    ) {
        let buyer = Arc::clone(self.venue(buy_on));
        let seller = Arc::clone(self.venue(sell_on));
        let notifier = self.notifier.clone();
        let symbol = symbol.to_string();
        info!(
            "engine::dispatch: buy {amount} {symbol} on {}, sell on {}",
            buyer.name(),
            seller.name()
        );

        trades.spawn(async move {
            match round_trip(buyer.as_ref(), seller.as_ref(), &amount, &symbol).await {
                Ok(summary) => {
                    info!("engine::dispatch: {summary}");
                    if let Some(notifier) = notifier {
                        if let Err(e) = notifier.send(&summary).await {
                            warn!("engine::dispatch: failed to notify: {e}");
                        }
                    }
                }
                Err(e) => {
                    error!("engine::dispatch: {symbol} round trip failed: {e:#}");
                    if let Some(notifier) = notifier {
                        let message = format!("{symbol} round trip failed: {e:#}");
                        if let Err(e) = notifier.send_error(&message).await {
                            warn!("engine::dispatch: failed to notify: {e}");
                        }
                    }
                }
            }
        });
    }
}

/// Buys on `buyer`, then sells on `seller`. A failed buy skips the sell.
async fn round_trip(
    buyer: &dyn Venue,
    seller: &dyn Venue,
    amount: &BigDecimal,
    symbol: &str,
) -> Result<String> {
    let buy = buyer
        .buy(amount, symbol)
        .await
        .wrap_err_with(|| format!("buy on {}", buyer.name()))?;
    let sell = seller
        .sell(amount, symbol)
        .await
        .wrap_err_with(|| format!("sell on {} after buy {buy}", seller.name()))?;
    Ok(format!(
        "{symbol}: bought {amount} on {} ({buy}), sold on {} ({sell})",
        buyer.name(),
        seller.name()
    ))
}

/// Resolves once shutdown has been requested.
async fn stop_requested(mut shutdown: watch::Receiver<bool>) {
    // The sender lives in the engine, so an error only means it is gone
    let _ = shutdown.wait_for(|stop| *stop).await;
}

/// Trade tasks never return errors; only a panic surfaces here.
fn log_trade_panic(finished: Result<(), tokio::task::JoinError>) {
    if let Err(e) = finished {
        error!("engine::run: trade task aborted: {e}");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use tokio::sync::mpsc;
    use tokio::time::timeout;

    use super::*;
    use crate::arb::test_helpers::{decimal, order_config, quote, MockTrade, MockVenue};

    const SYMBOL: &str = "WBNB/USDT";

    fn engine(a: MockVenue, b: MockVenue, threshold: &str) -> ArbEngine {
        let config = SharedOrderConfig::new(order_config("100", threshold, "0.0001")).unwrap();
        ArbEngine::new(Arc::new(a), Arc::new(b), config)
    }

    async fn next_trade(log: &mut mpsc::UnboundedReceiver<MockTrade>) -> MockTrade {
        timeout(Duration::from_secs(5), log.recv())
            .await
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_state_waits_for_both_prices() {
        let mut state = EngineState::default();
        state.record(VenueSide::A, decimal("1"));
        assert_eq!(state.phase, Phase::AwaitingBothPrices);
        assert!(state.prices().is_none());

        state.record(VenueSide::B, decimal("2"));
        state.record(VenueSide::A, decimal("3"));
        assert_eq!(state.phase, Phase::Evaluating);
        assert_eq!(state.prices(), Some((&decimal("3"), &decimal("2"))));
    }

    #[tokio::test]
    async fn test_profitable_spread_buys_low_and_sells_high() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, prices_b, mut trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = engine(a, b, "4.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();

        let buy = next_trade(&mut trades_a).await;
        assert_eq!(buy.side, "buy");
        assert_eq!(buy.amount, decimal("100"));
        assert_eq!(buy.symbol, SYMBOL);
        let sell = next_trade(&mut trades_b).await;
        assert_eq!(sell.side, "sell");
        assert_eq!(sell.amount, decimal("100"));

        drop(prices_a);
        drop(prices_b);
        let state = session.await.unwrap().unwrap();
        assert_eq!(state.phase, Phase::Stopped);
        assert_eq!(state.evaluations, 1);
        assert_eq!(state.trades_dispatched, 1);
        assert_eq!(state.last_decision, Some(Decision::buy_on(VenueSide::A)));
    }

    #[tokio::test]
    async fn test_cheaper_venue_b_is_bought() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, prices_b, mut trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = engine(a, b, "4.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "105")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "100")).await.unwrap();

        assert_eq!(next_trade(&mut trades_b).await.side, "buy");
        assert_eq!(next_trade(&mut trades_a).await.side, "sell");

        drop(prices_a);
        drop(prices_b);
        let state = session.await.unwrap().unwrap();
        assert_eq!(state.last_decision, Some(Decision::buy_on(VenueSide::B)));
    }

    #[tokio::test]
    async fn test_unprofitable_spread_holds() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, prices_b, mut trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = engine(a, b, "5.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        // A second quote per venue is only accepted once the first was taken
        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        drop(prices_a);
        drop(prices_b);

        let state = session.await.unwrap().unwrap();
        assert!(state.evaluations >= 1);
        assert_eq!(state.trades_dispatched, 0);
        assert_eq!(state.last_decision, Some(Decision::Hold));
        assert!(trades_a.try_recv().is_err());
        assert!(trades_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_early_close_never_evaluates() {
        let (a, prices_a, _trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, prices_b, _trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = engine(a, b, "4.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        drop(prices_a);

        let state = session.await.unwrap().unwrap();
        assert_eq!(state.phase, Phase::Stopped);
        assert_eq!(state.evaluations, 0);
        assert_eq!(state.price_b, None);
        assert_eq!(state.last_decision, None);
        drop(prices_b);
    }

    #[tokio::test]
    async fn test_failed_buy_skips_sell_and_keeps_running() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, prices_b, mut trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = engine(a.failing_buys(), b, "4.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        assert_eq!(next_trade(&mut trades_a).await.side, "buy");

        // The loop is still alive and re-evaluates
        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        assert_eq!(next_trade(&mut trades_a).await.side, "buy");

        drop(prices_a);
        drop(prices_b);
        let state = session.await.unwrap().unwrap();
        assert_eq!(state.trades_dispatched, 2);
        assert!(trades_b.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_pending_trade_does_not_stall_evaluation() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (a, gate) = a.gated_buys();
        let (b, prices_b, mut trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = engine(a, b, "4.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        assert_eq!(next_trade(&mut trades_a).await.side, "buy");

        // First buy is still held, the next quote is evaluated anyway
        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        assert_eq!(next_trade(&mut trades_a).await.side, "buy");
        assert!(trades_b.try_recv().is_err());

        gate.add_permits(1);
        assert_eq!(next_trade(&mut trades_b).await.side, "sell");
        assert_eq!(next_trade(&mut trades_b).await.side, "sell");

        drop(prices_a);
        drop(prices_b);
        let state = session.await.unwrap().unwrap();
        assert_eq!(state.evaluations, 2);
        assert_eq!(state.trades_dispatched, 2);
    }

    #[tokio::test]
    async fn test_shutdown_lets_pending_round_trip_finish() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (a, gate) = a.gated_buys();
        let (b, prices_b, mut trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = Arc::new(engine(a, b, "4.0"));
        let mut session = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run(SYMBOL).await })
        };

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        assert_eq!(next_trade(&mut trades_a).await.side, "buy");

        engine.shutdown();
        assert!(timeout(Duration::from_millis(50), &mut session)
            .await
            .is_err());
        assert!(trades_b.try_recv().is_err());

        gate.add_permits(1);
        let state = session.await.unwrap().unwrap();
        assert_eq!(state.phase, Phase::Stopped);
        assert_eq!(state.trades_dispatched, 1);
        assert_eq!(trades_b.try_recv().unwrap().side, "sell");
        drop((prices_a, prices_b));
    }

    #[tokio::test]
    async fn test_stop_unsubscribes_both_venues() {
        let (a, prices_a, _trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, _prices_b, _trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let (unsubscribed_a, unsubscribed_b) = (a.unsubscribe_count(), b.unsubscribe_count());
        let engine = engine(a, b, "4.0");
        let session = tokio::spawn(async move { engine.run(SYMBOL).await });

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        drop(prices_a);

        session.await.unwrap().unwrap();
        assert_eq!(unsubscribed_a.load(Ordering::SeqCst), 1);
        assert_eq!(unsubscribed_b.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_config_updates_apply_to_the_next_quote() {
        let (a, prices_a, mut trades_a) = MockVenue::new("Uniswap", "0.003");
        let (b, prices_b, _trades_b) = MockVenue::new("Pancakeswap", "0.0025");
        let engine = Arc::new(engine(a, b, "5.0"));
        let session = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.run(SYMBOL).await })
        };

        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        prices_b.send(quote("Pancakeswap", "105")).await.unwrap();
        assert!(trades_a.try_recv().is_err());

        assert!(engine
            .config()
            .set_config(order_config("100", "4.0", "0.0001")));
        prices_a.send(quote("Uniswap", "100")).await.unwrap();
        assert_eq!(next_trade(&mut trades_a).await.side, "buy");

        drop(prices_a);
        drop(prices_b);
        assert!(session.await.unwrap().unwrap().trades_dispatched >= 1);
    }
}
