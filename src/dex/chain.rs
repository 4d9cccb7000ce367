use std::str::FromStr;

use alloy::primitives::aliases::{U160, U24};
use alloy::primitives::{keccak256, Address, TxHash, U256};
use alloy::providers::Provider;
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use bigdecimal::{BigDecimal, RoundingMode, Zero};
use derive_more::Display;
use eyre::{bail, eyre, Result, WrapErr};
use futures::{future, StreamExt};
use log::{info, warn};

use super::feed::{RawSwap, SwapSource, SwapStream};
use super::pool_configs::PoolConfig;
use super::wallet::TokenPosition;
use super::DexApp;
use crate::arb::price::pow10;

sol! {
    /// Uniswap V3 pool events
    interface IUniswapV3Pool {
        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick
        );
    }
}

sol! {
    /// PancakeSwap V3 pool events; `Swap` also reports protocol fees
    interface IPancakeV3Pool {
        event Swap(
            address indexed sender,
            address indexed recipient,
            int256 amount0,
            int256 amount1,
            uint160 sqrtPriceX96,
            uint128 liquidity,
            int24 tick,
            uint128 protocolFeesToken0,
            uint128 protocolFeesToken1
        );
    }
}

sol! {
    /// Router interface shared by Uniswap SwapRouter02 and the PancakeSwap SmartRouter
    #[sol(rpc)]
    #[derive(Debug)]
    interface IV3SwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params)
            external
            payable
            returns (uint256 amountOut);
    }
}

pub use IV3SwapRouter::ExactInputSingleParams;

/// Decodes a pool `Swap` log of `dex`'s flavour.
///
/// # Errors
/// * If the log is not a `Swap` event of that pool type
pub fn decode_swap(dex: DexApp, log: &Log) -> Result<RawSwap> {
    let raw = match dex {
        DexApp::Uniswap => {
            let event = IUniswapV3Pool::Swap::decode_log(&log.inner, true)?;
            RawSwap {
                sqrt_price_x96: U256::from(event.sqrtPriceX96),
                liquidity: event.liquidity,
            }
        }
        DexApp::Pancakeswap => {
            let event = IPancakeV3Pool::Swap::decode_log(&log.inner, true)?;
            RawSwap {
                sqrt_price_x96: U256::from(event.sqrtPriceX96),
                liquidity: event.liquidity,
            }
        }
    };
    Ok(raw)
}

/// Swap events from a node's log subscription.
pub struct ChainSwapSource<P> {
    /// Websocket provider
    provider: P,
    /// Selects the event layout
    dex: DexApp,
}

impl<P> ChainSwapSource<P> {
    /// Creates a source decoding `dex` pool events.
    pub const fn new(provider: P, dex: DexApp) -> Self {
        Self { provider, dex }
    }
}

#[async_trait]
impl<P> SwapSource for ChainSwapSource<P>
where
    P: Provider + 'static,
{
    async fn watch_swaps(&self, pool: &PoolConfig) -> Result<SwapStream> {
        let signature = match self.dex {
            DexApp::Uniswap => IUniswapV3Pool::Swap::SIGNATURE_HASH,
            DexApp::Pancakeswap => IPancakeV3Pool::Swap::SIGNATURE_HASH,
        };
        let filter = Filter::new()
            .address(pool.pool_address)
            .event_signature(signature);

        let subscription = self
            .provider
            .subscribe_logs(&filter)
            .await
            .wrap_err_with(|| format!("failed to subscribe to {} swaps", pool.pool_address))?;
        info!(
            "chain::watch_swaps: {} subscribed to swaps of {}",
            self.dex, pool.pool_address
        );

        let dex = self.dex;
        let stream = subscription.into_stream().filter_map(move |log| {
            future::ready(match decode_swap(dex, &log) {
                Ok(raw) => Some(Ok(raw)),
                Err(e) => {
                    warn!("chain::watch_swaps: failed to decode {dex} swap: {e}");
                    None
                }
            })
        });
        Ok(stream.boxed())
    }
}

/// Direction of a swap relative to the pool's symbol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum TradeSide {
    /// Quote token in, base token out
    #[display("buy")]
    Buy,
    /// Base token in, quote token out
    #[display("sell")]
    Sell,
}

/// Converts a human-scale amount into raw token units, truncating dust.
///
/// # Errors
/// * If `amount` is not positive or rounds down to zero units
/// * If the result does not fit 256 bits
pub fn to_units(amount: &BigDecimal, decimals: u8) -> Result<U256> {
    if amount <= &BigDecimal::zero() {
        bail!("swap amount must be positive, got {amount}");
    }
    let scaled = (amount * pow10(i64::from(decimals))?).with_scale_round(0, RoundingMode::Down);
    let (digits, _) = scaled.into_bigint_and_exponent();
    let units = U256::from_str(&digits.to_string())
        .wrap_err_with(|| format!("{amount} does not fit 256 bits at {decimals} decimals"))?;
    if units.is_zero() {
        bail!("swap amount {amount} is below one unit at {decimals} decimals");
    }
    Ok(units)
}

/// Builds `exactInputSingle` parameters spending `amount` on `pool`.
///
/// The minimum output is left at zero; slippage is priced into the profit
/// check before a trade is ever dispatched.
///
/// # Errors
/// * If the pool has no token contracts on the active network
/// * If `amount` cannot be expressed in token units
pub fn exact_input_params(
    pool: &PoolConfig,
    side: TradeSide,
    amount: &BigDecimal,
    recipient: Address,
) -> Result<ExactInputSingleParams> {
    let (Some(base), Some(quote)) = (pool.base_token_contract, pool.quote_token_contract) else {
        bail!("{} has no token contracts on this network", pool.symbol());
    };
    let (token_in, token_out, decimals) = match side {
        TradeSide::Buy => (quote, base, pool.quote_decimals),
        TradeSide::Sell => (base, quote, pool.base_decimals),
    };
    let fee = U24::try_from(pool.fee_tier)
        .map_err(|e| eyre!("invalid fee tier {}: {e}", pool.fee_tier))?;

    Ok(ExactInputSingleParams {
        tokenIn: token_in,
        tokenOut: token_out,
        fee,
        recipient,
        amountIn: to_units(amount, decimals)?,
        amountOutMinimum: U256::ZERO,
        sqrtPriceLimitX96: U160::ZERO,
    })
}

/// Base and quote token positions of the trading account on one pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolPositions {
    /// Spent by sells
    pub base: TokenPosition,
    /// Spent by buys
    pub quote: TokenPosition,
}

impl PoolPositions {
    /// Checks that both legs of a round trip of `amount` can be funded.
    ///
    /// # Errors
    /// * If either token is short on balance or router allowance
    pub fn check_round_trip(&self, amount: &BigDecimal) -> Result<()> {
        self.quote
            .check_funding(amount)
            .wrap_err(TradeSide::Buy.to_string())?;
        self.base
            .check_funding(amount)
            .wrap_err(TradeSide::Sell.to_string())
    }
}

/// Submits swaps through a venue's router.
pub struct SwapExecutor<P> {
    /// Signing provider
    provider: P,
    /// Venue this executor trades on
    dex: DexApp,
    /// Router contract
    router: Address,
    /// Receiver of swap output, normally the signer
    recipient: Address,
    /// Log swaps instead of sending them
    dry_run: bool,
}

impl<P> SwapExecutor<P>
where
    P: Provider + 'static,
{
    /// Creates an executor; with `dry_run` nothing is ever broadcast.
    pub const fn new(
        provider: P,
        dex: DexApp,
        router: Address,
        recipient: Address,
        dry_run: bool,
    ) -> Self {
        Self {
            provider,
            dex,
            router,
            recipient,
            dry_run,
        }
    }

    /// Balances of both tokens of `pool` and what the router may spend of them.
    ///
    /// # Errors
    /// * If the pool has no token contracts on the active network
    /// * If a token call fails
    pub async fn positions(&self, pool: &PoolConfig) -> Result<PoolPositions> {
        let (Some(base), Some(quote)) = (pool.base_token_contract, pool.quote_token_contract) else {
            bail!("{} has no token contracts on this network", pool.symbol());
        };
        let base = TokenPosition::fetch(
            &self.provider,
            base,
            &pool.base_token,
            pool.base_decimals,
            self.recipient,
            self.router,
        )
        .await?;
        let quote = TokenPosition::fetch(
            &self.provider,
            quote,
            &pool.quote_token,
            pool.quote_decimals,
            self.recipient,
            self.router,
        )
        .await?;
        Ok(PoolPositions { base, quote })
    }

    /// Swaps `amount` on `pool` in the direction of `side`.
    ///
    /// # Returns
    /// * The transaction hash; in dry-run mode, the hash of the calldata
    ///
    /// # Errors
    /// * If the parameters cannot be built
    /// * If the node rejects the transaction
    pub async fn execute(
        &self,
        pool: &PoolConfig,
        side: TradeSide,
        amount: &BigDecimal,
    ) -> Result<TxHash> {
        let params = exact_input_params(pool, side, amount, self.recipient)?;
        let amount_in = params.amountIn;

        if self.dry_run {
            let call = IV3SwapRouter::exactInputSingleCall { params };
            let hash = keccak256(call.abi_encode());
            info!(
                "chain::execute: [dry run] {} {side} {amount} {} ({amount_in} units) -> {hash}",
                self.dex,
                pool.symbol()
            );
            return Ok(hash);
        }

        let router = IV3SwapRouter::new(self.router, &self.provider);
        let pending = router
            .exactInputSingle(params)
            .send()
            .await
            .wrap_err_with(|| format!("{} {side} {} failed", self.dex, pool.symbol()))?;
        let hash = *pending.tx_hash();
        info!(
            "chain::execute: {} {side} {amount} {} ({amount_in} units) submitted: {hash}",
            self.dex,
            pool.symbol()
        );
        Ok(hash)
    }
}
