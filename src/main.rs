use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::U256;
use arbitrator::arb::price::normalize_price;
use arbitrator::arb::{ArbEngine, OrderConfig, SharedOrderConfig};
use arbitrator::config::Config;
use arbitrator::dex::pool_configs::{active_market, markets};
use arbitrator::dex::pool_venue::PoolVenue;
use arbitrator::dex::{DexApp, ReconnectPolicy};
use arbitrator::notify::SlackNotifier;
use arbitrator::utils::logger::setup_logger;
use arbitrator::utils::providers::create_ws_provider;
use clap::{Parser, Subcommand};
use eyre::{eyre, Error, Result, WrapErr};
use log::info;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the arbitrage engine (default)
    Start {
        /// Symbol to trade, overrides ARB_SYMBOL
        #[arg(long)]
        symbol: Option<String>,
    },
    /// List the pools of both venues on the configured network
    Pools,
    /// Show the trading account's balances and router allowances
    Balance {
        /// Symbol to check, overrides ARB_SYMBOL
        #[arg(long)]
        symbol: Option<String>,
    },
    /// Convert a sqrtPriceX96 into a price using a pool's decimals
    Price {
        /// Venue the pool belongs to
        #[arg(long, value_enum)]
        dex: DexApp,
        /// Pool symbol, e.g. USDT/WBNB
        #[arg(long)]
        symbol: String,
        /// Raw sqrtPriceX96 as a decimal integer
        #[arg(long)]
        sqrt_price: String,
    },
    /// Send slack message
    Slack { message: String },
}

async fn start(config: Config, symbol: Option<String>) -> Result<(), Error> {
    let mut order = config.order.clone();
    if let Some(symbol) = symbol {
        order.active_symbol = symbol;
    }
    let order = SharedOrderConfig::new(order)?;
    let OrderConfig {
        active_symbol: symbol,
        notional_amount,
        ..
    } = order.current_config();

    let signer = config.signer()?;
    let recipient = signer.address();
    let provider = create_ws_provider(&config.network, signer).await?;

    let venue = |dex| {
        Arc::new(PoolVenue::on_chain(
            dex,
            &config.network,
            provider.clone(),
            recipient,
            config.dry_run,
            config.reconnect.clone(),
        ))
    };
    let (venue_a, venue_b) = (venue(config.venue_a), venue(config.venue_b));
    if !config.dry_run {
        venue_a.preflight(&symbol, &notional_amount).await?;
        venue_b.preflight(&symbol, &notional_amount).await?;
    }

    let mut engine = ArbEngine::new(venue_a, venue_b, order);
    if let Some(token) = &config.slack_token {
        engine = engine.with_notifier(SlackNotifier::new(token)?);
    }
    let engine = Arc::new(engine);

    info!(
        "Starting {symbol} arbitrage on {} between {} and {} (dry run: {})",
        config.network.key, config.venue_a, config.venue_b, config.dry_run
    );

    tokio::spawn({
        let engine = Arc::clone(&engine);
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted, finishing trades in flight");
                engine.shutdown();
            }
        }
    });

    let state = engine.run(&symbol).await?;
    info!(
        "Session ended ({}): {} evaluations, {} trades",
        state.phase, state.evaluations, state.trades_dispatched
    );
    Ok(())
}

async fn show_balances(config: &Config, symbol: Option<String>) -> Result<(), Error> {
    let symbol = symbol.unwrap_or_else(|| config.order.active_symbol.clone());
    let signer = config.signer()?;
    let account = signer.address();
    let provider = create_ws_provider(&config.network, signer).await?;

    println!("{account} on {}:", config.network.key);
    for dex in [config.venue_a, config.venue_b] {
        let venue = PoolVenue::on_chain(
            dex,
            &config.network,
            provider.clone(),
            account,
            true,
            ReconnectPolicy::disabled(),
        );
        let positions = venue.positions(&symbol).await?;
        for position in [positions.base, positions.quote] {
            println!(
                "  {dex:<12} {:<6} balance {} (router may spend {})",
                position.token, position.balance, position.allowance
            );
        }
    }
    Ok(())
}

fn list_pools(config: &Config) {
    for dex in [config.venue_a, config.venue_b] {
        let mut pools: Vec<_> = markets(dex, &config.network).into_values().collect();
        pools.sort_by_key(|pool| pool.symbol());

        println!("{dex} on {}:", config.network.key);
        for pool in pools {
            println!(
                "  {:<12} {} (fee tier {}, decimals {}/{})",
                pool.symbol(),
                pool.pool_address,
                pool.fee_tier,
                pool.base_decimals,
                pool.quote_decimals
            );
        }
    }
}

fn print_price(config: &Config, dex: DexApp, symbol: &str, sqrt_price: &str) -> Result<(), Error> {
    let pool = active_market(symbol, dex, &config.network)?;
    let sqrt_price_x96 = U256::from_str(sqrt_price.trim())
        .wrap_err_with(|| format!("invalid sqrtPriceX96 '{sqrt_price}'"))?;
    let price = normalize_price(sqrt_price_x96, pool.base_decimals, pool.quote_decimals)?;
    println!("{dex} {symbol}: {price}");
    Ok(())
}

async fn send_slack_message(config: &Config, message: &str) -> Result<(), Error> {
    let token = config
        .slack_token
        .as_deref()
        .ok_or_else(|| eyre!("SLACK_OAUTH_TOKEN not set"))?;
    let notifier = SlackNotifier::new(token)?;
    notifier.send(message).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    setup_logger()?;

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Some(Commands::Start { symbol }) => start(config, symbol).await?,
        Some(Commands::Pools) => list_pools(&config),
        Some(Commands::Balance { symbol }) => show_balances(&config, symbol).await?,
        Some(Commands::Price {
            dex,
            symbol,
            sqrt_price,
        }) => print_price(&config, dex, &symbol, &sqrt_price)?,
        Some(Commands::Slack { message }) => send_slack_message(&config, &message).await?,
        None => start(config, None).await?,
    }

    Ok(())
}
