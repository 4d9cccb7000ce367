use std::collections::HashMap;

use alloy::primitives::{address, Address};
use eyre::{eyre, Result};

use super::DexApp;
use crate::utils::chains::{Chain, Network};

/// Pool metadata used for price normalization and swaps.
///
/// The base token is the pool's `token0` and the quote token its `token1`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
    /// Symbol of `token0`
    pub base_token: String,
    /// Symbol of `token1`
    pub quote_token: String,
    /// Decimals of `token0`
    pub base_decimals: u8,
    /// Decimals of `token1`
    pub quote_decimals: u8,
    /// Pool contract on the active network
    pub pool_address: Address,
    /// `token0` contract, if known on the active network
    pub base_token_contract: Option<Address>,
    /// `token1` contract, if known on the active network
    pub quote_token_contract: Option<Address>,
    /// Pool fee tier in hundredths of a basis point, e.g. `3000` for 0.3%
    pub fee_tier: u32,
}

impl PoolConfig {
    /// `BASE/QUOTE` symbol of this pool.
    #[must_use]
    pub fn symbol(&self) -> String {
        format!("{}/{}", self.base_token, self.quote_token)
    }
}

/// A row of the static tables, before the network picks an address.
struct PoolEntry {
    /// `BASE/QUOTE`
    symbol: &'static str,
    /// `token0` symbol and decimals
    base: (&'static str, u8),
    /// `token1` symbol and decimals
    quote: (&'static str, u8),
    /// Mainnet pool
    address: Option<Address>,
    /// Testnet pool
    test_address: Option<Address>,
    /// Mainnet token contracts (`token0`, `token1`)
    tokens: Option<(Address, Address)>,
    /// Fee tier
    fee_tier: u32,
}

/// BSC-USD (18 decimals on BSC)
const BSC_USDT: Address = address!("0x55d398326f99059fF775485246999027B3197955");
/// Wrapped BNB
const BSC_WBNB: Address = address!("0xbb4CdB9CBd36B01bD1cBaEBF2De08d9173bc095c");
/// Wrapped ether on Ethereum
const ETH_WETH: Address = address!("0xC02aaA39b223FE8D0A0e5C4F27eAD9083C756Cc2");
/// Tether on Ethereum
const ETH_USDT: Address = address!("0xdAC17F958D2ee523a2206206994597C13D831ec7");
/// Wrapped bitcoin on Ethereum
const ETH_WBTC: Address = address!("0x2260FAC5E5542a773Aa44fBCfeDf7C193bc2C599");

/// Rows for one venue on one chain.
fn table(dex: DexApp, chain: Chain) -> Vec<PoolEntry> {
    match (dex, chain) {
        (DexApp::Uniswap, Chain::Bsc) => vec![PoolEntry {
            symbol: "USDT/WBNB",
            base: ("USDT", 18),
            quote: ("WBNB", 18),
            address: Some(address!("0x47a90A2d92A8367A91EfA1906bFc8c1E05bf10c4")),
            test_address: None,
            tokens: Some((BSC_USDT, BSC_WBNB)),
            fee_tier: 3000,
        }],
        (DexApp::Pancakeswap, Chain::Bsc) => vec![
            PoolEntry {
                symbol: "USDT/WBNB",
                base: ("USDT", 18),
                quote: ("WBNB", 18),
                address: Some(address!("0x172fcD41E0913e95784454622d1c3724f546f849")),
                test_address: Some(address!("0x5F52Ad4bD4f519AE79999400ad8B83A3D002fD92")),
                tokens: Some((BSC_USDT, BSC_WBNB)),
                fee_tier: 2500,
            },
            PoolEntry {
                symbol: "WBNB/USDC",
                base: ("WBNB", 18),
                quote: ("USDC", 6),
                address: None,
                test_address: Some(address!("0x172fcD41E0913e95784454622d1c3724f546f849")),
                tokens: None,
                fee_tier: 2500,
            },
            PoolEntry {
                symbol: "BUSD/WBNB",
                base: ("BUSD", 6),
                quote: ("WBNB", 18),
                address: None,
                test_address: Some(address!("0x58C6Fc654b3deE6839b65136f61cB9120d96BCc6")),
                tokens: None,
                fee_tier: 2500,
            },
        ],
        (DexApp::Uniswap, Chain::Ethereum) => vec![
            PoolEntry {
                symbol: "WETH/USDT",
                base: ("WETH", 18),
                quote: ("USDT", 6),
                address: Some(address!("0x4e68Ccd3E89f51C3074ca5072bbAC773960dFa36")),
                test_address: None,
                tokens: Some((ETH_WETH, ETH_USDT)),
                fee_tier: 3000,
            },
            PoolEntry {
                symbol: "WETH/USDC",
                base: ("WETH", 18),
                quote: ("USDC", 6),
                address: None,
                test_address: Some(address!("0x3289680dD4d6C10bb19b899729cda5eEF58AEfF1")),
                tokens: None,
                fee_tier: 3000,
            },
            PoolEntry {
                symbol: "WBTC/WETH",
                base: ("WBTC", 8),
                quote: ("WETH", 18),
                address: Some(address!("0x4585FE77225b41b697C938B018E2Ac67Ac5a20c0")),
                test_address: None,
                tokens: Some((ETH_WBTC, ETH_WETH)),
                fee_tier: 500,
            },
        ],
        (DexApp::Pancakeswap, Chain::Ethereum) => vec![PoolEntry {
            symbol: "WETH/USDT",
            base: ("WETH", 18),
            quote: ("USDT", 6),
            address: Some(address!("0x6CA298D2983aB03Aa1dA7679389D955A4eFEE15C")),
            test_address: None,
            tokens: Some((ETH_WETH, ETH_USDT)),
            fee_tier: 500,
        }],
    }
}

impl PoolEntry {
    /// Resolves the row for `network`, or `None` if it has no pool there.
    fn resolve(&self, network: &Network) -> Option<PoolConfig> {
        let (pool_address, tokens) = if network.is_mainnet() {
            (self.address?, self.tokens)
        } else {
            (self.test_address?, None)
        };

        Some(PoolConfig {
            base_token: self.base.0.to_string(),
            quote_token: self.quote.0.to_string(),
            base_decimals: self.base.1,
            quote_decimals: self.quote.1,
            pool_address,
            base_token_contract: tokens.map(|(base, _)| base),
            quote_token_contract: tokens.map(|(_, quote)| quote),
            fee_tier: self.fee_tier,
        })
    }
}

/// All pools `dex` has on `network`, by symbol.
#[must_use]
pub fn markets(dex: DexApp, network: &Network) -> HashMap<String, PoolConfig> {
    table(dex, network.chain)
        .iter()
        .filter_map(|entry| Some((entry.symbol.to_string(), entry.resolve(network)?)))
        .collect()
}

/// The pool `dex` uses for `symbol` on `network`.
///
/// # Errors
/// * If the venue has no such pool on the chain
/// * If the pool has no address for the network (mainnet vs testnet)
pub fn active_market(symbol: &str, dex: DexApp, network: &Network) -> Result<PoolConfig> {
    let entry = table(dex, network.chain)
        .into_iter()
        .find(|entry| entry.symbol == symbol)
        .ok_or_else(|| eyre!("no {dex} pool for {symbol} on {}", network.chain_name))?;

    entry.resolve(network).ok_or_else(|| {
        eyre!(
            "{dex} pool for {symbol} has no address on {} {}",
            network.chain_name,
            network.kind
        )
    })
}
