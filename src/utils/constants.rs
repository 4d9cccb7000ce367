use alloy::primitives::{address, Address};

use crate::dex::DexApp;
use crate::utils::chains::Chain;

/// In-range liquidity below this is reported as low
pub const LOW_LIQUIDITY_THRESHOLD: u128 = 10_000_000_000;

/// Uniswap SwapRouter02 on BSC
pub const UNISWAP_ROUTER_BSC: Address = address!("0xB971eF87ede563556b2ED4b1C0b0019111Dd85d2");
/// Uniswap SwapRouter02 on Ethereum
pub const UNISWAP_ROUTER_ETHEREUM: Address =
    address!("0x68b3465833fb72A70ecDF485E0e4C7bD8665Fc45");
/// PancakeSwap V3 SmartRouter, same address on every chain it is deployed to
pub const PANCAKESWAP_ROUTER: Address = address!("0x13f4EA83D0bd40E75C8222255bc855a974568Dd4");

/// Swap router `dex` uses on `chain`.
#[must_use]
pub const fn swap_router(dex: DexApp, chain: Chain) -> Address {
    match (dex, chain) {
        (DexApp::Uniswap, Chain::Bsc) => UNISWAP_ROUTER_BSC,
        (DexApp::Uniswap, Chain::Ethereum) => UNISWAP_ROUTER_ETHEREUM,
        (DexApp::Pancakeswap, _) => PANCAKESWAP_ROUTER,
    }
}
