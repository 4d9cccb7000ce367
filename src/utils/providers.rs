use alloy::network::EthereumWallet;
use alloy::providers::{Provider, ProviderBuilder, WsConnect};
use alloy::signers::local::PrivateKeySigner;
use eyre::{bail, Error, Result};
use log::info;

use crate::utils::chains::Network;

/// Creates a signing websocket provider for `network`.
///
/// The websocket transport serves both the swap log subscriptions and
/// transaction submission.
///
/// # Returns
/// A provider with the recommended fillers and `signer` as its wallet
///
/// # Errors
/// * If the websocket connection fails
/// * If the node is on a different chain than `network`
pub async fn create_ws_provider(
    network: &Network,
    signer: PrivateKeySigner,
) -> Result<impl Provider + Clone + 'static, Error> {
    let wallet = EthereumWallet::from(signer);
    let provider = ProviderBuilder::new()
        .wallet(wallet)
        .on_ws(WsConnect::new(network.ws_url.clone()))
        .await?;
    verify_chain_id(network, provider.get_chain_id().await?)?;
    info!(
        "providers::create_ws_provider: connected to {} ({}, chain id {})",
        network.key, network.chain_name, network.chain_id
    );
    Ok(provider)
}

/// Fails unless the node reports `network`'s chain id.
///
/// # Errors
/// * If `reported` differs from the expected chain id
pub fn verify_chain_id(network: &Network, reported: u64) -> Result<()> {
    if reported != network.chain_id {
        bail!(
            "{} expects chain id {}, node reports {reported}",
            network.key,
            network.chain_id
        );
    }
    Ok(())
}
