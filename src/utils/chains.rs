use derive_more::Display;
use eyre::{eyre, Result};

/// Chain family; selects the pool tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Chain {
    /// BNB Smart Chain
    #[display("BSC")]
    Bsc,
    /// Ethereum
    #[display("ethereum")]
    Ethereum,
}

/// Mainnet or testnet; selects pool addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum NetworkKind {
    /// Production network
    #[display("mainnet")]
    Mainnet,
    /// Test network
    #[display("testnet")]
    Testnet,
}

/// A node endpoint to connect to, with the chain id it must report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Key of this entry, e.g. `BscMainnet`
    pub key: &'static str,
    /// Mainnet or testnet
    pub kind: NetworkKind,
    /// Chain family
    pub chain: Chain,
    /// Display name of the chain
    pub chain_name: String,
    /// Websocket endpoint, used for log subscriptions and transactions
    pub ws_url: String,
    /// EIP-155 chain id
    pub chain_id: u64,
}

impl Network {
    /// Whether this is a production network.
    #[must_use]
    pub fn is_mainnet(&self) -> bool {
        self.kind == NetworkKind::Mainnet
    }
}

/// Every supported network key.
pub const NETWORK_KEYS: [&str; 6] = [
    "BscMainnet",
    "BscTestnet",
    "BscTestnetInfura",
    "BscMainnetInfura",
    "EthMainnet",
    "EthSepolia",
];

/// Looks up a network by key. Infura URLs get `infura_api_key` appended.
///
/// # Errors
/// * If `key` is not one of [`NETWORK_KEYS`]
pub fn network(key: &str, infura_api_key: &str) -> Result<Network> {
    let (key, kind, chain, ws_url, chain_id) = match key {
        "BscMainnet" => (
            "BscMainnet",
            NetworkKind::Mainnet,
            Chain::Bsc,
            "wss://bsc-rpc.publicnode.com".to_string(),
            56,
        ),
        "BscTestnet" => (
            "BscTestnet",
            NetworkKind::Testnet,
            Chain::Bsc,
            "wss://bsc-testnet-rpc.publicnode.com".to_string(),
            97,
        ),
        "BscTestnetInfura" => (
            "BscTestnetInfura",
            NetworkKind::Testnet,
            Chain::Bsc,
            format!("wss://bsc-testnet.infura.io/ws/v3/{infura_api_key}"),
            97,
        ),
        "BscMainnetInfura" => (
            "BscMainnetInfura",
            NetworkKind::Mainnet,
            Chain::Bsc,
            format!("wss://bsc-mainnet.infura.io/ws/v3/{infura_api_key}"),
            56,
        ),
        "EthMainnet" => (
            "EthMainnet",
            NetworkKind::Mainnet,
            Chain::Ethereum,
            format!("wss://mainnet.infura.io/ws/v3/{infura_api_key}"),
            1,
        ),
        "EthSepolia" => (
            "EthSepolia",
            NetworkKind::Testnet,
            Chain::Ethereum,
            format!("wss://sepolia.infura.io/ws/v3/{infura_api_key}"),
            11_155_111,
        ),
        other => {
            return Err(eyre!(
                "unknown network '{other}', expected one of {}",
                NETWORK_KEYS.join(", ")
            ))
        }
    };

    Ok(Network {
        key,
        kind,
        chain,
        chain_name: chain.to_string(),
        ws_url,
        chain_id,
    })
}
