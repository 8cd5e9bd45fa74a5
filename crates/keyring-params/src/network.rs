//! IRChain network definitions

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Network type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Mainnet
    Mainnet,
}

impl FromStr for NetworkType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mainnet" => Ok(Self::Mainnet),
            other => Err(crate::Error::InvalidNetwork(other.to_string())),
        }
    }
}

/// Network configuration
#[derive(Debug, Clone)]
pub struct Network {
    /// Network type
    pub network_type: NetworkType,
    /// Human-readable name
    pub name: &'static str,
    /// Coin type (BIP-44)
    pub coin_type: u32,
    /// Chain-indexing endpoint used for account activity lookups
    pub indexer_url: &'static str,
}

impl Network {
    /// Get mainnet parameters
    pub const fn mainnet() -> Self {
        Self {
            network_type: NetworkType::Mainnet,
            name: "mainnet",
            coin_type: 60,
            indexer_url: "https://scan.irchain.io/",
        }
    }

    /// Get network by type
    pub const fn from_type(network_type: NetworkType) -> Self {
        match network_type {
            NetworkType::Mainnet => Self::mainnet(),
        }
    }

    /// Resolve a network by name, falling back to mainnet for unknown names.
    pub fn from_name(name: &str) -> Self {
        name.parse::<NetworkType>()
            .map(Self::from_type)
            .unwrap_or_else(|_| Self::mainnet())
    }

    /// Indexer base URL without a trailing slash
    pub fn indexer_base(&self) -> &'static str {
        self.indexer_url.trim_end_matches('/')
    }
}
