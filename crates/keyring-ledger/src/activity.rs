//! Account activity lookups for gap-limit discovery

use async_trait::async_trait;
use keyring_core::Address;
use keyring_params::Network;
use serde::Deserialize;
use tracing::{debug, warn};

/// Answers whether an address has on-chain history
#[async_trait]
pub trait ActivityChecker: Send + Sync {
    /// `true` when the address has at least one transaction.
    ///
    /// Lookup failures answer `false`, which ends gap-limit discovery.
    async fn has_activity(&self, address: &Address) -> bool;
}

#[derive(Debug, Deserialize)]
struct AddressHistory {
    #[serde(default)]
    d: Vec<serde_json::Value>,
}

/// Activity lookups against the chain indexer
#[derive(Debug, Clone)]
pub struct IndexerActivityChecker {
    client: reqwest::Client,
    base_url: String,
}

impl IndexerActivityChecker {
    /// Checker for the network's indexer
    pub fn new(network: &Network) -> Self {
        Self::with_base_url(network.indexer_base())
    }

    /// Checker for an explicit indexer base URL
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Lookup URL for `address`
    pub fn lookup_url(&self, address: &Address) -> String {
        format!("{}/address={}?format=json", self.base_url, address)
    }

    async fn fetch(&self, address: &Address) -> Result<bool, String> {
        let url = self.lookup_url(address);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| format!("HTTP error: {}", e))?;

        if !response.status().is_success() {
            return Err(format!("Indexer returned {}", response.status()));
        }

        let history: AddressHistory = response
            .json()
            .await
            .map_err(|e| format!("Failed to parse indexer response: {}", e))?;
        Ok(!history.d.is_empty())
    }
}

#[async_trait]
impl ActivityChecker for IndexerActivityChecker {
    async fn has_activity(&self, address: &Address) -> bool {
        match self.fetch(address).await {
            Ok(active) => {
                debug!("Activity for {}: {}", address, active);
                active
            }
            Err(e) => {
                warn!("Activity lookup for {} failed, assuming no history: {}", address, e);
                false
            }
        }
    }
}
