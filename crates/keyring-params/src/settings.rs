//! Serializable settings for the hardware bridge.

use crate::policy::{
    DEFAULT_ACCOUNTS_PER_PAGE, DEFAULT_DEVICE_TIMEOUT_SECS, DEFAULT_HD_PATH,
    MAX_REVERSE_LOOKUP_INDEX,
};
use crate::{Network, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Hardware bridge settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LedgerSettings {
    /// Address of the embedded bridge page; its origin authenticates replies
    pub bridge_url: String,
    /// Base derivation path
    pub hd_path: String,
    /// Accounts per discovery page
    pub accounts_per_page: usize,
    /// Bound of the reverse path lookup scan
    pub max_lookup_index: u32,
    /// Device request timeout in seconds
    pub request_timeout_secs: u64,
    /// Stop BIP-44 discovery at the first account without history
    pub implement_full_bip44: bool,
    /// Network name used to pick the activity indexer
    pub network: String,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            bridge_url: String::new(),
            hd_path: DEFAULT_HD_PATH.to_string(),
            accounts_per_page: DEFAULT_ACCOUNTS_PER_PAGE,
            max_lookup_index: MAX_REVERSE_LOOKUP_INDEX,
            request_timeout_secs: DEFAULT_DEVICE_TIMEOUT_SECS,
            implement_full_bip44: false,
            network: "mainnet".to_string(),
        }
    }
}

impl LedgerSettings {
    /// Load settings from a JSON file; absent fields keep their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Device request timeout
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Network definition for the configured name
    pub fn network(&self) -> Network {
        Network::from_name(&self.network)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let settings = LedgerSettings::default();
        assert_eq!(settings.hd_path, "m/44'/60'/0'");
        assert_eq!(settings.accounts_per_page, 5);
        assert_eq!(settings.max_lookup_index, 1000);
        assert_eq!(settings.request_timeout(), Duration::from_secs(60));
        assert!(!settings.implement_full_bip44);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"bridgeUrl": "https://bridge.example/ledger/index.html", "accountsPerPage": 10}}"#)
            .unwrap();

        let settings = LedgerSettings::load(file.path()).unwrap();
        assert_eq!(settings.bridge_url, "https://bridge.example/ledger/index.html");
        assert_eq!(settings.accounts_per_page, 10);
        assert_eq!(settings.max_lookup_index, 1000);
        assert_eq!(settings.network().name, "mainnet");
    }
}
