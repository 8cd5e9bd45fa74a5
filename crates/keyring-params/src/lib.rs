//! Keyring network parameters and policy constants
//!
//! This crate provides network definitions, derivation path defaults,
//! discovery/pagination policy and the serde-backed settings consumed by
//! the key-custody crates.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod network;
pub mod policy;
pub mod settings;

pub use network::{Network, NetworkType};
pub use policy::{
    BIP44_DEFAULT_PATH, BRIDGE_TARGET, DEFAULT_ACCOUNTS_PER_PAGE, DEFAULT_DEVICE_TIMEOUT_SECS,
    DEFAULT_GAS_BUFFER, DEFAULT_HD_PATH, HD_TREE_DEFAULT_PATH, LEGACY_PATH_BASE,
    MAX_REVERSE_LOOKUP_INDEX,
};
pub use settings::LedgerSettings;

/// Error types for parameter operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid network specified
    #[error("Invalid network: {0}")]
    InvalidNetwork(String),

    /// Settings could not be parsed
    #[error("Invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// Settings file could not be read
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for parameter operations
pub type Result<T> = std::result::Result<T, Error>;
