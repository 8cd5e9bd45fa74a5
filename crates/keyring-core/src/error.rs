//! Error types for Keyring Core
//!
//! Error taxonomy shared by the key sources, the hardware bridge and the
//! vault controller.

use std::fmt;

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

/// Keyring errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Wrong password, corrupt vault, or no vault to unlock
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Mnemonic failed checksum or wordlist validation
    #[error("Invalid seed: {0}")]
    InvalidSeed(String),

    /// A freshly created source reported no accounts
    #[error("Empty account: {0}")]
    EmptyAccount(String),

    /// No source variant registered under the requested kind
    #[error("Unknown source kind: {0}")]
    UnknownSourceKind(String),

    /// Imported account already present in the vault
    #[error("Duplicate account: {0}")]
    DuplicateAccount(String),

    /// No active source owns the account
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    /// Operation not supported by this source
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// Reverse derivation-path lookup exhausted
    #[error("Unknown address: {0}")]
    UnknownAddress(String),

    /// Device reported a failure
    #[error("Device error: {0}")]
    Device(String),

    /// Device did not reply in time
    #[error("Device timeout: {0}")]
    DeviceTimeout(String),

    /// Locally recovered signer differs from the requested account
    #[error("Signature verification failed: {0}")]
    SignatureVerification(String),

    /// Operation requires an unlocked vault
    #[error("Keyring is locked: {0}")]
    Locked(String),

    /// Source handle does not refer to an active source
    #[error("Source not found: {0}")]
    SourceNotFound(String),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid key material
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Key derivation error
    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    /// Invalid transaction
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),

    /// Invalid message or typed data
    #[error("Invalid message: {0}")]
    InvalidMessage(String),

    /// Storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if error is a user-facing error (vs internal error)
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Error::Authentication(_)
                | Error::InvalidSeed(_)
                | Error::DuplicateAccount(_)
                | Error::AccountNotFound(_)
                | Error::Unsupported(_)
                | Error::InvalidAddress(_)
                | Error::Locked(_)
                | Error::DeviceTimeout(_)
        )
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Error::Authentication(_) => {
                "Incorrect password. Please check and try again.".to_string()
            }
            Error::InvalidSeed(_) => "Seed phrase is invalid.".to_string(),
            Error::DuplicateAccount(_) => {
                "The account you're trying to import is a duplicate.".to_string()
            }
            Error::Unsupported(_) => "Not supported on this device.".to_string(),
            Error::Locked(_) => "Please unlock your wallet first.".to_string(),
            Error::DeviceTimeout(_) => {
                "The hardware wallet did not respond. Make sure it is connected and unlocked."
                    .to_string()
            }
            _ => self.to_string(),
        }
    }

    /// Get error category for logging
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Authentication(_) | Error::Locked(_) => ErrorCategory::Vault,
            Error::InvalidSeed(_)
            | Error::InvalidKey(_)
            | Error::KeyDerivation(_)
            | Error::EmptyAccount(_) => ErrorCategory::Keys,
            Error::UnknownSourceKind(_)
            | Error::SourceNotFound(_)
            | Error::Unsupported(_) => ErrorCategory::Source,
            Error::DuplicateAccount(_)
            | Error::AccountNotFound(_)
            | Error::InvalidAddress(_)
            | Error::UnknownAddress(_) => ErrorCategory::Account,
            Error::Device(_) | Error::DeviceTimeout(_) => ErrorCategory::Device,
            Error::SignatureVerification(_)
            | Error::InvalidTransaction(_)
            | Error::InvalidMessage(_) => ErrorCategory::Signing,
            Error::Storage(_) => ErrorCategory::Storage,
            Error::Network(_) => ErrorCategory::Network,
            Error::Serialization(_) | Error::Other(_) => ErrorCategory::Internal,
        }
    }
}

/// Error categories for classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Vault lifecycle errors
    Vault,
    /// Key material errors
    Keys,
    /// Key source errors
    Source,
    /// Account resolution errors
    Account,
    /// Hardware device errors
    Device,
    /// Signing errors
    Signing,
    /// Storage errors
    Storage,
    /// Network errors
    Network,
    /// Internal/system errors
    Internal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorCategory::Vault => write!(f, "Vault"),
            ErrorCategory::Keys => write!(f, "Keys"),
            ErrorCategory::Source => write!(f, "Source"),
            ErrorCategory::Account => write!(f, "Account"),
            ErrorCategory::Device => write!(f, "Device"),
            ErrorCategory::Signing => write!(f, "Signing"),
            ErrorCategory::Storage => write!(f, "Storage"),
            ErrorCategory::Network => write!(f, "Network"),
            ErrorCategory::Internal => write!(f, "Internal"),
        }
    }
}
