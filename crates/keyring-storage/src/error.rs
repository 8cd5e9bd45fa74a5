//! Error types

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Vault could not be opened (wrong password or corrupt blob)
    #[error("Decryption error: {0}")]
    Decryption(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Storage error (generic)
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for keyring_core::Error {
    fn from(err: Error) -> Self {
        match err {
            // Never distinguish a bad password from a damaged vault
            Error::Decryption(_) => {
                keyring_core::Error::Authentication("Incorrect password or corrupt vault".to_string())
            }
            Error::Serialization(e) => keyring_core::Error::Serialization(e),
            other => keyring_core::Error::Storage(other.to_string()),
        }
    }
}
