//! Error types

/// Hardware bridge errors
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The device answered with `success: false`
    #[error("Device error: {0}")]
    Device(String),

    /// No matching reply arrived in time
    #[error("Device timeout: {0}")]
    Timeout(String),

    /// The bridge channel is gone
    #[error("Channel error: {0}")]
    Channel(String),

    /// Malformed reply payload
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Network error
    #[error("Network error: {0}")]
    Network(String),
}

/// Result type
pub type Result<T> = std::result::Result<T, Error>;

impl From<Error> for keyring_core::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Device(msg) | Error::Channel(msg) | Error::Protocol(msg) => {
                keyring_core::Error::Device(msg)
            }
            Error::Timeout(msg) => keyring_core::Error::DeviceTimeout(msg),
            Error::Network(msg) => keyring_core::Error::Network(msg),
        }
    }
}
