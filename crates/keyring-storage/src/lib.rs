//! Encrypted vault storage for the IRChain keyring
//!
//! Provides the password-based vault encryptor and single-slot vault
//! persistence used by the keyring controller.
//!
//! ## Security Features
//!
//! - **Vault Encryption**: AES-256-GCM or ChaCha20-Poly1305 sealing of the serialized sources
//! - **Password KDF**: Argon2id with 64 MiB memory, 3 iterations, 4 lanes
//! - **Opaque Failures**: wrong passwords and corrupt vaults are indistinguishable
//! - **Atomic Writes**: file-backed vaults are replaced, never partially written

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod encryptor;
pub mod error;
pub mod security;
pub mod store;

pub use encryptor::{Encryptor, PasswordEncryptor, VAULT_FORMAT_VERSION};
pub use error::{Error, Result};
pub use security::{derive_key_bytes, generate_salt, KdfParams, VaultCipher, VaultKey};
pub use store::{FileVaultStore, MemoryVaultStore, VaultStore};
