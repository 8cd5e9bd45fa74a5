//! IRChain keyring core
//!
//! This crate implements the key primitives and the key source contract:
//! address normalization, mnemonic and BIP-32 derivation, recoverable
//! signatures, legacy transactions, message hashing and the Simple and
//! HD-Tree key sources.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod address;
pub mod encoding;
pub mod error;
pub mod gas;
pub mod hd;
pub mod keys;
pub mod message;
pub mod registry;
pub mod simple;
pub mod source;
pub mod transaction;

pub use address::{normalize, Address};
pub use error::{Error, ErrorCategory, Result};
pub use gas::{add_gas_buffer, add_gas_buffer_with};
pub use hd::HdKeySource;
pub use keys::{generate_mnemonic, keccak256, validate_mnemonic, PrivateKey, RecoverableSignature};
pub use message::{MessageParams, TypedField, TypedMessageParams};
pub use registry::{SourceFactory, SourceRegistry};
pub use simple::SimpleKeySource;
pub use source::{KeySource, SerializedSource, SourceKind};
pub use transaction::{Transaction, TransactionSignature};
