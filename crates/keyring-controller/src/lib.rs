//! IRChain keyring vault controller
//!
//! Orchestrates the active key sources behind one password-encrypted vault:
//! lock and unlock, source and account management, account resolution,
//! signing dispatch, change events and a public session snapshot.
//!
//! Errors are the [`keyring_core::Error`] taxonomy, surfaced unchanged.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod controller;
pub mod session;

pub use controller::KeyringController;
pub use keyring_core::{Error, Result};
pub use session::{KeyringEvent, KeyringSnapshot, KeyringSummary, SourceId};
