//! Hardware wallet bridge for the IRChain keyring
//!
//! Talks to a hardware device through an embedded bridge page over a shared
//! message channel, and exposes the device as a key source.
//!
//! ## Safety Properties
//!
//! - **Origin Check**: replies are accepted only from the bridge's origin
//! - **Correlated Replies**: each request has its own id and timeout
//! - **Local Verification**: every device signature is recovered and compared
//!   with the requested account before it is returned

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod activity;
pub mod channel;
pub mod client;
pub mod error;
pub mod message;
#[cfg(any(test, feature = "test-helpers"))]
pub mod mock;
pub mod pagination;
pub mod path;
pub mod source;

pub use activity::{ActivityChecker, IndexerActivityChecker};
pub use channel::{BridgeChannel, DeviceTransport};
pub use client::BridgeClient;
pub use error::{Error, Result};
pub use message::{bridge_origin, BridgeReply, BridgeRequest, InboundMessage};
pub use pagination::{DiscoveredAccount, Pagination};
pub use source::{ledger_factory, LedgerKeySource};
