//! Bridge channel and device transport seams
//!
//! A [`BridgeChannel`] is the raw, shared message bus to the embedded bridge:
//! anything may appear on its inbound side. A [`DeviceTransport`] is the
//! request/reply view the key source talks to; [`crate::BridgeClient`] builds
//! one on top of a channel.

use crate::message::{BridgeRequest, InboundMessage};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

/// Raw message bus shared with the bridge
#[async_trait]
pub trait BridgeChannel: Send + Sync {
    /// Post a request into the bridge
    async fn post(&self, request: &BridgeRequest) -> Result<()>;

    /// Take the inbound message stream. Only the first call returns it.
    fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>>;
}

/// Awaited request/reply exchange with a device
#[async_trait]
pub trait DeviceTransport: Send + Sync {
    /// Send `action` and wait for its successful payload
    async fn request(&self, action: &str, params: Value) -> Result<Value>;
}
