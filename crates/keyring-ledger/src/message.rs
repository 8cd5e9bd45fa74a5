//! Bridge wire messages
//!
//! Outbound: `{id, action, params, target}`. Inbound replies carry
//! `{action: "<action>-reply", success, payload}` and, from bridges that
//! support it, the `id` of the request they answer.

use keyring_params::BRIDGE_TARGET;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Bridge actions
pub mod actions {
    /// Unlock at a derivation path, returning public key and chain code
    pub const UNLOCK: &str = "ledger-unlock";
    /// Sign an RLP transaction payload
    pub const SIGN_TRANSACTION: &str = "ledger-sign-transaction";
    /// Sign a personal message
    pub const SIGN_PERSONAL_MESSAGE: &str = "ledger-sign-personal-message";
}

/// Action tag of the reply to `action`
pub fn reply_action(action: &str) -> String {
    format!("{action}-reply")
}

/// Origin of a bridge address: everything before its last path segment
pub fn bridge_origin(bridge_url: &str) -> String {
    match bridge_url.rfind('/') {
        Some(pos) => bridge_url[..pos].to_string(),
        None => String::new(),
    }
}

/// Request posted into the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeRequest {
    /// Correlation id, unique per client
    pub id: u64,
    /// Requested action
    pub action: String,
    /// Action parameters
    pub params: Value,
    /// Fixed bridge tag
    pub target: String,
}

impl BridgeRequest {
    /// New request addressed to the bridge
    pub fn new(id: u64, action: &str, params: Value) -> Self {
        Self {
            id,
            action: action.to_string(),
            params,
            target: BRIDGE_TARGET.to_string(),
        }
    }
}

/// Reply from the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeReply {
    /// Id of the answered request, when the bridge echoes it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// `<action>-reply`
    pub action: String,
    /// Whether the device completed the action
    pub success: bool,
    /// Action result or error description
    #[serde(default)]
    pub payload: Value,
}

impl BridgeReply {
    /// Device-reported failure text
    pub fn error_text(&self) -> String {
        match &self.payload {
            Value::String(s) => s.clone(),
            Value::Object(map) => map
                .get("error")
                .or_else(|| map.get("message"))
                .map(|v| v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string()))
                .unwrap_or_else(|| "Unknown error".to_string()),
            Value::Null => "Unknown error".to_string(),
            other => other.to_string(),
        }
    }
}

/// Any message observed on the shared channel
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    /// Declared origin of the sender
    pub origin: String,
    /// Message body
    pub data: Value,
}
