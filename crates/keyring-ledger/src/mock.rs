//! In-process bridge with a software device behind it
//!
//! Replies come from keys derived from a fixed mnemonic and follow the
//! wire format of the real bridge. [`MockBehavior`] switches on the failure
//! modes the client must survive.

use crate::activity::ActivityChecker;
use crate::channel::BridgeChannel;
use crate::message::{actions, bridge_origin, reply_action, BridgeRequest, InboundMessage};
use crate::{Error, Result};
use async_trait::async_trait;
use keyring_core::keys::{derive_xprv, keccak256, seed_from_mnemonic, uncompressed_public_key};
use keyring_core::message::personal_message_hash;
use keyring_core::{Address, PrivateKey};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::mpsc;
use zeroize::Zeroizing;

/// Mnemonic of the default mock device
pub const MOCK_MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

/// Origin the mock uses when asked to impersonate someone else
pub const FOREIGN_ORIGIN: &str = "https://attacker.example";

/// Failure modes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockBehavior {
    /// Sign with a key other than the requested one
    pub tamper: bool,
    /// Never reply
    pub silent: bool,
    /// Reply from a foreign origin only
    pub foreign_origin: bool,
    /// Refuse every request
    pub reject: bool,
    /// Leave the request id out of replies
    pub omit_id: bool,
}

/// Software device reachable through a [`BridgeChannel`]
pub struct MockDevice {
    origin: String,
    seed: Zeroizing<[u8; 64]>,
    tx: mpsc::UnboundedSender<InboundMessage>,
    rx: Mutex<Option<mpsc::UnboundedReceiver<InboundMessage>>>,
    behavior: Mutex<MockBehavior>,
    requests: Mutex<Vec<BridgeRequest>>,
}

impl MockDevice {
    /// Device seeded from [`MOCK_MNEMONIC`], answering as `bridge_url`
    pub fn new(bridge_url: &str) -> keyring_core::Result<Arc<Self>> {
        Self::with_mnemonic(bridge_url, MOCK_MNEMONIC)
    }

    /// Device seeded from `mnemonic`
    pub fn with_mnemonic(bridge_url: &str, mnemonic: &str) -> keyring_core::Result<Arc<Self>> {
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Arc::new(Self {
            origin: bridge_origin(bridge_url),
            seed: seed_from_mnemonic(mnemonic)?,
            tx,
            rx: Mutex::new(Some(rx)),
            behavior: Mutex::new(MockBehavior::default()),
            requests: Mutex::new(Vec::new()),
        }))
    }

    /// Change failure modes
    pub fn set_behavior(&self, behavior: MockBehavior) {
        *self.behavior.lock() = behavior;
    }

    /// Requests received so far
    pub fn requests(&self) -> Vec<BridgeRequest> {
        self.requests.lock().clone()
    }

    /// Number of requests received for `action`
    pub fn request_count(&self, action: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.action == action).count()
    }

    /// Address of the key at a full derivation path
    pub fn address_at(&self, path: &str) -> keyring_core::Result<Address> {
        Ok(self.key_at(path)?.address())
    }

    fn key_at(&self, path: &str) -> keyring_core::Result<PrivateKey> {
        Ok(PrivateKey::from_xprv(&derive_xprv(&self.seed[..], path)?))
    }

    fn signing_key(&self, params: &Value) -> std::result::Result<PrivateKey, String> {
        let path = format!("m/{}", param_str(params, "hdPath")?);
        let path = if self.behavior.lock().tamper {
            format!("{path}/7")
        } else {
            path
        };
        self.key_at(&path).map_err(|e| e.to_string())
    }

    fn handle(&self, request: &BridgeRequest) -> std::result::Result<Value, String> {
        let params = &request.params;
        match request.action.as_str() {
            actions::UNLOCK => {
                let path = format!("m/{}", param_str(params, "hdPath")?);
                let xprv = derive_xprv(&self.seed[..], &path).map_err(|e| e.to_string())?;
                let xpub = xprv.public_key();
                Ok(json!({
                    "publicKey": hex::encode(uncompressed_public_key(xpub.public_key())),
                    "chainCode": hex::encode(xprv.attrs().chain_code),
                    "address": Address::from_public_key(xpub.public_key()).to_checksum(),
                }))
            }
            actions::SIGN_TRANSACTION => {
                let payload = hex::decode(param_str(params, "tx")?).map_err(|e| e.to_string())?;
                let chain_id: u64 = rlp::Rlp::new(&payload).val_at(6).map_err(|e| e.to_string())?;
                let key = self.signing_key(params)?;
                let signature = key
                    .sign_prehash(&keccak256(&payload))
                    .map_err(|e| e.to_string())?;

                // Devices report only the low byte of v
                let v = (chain_id * 2 + 35 + u64::from(signature.recovery_id)) & 0xff;
                Ok(json!({
                    "v": format!("{v:02x}"),
                    "r": hex::encode(signature.r),
                    "s": hex::encode(signature.s),
                }))
            }
            actions::SIGN_PERSONAL_MESSAGE => {
                let message = hex::decode(param_str(params, "message")?).map_err(|e| e.to_string())?;
                let key = self.signing_key(params)?;
                let signature = key
                    .sign_prehash(&personal_message_hash(&message))
                    .map_err(|e| e.to_string())?;
                Ok(json!({
                    "v": 27 + signature.recovery_id,
                    "r": hex::encode(signature.r),
                    "s": hex::encode(signature.s),
                }))
            }
            other => Err(format!("Unknown action {other}")),
        }
    }
}

fn param_str<'a>(params: &'a Value, name: &str) -> std::result::Result<&'a str, String> {
    params
        .get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| format!("Missing parameter {name}"))
}

#[async_trait]
impl BridgeChannel for MockDevice {
    async fn post(&self, request: &BridgeRequest) -> Result<()> {
        self.requests.lock().push(request.clone());
        let behavior = *self.behavior.lock();
        if behavior.silent {
            return Ok(());
        }

        let (success, payload) = if behavior.reject {
            (false, json!({ "error": "Rejected by user" }))
        } else {
            match self.handle(request) {
                Ok(payload) => (true, payload),
                Err(error) => (false, json!({ "error": error })),
            }
        };

        let mut data = json!({
            "action": reply_action(&request.action),
            "success": success,
            "payload": payload,
        });
        if !behavior.omit_id {
            data["id"] = json!(request.id);
        }

        let origin = if behavior.foreign_origin {
            FOREIGN_ORIGIN.to_string()
        } else {
            self.origin.clone()
        };
        self.tx
            .send(InboundMessage { origin, data })
            .map_err(|e| Error::Channel(format!("Reply dropped: {e}")))
    }

    fn take_inbound(&self) -> Option<mpsc::UnboundedReceiver<InboundMessage>> {
        self.rx.lock().take()
    }
}

/// Activity answers from a fixed set of used addresses
#[derive(Debug, Default)]
pub struct StaticActivity {
    active: HashSet<Address>,
}

impl StaticActivity {
    /// Checker reporting history only for `active`
    pub fn new(active: impl IntoIterator<Item = Address>) -> Arc<Self> {
        Arc::new(Self {
            active: active.into_iter().collect(),
        })
    }
}

#[async_trait]
impl ActivityChecker for StaticActivity {
    async fn has_activity(&self, address: &Address) -> bool {
        self.active.contains(address)
    }
}
