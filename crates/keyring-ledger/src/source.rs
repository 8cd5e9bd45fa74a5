//! Hardware key source
//!
//! Keys never leave the device. Account addresses come from the public key
//! the device reports when unlocked, and every signature it returns is
//! checked locally against the requested account before being handed out.

use crate::activity::ActivityChecker;
use crate::channel::DeviceTransport;
use crate::message::actions;
use crate::pagination::{DiscoveredAccount, Pagination};
use crate::path::{is_bip44, path_for_index, to_device_path};
use crate::Error as BridgeError;
use async_trait::async_trait;
use bip32::XPub;
use keyring_core::encoding::{decode_hex, decode_hex_fixed};
use keyring_core::keys::{derive_public_child, xpub_from_parts};
use keyring_core::message::{message_bytes, personal_message_hash};
use keyring_core::{
    Address, Error, KeySource, RecoverableSignature, Result, SourceFactory, SourceKind, Transaction,
    TypedField,
};
use keyring_params::LedgerSettings;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::any::Any;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const NOT_SUPPORTED: &str = "Not supported on this device";

/// Persisted state
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct LedgerState {
    hd_path: Option<String>,
    accounts: Vec<Address>,
    bridge_url: Option<String>,
    #[serde(rename = "implementFullBIP44")]
    implement_full_bip44: bool,
    paths: BTreeMap<Address, u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnlockReply {
    public_key: String,
    chain_code: String,
    #[serde(default)]
    address: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SignatureReply {
    v: Value,
    r: String,
    s: String,
}

impl SignatureReply {
    fn v(&self) -> Result<u64> {
        let parsed = match &self.v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => {
                let digits = s.trim_start_matches("0x");
                u64::from_str_radix(digits, 16).ok()
            }
            _ => None,
        };
        parsed.ok_or_else(|| Error::Device(format!("Malformed v in device reply: {}", self.v)))
    }
}

fn parse_reply<T: serde::de::DeserializeOwned>(payload: Value, action: &str) -> Result<T> {
    serde_json::from_value(payload)
        .map_err(|e| BridgeError::Protocol(format!("Malformed {action} reply: {e}")).into())
}

/// Key source backed by a hardware wallet behind the bridge
pub struct LedgerKeySource {
    transport: Arc<dyn DeviceTransport>,
    activity: Arc<dyn ActivityChecker>,
    hd_path: String,
    bridge_url: String,
    implement_full_bip44: bool,
    max_lookup_index: u32,
    accounts: Vec<Address>,
    paths: BTreeMap<Address, u32>,
    pagination: Pagination,
    unlocked_account: u32,
    hdk: Option<XPub>,
}

impl LedgerKeySource {
    /// Source talking to the device through `transport`
    pub fn new(
        transport: Arc<dyn DeviceTransport>,
        activity: Arc<dyn ActivityChecker>,
        settings: &LedgerSettings,
    ) -> Self {
        Self {
            transport,
            activity,
            hd_path: settings.hd_path.clone(),
            bridge_url: settings.bridge_url.clone(),
            implement_full_bip44: settings.implement_full_bip44,
            max_lookup_index: settings.max_lookup_index,
            accounts: Vec::new(),
            paths: BTreeMap::new(),
            pagination: Pagination::new(settings.accounts_per_page),
            unlocked_account: 0,
            hdk: None,
        }
    }

    /// Base derivation path
    pub fn hd_path(&self) -> &str {
        &self.hd_path
    }

    /// Bridge address recorded with this source
    pub fn bridge_url(&self) -> &str {
        &self.bridge_url
    }

    /// Whether the base key has been read from the device
    pub fn is_unlocked(&self) -> bool {
        self.hdk.is_some()
    }

    /// Current discovery page (0 before the first page)
    pub fn page(&self) -> u32 {
        self.pagination.page()
    }

    /// Cached derivation index of `address`
    pub fn cached_index(&self, address: &Address) -> Option<u32> {
        self.paths.get(address).copied()
    }

    /// Index the next [`KeySource::add_accounts`] call starts from
    pub fn set_account_to_unlock(&mut self, index: u32) {
        self.unlocked_account = index;
    }

    /// Switch the base path; a different path drops the unlocked key
    pub fn set_hd_path(&mut self, hd_path: &str) {
        if self.hd_path != hd_path {
            self.hdk = None;
        }
        self.hd_path = hd_path.to_string();
    }

    /// Forget everything learned from the device
    pub fn forget_device(&mut self) {
        self.accounts.clear();
        self.paths.clear();
        self.pagination.reset();
        self.unlocked_account = 0;
        self.hdk = None;
        info!("Hardware device forgotten");
    }

    /// Unlock the device at `path`, or at the base path when `None`.
    ///
    /// Only a base-path unlock keeps the key for local derivation. A
    /// base-path unlock of an already unlocked source does not reach the
    /// device.
    pub async fn unlock(&mut self, path: Option<&str>) -> Result<Address> {
        if path.is_none() {
            if let Some(hdk) = &self.hdk {
                return Ok(Address::from_public_key(hdk.public_key()));
            }
        }

        let target = path.unwrap_or(self.hd_path.as_str()).to_string();
        let payload = self
            .transport
            .request(actions::UNLOCK, json!({ "hdPath": to_device_path(&target) }))
            .await?;
        let reply: UnlockReply = parse_reply(payload, actions::UNLOCK)?;

        let public_key = decode_hex(&reply.public_key)?;
        let chain_code = decode_hex(&reply.chain_code)?;
        let xpub = xpub_from_parts(&public_key, &chain_code)?;
        let address = Address::from_public_key(xpub.public_key());

        if let Some(reported) = reply.address.as_deref() {
            if Address::parse(reported)? != address {
                return Err(Error::Device(format!(
                    "Device reported {reported} for a key that derives {address}"
                )));
            }
        }

        if path.is_none() {
            debug!("Device unlocked at {}", target);
            self.hdk = Some(xpub);
        }
        Ok(address)
    }

    /// Load page 1 of candidate accounts
    pub async fn first_page(&mut self) -> Result<Vec<DiscoveredAccount>> {
        let range = self.pagination.first();
        self.load_page(range).await
    }

    /// Load the page after the current one
    pub async fn next_page(&mut self) -> Result<Vec<DiscoveredAccount>> {
        let range = self.pagination.next();
        self.load_page(range).await
    }

    /// Load the page before the current one, staying on page 1 at the start
    pub async fn previous_page(&mut self) -> Result<Vec<DiscoveredAccount>> {
        let range = self.pagination.previous();
        self.load_page(range).await
    }

    async fn load_page(&mut self, range: Range<u32>) -> Result<Vec<DiscoveredAccount>> {
        self.unlock(None).await?;
        let gap_limit = is_bip44(&self.hd_path) && self.implement_full_bip44;

        let mut page = Vec::with_capacity(range.len());
        for index in range {
            let address = self.account_at(index).await?;
            page.push(DiscoveredAccount {
                address,
                balance: None,
                index,
            });

            if gap_limit && !self.activity.has_activity(&address).await {
                debug!("Discovery stopped at unused account {}", index);
                break;
            }
        }
        Ok(page)
    }

    fn derive_local(&self, index: u32) -> Result<Address> {
        let hdk = self
            .hdk
            .as_ref()
            .ok_or_else(|| Error::Device("Device is not unlocked".to_string()))?;
        let child = derive_public_child(hdk, index)?;
        Ok(Address::from_public_key(child.public_key()))
    }

    async fn account_at(&mut self, index: u32) -> Result<Address> {
        let address = if is_bip44(&self.hd_path) {
            let path = path_for_index(&self.hd_path, index);
            self.unlock(Some(path.as_str())).await?
        } else {
            self.derive_local(index)?
        };
        self.paths.insert(address, index);
        Ok(address)
    }

    async fn index_for(&mut self, address: &Address) -> Result<u32> {
        if let Some(index) = self.cached_index(address) {
            return Ok(index);
        }

        if is_bip44(&self.hd_path) {
            let index = self.unlocked_account;
            if self.account_at(index).await? == *address {
                return Ok(index);
            }
            return Err(Error::UnknownAddress(format!(
                "{address} is not the account at index {index}"
            )));
        }

        self.unlock(None).await?;
        for index in 0..self.max_lookup_index {
            if self.derive_local(index)? == *address {
                self.paths.insert(*address, index);
                return Ok(index);
            }
        }
        Err(Error::UnknownAddress(format!(
            "{address} is not among the first {} accounts",
            self.max_lookup_index
        )))
    }

    async fn device_path_for(&mut self, address: &Address) -> Result<String> {
        let index = self.index_for(address).await?;
        Ok(to_device_path(&path_for_index(&self.hd_path, index)))
    }
}

#[async_trait]
impl KeySource for LedgerKeySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Hardware
    }

    async fn serialize(&self) -> Result<Value> {
        let state = LedgerState {
            hd_path: Some(self.hd_path.clone()),
            accounts: self.accounts.clone(),
            bridge_url: Some(self.bridge_url.clone()),
            implement_full_bip44: self.implement_full_bip44,
            paths: self.paths.clone(),
        };
        Ok(serde_json::to_value(state)?)
    }

    async fn deserialize(&mut self, data: Value) -> Result<()> {
        if data.is_null() {
            return Ok(());
        }
        let state: LedgerState = serde_json::from_value(data)?;

        if let Some(hd_path) = state.hd_path {
            self.set_hd_path(&hd_path);
        }
        if let Some(bridge_url) = state.bridge_url {
            if !bridge_url.is_empty() && bridge_url != self.bridge_url {
                warn!("Vault bridge {} differs from configured bridge {}", bridge_url, self.bridge_url);
            }
            self.bridge_url = bridge_url;
        }
        self.accounts = state.accounts;
        self.implement_full_bip44 = state.implement_full_bip44;
        self.paths = state.paths;
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.accounts.clone())
    }

    async fn add_accounts(&mut self, n: usize) -> Result<Vec<Address>> {
        self.unlock(None).await?;

        let count = u32::try_from(n).map_err(|_| Error::Other(format!("Cannot add {n} accounts")))?;
        let from = self.unlocked_account;
        let mut added = Vec::new();
        for index in from..from.saturating_add(count) {
            let address = self.account_at(index).await?;
            if !self.accounts.contains(&address) {
                self.accounts.push(address);
                added.push(address);
            }
        }

        self.pagination.reset();
        info!("Added {} hardware account(s)", added.len());
        Ok(added)
    }

    async fn sign_transaction(&mut self, address: &Address, tx: Transaction) -> Result<Transaction> {
        self.unlock(None).await?;
        let hd_path = self.device_path_for(address).await?;

        let mut tx = tx;
        tx.signature = None;
        let payload = self
            .transport
            .request(
                actions::SIGN_TRANSACTION,
                json!({ "tx": hex::encode(tx.signing_payload()), "hdPath": hd_path }),
            )
            .await?;
        let reply: SignatureReply = parse_reply(payload, actions::SIGN_TRANSACTION)?;

        tx.apply_device_signature(&format!("{:x}", reply.v()?), &reply.r, &reply.s)?;
        tx.verify_signature(address)?;
        debug!("Device signed transaction for {}", address);
        Ok(tx)
    }

    async fn sign_message(&mut self, _address: &Address, _data: &str) -> Result<String> {
        Err(Error::Unsupported(NOT_SUPPORTED.to_string()))
    }

    async fn sign_personal_message(&mut self, address: &Address, data: &str) -> Result<String> {
        self.unlock(None).await?;
        let hd_path = self.device_path_for(address).await?;

        let message = message_bytes(data);
        let payload = self
            .transport
            .request(
                actions::SIGN_PERSONAL_MESSAGE,
                json!({ "hdPath": hd_path, "message": hex::encode(&message) }),
            )
            .await?;
        let reply: SignatureReply = parse_reply(payload, actions::SIGN_PERSONAL_MESSAGE)?;

        let v = u8::try_from(reply.v()?)
            .map_err(|_| Error::Device(format!("Malformed v in device reply: {}", reply.v)))?;
        let mut rsv = Vec::with_capacity(65);
        rsv.extend_from_slice(&decode_hex_fixed::<32>(&reply.r)?);
        rsv.extend_from_slice(&decode_hex_fixed::<32>(&reply.s)?);
        rsv.push(v);
        let signature = RecoverableSignature::from_rsv(&rsv)?;

        let signer = signature.recover(&personal_message_hash(&message))?;
        if signer != *address {
            return Err(Error::SignatureVerification(format!(
                "Message signed by {signer}, expected {address}"
            )));
        }
        Ok(signature.to_rsv_hex())
    }

    async fn sign_typed_data(&mut self, _address: &Address, _data: &[TypedField]) -> Result<String> {
        Err(Error::Unsupported(NOT_SUPPORTED.to_string()))
    }

    async fn export_account(&self, _address: &Address) -> Result<Zeroizing<String>> {
        Err(Error::Unsupported(NOT_SUPPORTED.to_string()))
    }

    async fn remove_account(&mut self, address: &Address) -> Result<()> {
        let position = self
            .accounts
            .iter()
            .position(|account| account == address)
            .ok_or_else(|| Error::AccountNotFound(format!("Address {address} not found in this keyring")))?;
        self.accounts.remove(position);
        self.paths.remove(address);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Registry factory producing hardware sources bound to one transport
pub fn ledger_factory(
    transport: Arc<dyn DeviceTransport>,
    activity: Arc<dyn ActivityChecker>,
    settings: LedgerSettings,
) -> SourceFactory {
    Arc::new(move || {
        Box::new(LedgerKeySource::new(transport.clone(), activity.clone(), &settings)) as Box<dyn KeySource>
    })
}
