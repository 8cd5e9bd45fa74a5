//! HD-Tree key source
//!
//! All accounts derive from one BIP-39 mnemonic at `{hdPath}/{index}`.
//! Serialized state is `{mnemonic, numberOfAccounts, hdPath}`; the derived
//! keys themselves are never persisted.

use crate::address::Address;
use crate::keys::{derive_private_child, derive_xprv, generate_mnemonic, parse_mnemonic, seed_from_mnemonic, PrivateKey};
use crate::message::{message_bytes, personal_message_hash, raw_digest, typed_data_hash, TypedField};
use crate::source::{KeySource, SourceKind};
use crate::transaction::Transaction;
use crate::{Error, Result};
use async_trait::async_trait;
use bip32::XPrv;
use keyring_params::HD_TREE_DEFAULT_PATH;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use zeroize::Zeroizing;

#[derive(Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct HdState {
    mnemonic: Option<String>,
    number_of_accounts: usize,
    hd_path: Option<String>,
}

/// Mnemonic-derived key source
pub struct HdKeySource {
    mnemonic: Option<Zeroizing<String>>,
    hd_path: String,
    root: Option<XPrv>,
    keys: Vec<PrivateKey>,
}

impl Default for HdKeySource {
    fn default() -> Self {
        Self {
            mnemonic: None,
            hd_path: HD_TREE_DEFAULT_PATH.to_string(),
            root: None,
            keys: Vec::new(),
        }
    }
}

impl HdKeySource {
    /// Create an empty source; a mnemonic is generated on first use
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore from a mnemonic with `accounts` derived accounts
    pub fn from_mnemonic(phrase: &str, accounts: usize) -> Result<Self> {
        let mut source = Self::new();
        source.init_from_mnemonic(phrase)?;
        source.derive_accounts(accounts)?;
        Ok(source)
    }

    /// Seed phrase backing this source
    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref().map(String::as_str)
    }

    /// Base derivation path
    pub fn hd_path(&self) -> &str {
        &self.hd_path
    }

    fn init_from_mnemonic(&mut self, phrase: &str) -> Result<()> {
        let normalized = Zeroizing::new(parse_mnemonic(phrase)?.to_string());
        let seed = seed_from_mnemonic(&normalized)?;
        self.root = Some(derive_xprv(&seed[..], &self.hd_path)?);
        self.mnemonic = Some(normalized);
        self.keys.clear();
        Ok(())
    }

    fn derive_accounts(&mut self, n: usize) -> Result<Vec<Address>> {
        if self.root.is_none() {
            let phrase = generate_mnemonic(None)?;
            self.init_from_mnemonic(&phrase)?;
            tracing::info!("Generated new mnemonic for HD key tree");
        }
        let root = self
            .root
            .as_ref()
            .ok_or_else(|| Error::KeyDerivation("HD key tree is not initialized".to_string()))?;

        let start = self.keys.len();
        let mut fresh = Vec::with_capacity(n);
        for index in start..start + n {
            let index = u32::try_from(index)
                .map_err(|_| Error::KeyDerivation(format!("Account index {index} out of range")))?;
            fresh.push(PrivateKey::from_xprv(&derive_private_child(root, index)?));
        }

        let addresses = fresh.iter().map(PrivateKey::address).collect();
        self.keys.extend(fresh);
        Ok(addresses)
    }

    fn key_for(&self, address: &Address) -> Result<&PrivateKey> {
        self.keys
            .iter()
            .find(|key| &key.address() == address)
            .ok_or_else(|| Error::AccountNotFound(format!("HD Key Tree - Unknown address {address}")))
    }
}

#[async_trait]
impl KeySource for HdKeySource {
    fn kind(&self) -> SourceKind {
        SourceKind::HdTree
    }

    async fn serialize(&self) -> Result<Value> {
        let state = HdState {
            mnemonic: self.mnemonic.as_ref().map(|m| m.to_string()),
            number_of_accounts: self.keys.len(),
            hd_path: Some(self.hd_path.clone()),
        };
        Ok(serde_json::to_value(state)?)
    }

    async fn deserialize(&mut self, data: Value) -> Result<()> {
        let state: HdState = if data.is_null() {
            HdState::default()
        } else {
            serde_json::from_value(data)?
        };

        *self = Self {
            hd_path: state.hd_path.unwrap_or_else(|| HD_TREE_DEFAULT_PATH.to_string()),
            ..Self::default()
        };

        if let Some(phrase) = state.mnemonic.map(Zeroizing::new) {
            self.init_from_mnemonic(&phrase)?;
        }
        if state.number_of_accounts > 0 {
            self.derive_accounts(state.number_of_accounts)?;
        }
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.keys.iter().map(PrivateKey::address).collect())
    }

    async fn add_accounts(&mut self, n: usize) -> Result<Vec<Address>> {
        let added = self.derive_accounts(n)?;
        tracing::debug!("Derived {} HD accounts ({} total)", added.len(), self.keys.len());
        Ok(added)
    }

    async fn sign_transaction(&mut self, address: &Address, mut tx: Transaction) -> Result<Transaction> {
        tx.sign(self.key_for(address)?)?;
        Ok(tx)
    }

    async fn sign_message(&mut self, address: &Address, data: &str) -> Result<String> {
        let digest = raw_digest(data)?;
        Ok(self.key_for(address)?.sign_prehash(&digest)?.to_rsv_hex())
    }

    async fn sign_personal_message(&mut self, address: &Address, data: &str) -> Result<String> {
        let digest = personal_message_hash(&message_bytes(data));
        Ok(self.key_for(address)?.sign_prehash(&digest)?.to_rsv_hex())
    }

    async fn sign_typed_data(&mut self, address: &Address, data: &[TypedField]) -> Result<String> {
        let digest = typed_data_hash(data)?;
        Ok(self.key_for(address)?.sign_prehash(&digest)?.to_rsv_hex())
    }

    async fn export_account(&self, address: &Address) -> Result<Zeroizing<String>> {
        Ok(self.key_for(address)?.to_hex())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
