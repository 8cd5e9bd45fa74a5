//! Simple key source: a flat list of independent private keys.

use crate::address::Address;
use crate::keys::PrivateKey;
use crate::message::{message_bytes, personal_message_hash, raw_digest, typed_data_hash, TypedField};
use crate::source::{KeySource, SourceKind};
use crate::transaction::Transaction;
use crate::{Error, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::collections::HashSet;
use zeroize::Zeroizing;

/// Source of imported or randomly generated keys
#[derive(Default)]
pub struct SimpleKeySource {
    keys: Vec<PrivateKey>,
}

impl SimpleKeySource {
    /// Create an empty source
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a source from hex private keys
    pub fn from_private_keys<S: AsRef<str>>(keys: &[S]) -> Result<Self> {
        let keys = keys
            .iter()
            .map(|key| PrivateKey::from_hex(key.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        ensure_unique(&keys)?;
        Ok(Self { keys })
    }

    fn key_for(&self, address: &Address) -> Result<&PrivateKey> {
        self.keys
            .iter()
            .find(|key| &key.address() == address)
            .ok_or_else(|| {
                Error::AccountNotFound(format!("Simple Keyring - Unable to find matching address {address}"))
            })
    }
}

fn ensure_unique(keys: &[PrivateKey]) -> Result<()> {
    let mut seen = HashSet::with_capacity(keys.len());
    for key in keys {
        let address = key.address();
        if !seen.insert(address) {
            return Err(Error::DuplicateAccount(format!(
                "The account you're trying to import is a duplicate: {address}"
            )));
        }
    }
    Ok(())
}

#[async_trait]
impl KeySource for SimpleKeySource {
    fn kind(&self) -> SourceKind {
        SourceKind::Simple
    }

    async fn serialize(&self) -> Result<Value> {
        let keys: Vec<Value> = self
            .keys
            .iter()
            .map(|key| Value::String(key.to_hex().to_string()))
            .collect();
        Ok(Value::Array(keys))
    }

    async fn deserialize(&mut self, data: Value) -> Result<()> {
        let keys = match data {
            Value::Null => Vec::new(),
            Value::Array(entries) => entries
                .iter()
                .map(|entry| {
                    entry
                        .as_str()
                        .ok_or_else(|| Error::InvalidKey("Private key must be a hex string".to_string()))
                        .and_then(PrivateKey::from_hex)
                })
                .collect::<Result<Vec<_>>>()?,
            other => {
                return Err(Error::InvalidKey(format!(
                    "Expected an array of private keys, got {other}"
                )))
            }
        };
        ensure_unique(&keys)?;
        self.keys = keys;
        Ok(())
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.keys.iter().map(PrivateKey::address).collect())
    }

    async fn add_accounts(&mut self, n: usize) -> Result<Vec<Address>> {
        let fresh: Vec<PrivateKey> = (0..n).map(|_| PrivateKey::generate()).collect();
        let addresses = fresh.iter().map(PrivateKey::address).collect();
        self.keys.extend(fresh);
        tracing::debug!("Generated {} simple keys", n);
        Ok(addresses)
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

    async fn remove_account(&mut self, address: &Address) -> Result<()> {
        let before = self.keys.len();
        self.keys.retain(|key| &key.address() != address);
        if self.keys.len() == before {
            return Err(Error::AccountNotFound(format!(
                "Address {address} not found in this keyring"
            )));
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
