//! Key source capability contract
//!
//! A key source owns one or more accounts and signs on their behalf. The
//! controller holds sources as `Box<dyn KeySource>` and resolves accounts to
//! them; concrete variants are recovered through [`KeySource::as_any_mut`]
//! when a caller needs variant-specific controls (hardware pagination).

use crate::address::Address;
use crate::message::TypedField;
use crate::transaction::Transaction;
use crate::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use zeroize::Zeroizing;

/// Registered key source variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    /// Independent random private keys
    Simple,
    /// Mnemonic-derived hierarchical keys
    HdTree,
    /// External signing device reached through a bridge
    Hardware,
}

impl SourceKind {
    /// Vault tag of this kind
    pub const fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Simple => "Simple Key Pair",
            SourceKind::HdTree => "HD Key Tree",
            SourceKind::Hardware => "Ledger Hardware",
        }
    }

    /// All known kinds
    pub const ALL: [SourceKind; 3] = [SourceKind::Simple, SourceKind::HdTree, SourceKind::Hardware];
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        SourceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| Error::UnknownSourceKind(s.to_string()))
    }
}

impl Serialize for SourceKind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SourceKind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// One vault record: a source tag and its opaque serialized state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedSource {
    /// Source kind tag; unknown tags are rejected when the vault is opened
    #[serde(rename = "type")]
    pub kind: String,
    /// Variant-specific state
    pub data: Value,
}

/// Key source trait
#[async_trait]
pub trait KeySource: Send + Sync + 'static {
    /// Variant of this source
    fn kind(&self) -> SourceKind;

    /// Opaque serialized state for the vault
    async fn serialize(&self) -> Result<Value>;

    /// Restore state produced by [`KeySource::serialize`]
    async fn deserialize(&mut self, data: Value) -> Result<()>;

    /// Accounts in creation order
    async fn accounts(&self) -> Result<Vec<Address>>;

    /// Create `n` new accounts, returning only the new ones
    async fn add_accounts(&mut self, n: usize) -> Result<Vec<Address>>;

    /// Sign a transaction for `address`
    async fn sign_transaction(&mut self, address: &Address, tx: Transaction) -> Result<Transaction>;

    /// Sign a raw 32-byte digest (`eth_sign`)
    async fn sign_message(&mut self, address: &Address, data: &str) -> Result<String>;

    /// Sign a prefixed personal message
    async fn sign_personal_message(&mut self, address: &Address, data: &str) -> Result<String>;

    /// Sign legacy typed data
    async fn sign_typed_data(&mut self, address: &Address, data: &[TypedField]) -> Result<String>;

    /// Export the private key of `address` as hex
    async fn export_account(&self, address: &Address) -> Result<Zeroizing<String>>;

    /// Remove `address`; sources without removal keep this default
    async fn remove_account(&mut self, address: &Address) -> Result<()> {
        Err(Error::Unsupported(format!(
            "{} does not support removing {address}",
            self.kind()
        )))
    }

    /// Downcast support
    fn as_any(&self) -> &dyn Any;

    /// Mutable downcast support
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl fmt::Debug for dyn KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeySource").field("kind", &self.kind()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_tags() {
        for kind in SourceKind::ALL {
            assert_eq!(kind.as_str().parse::<SourceKind>().unwrap(), kind);
        }
        assert!(matches!(
            "Trezor Hardware".parse::<SourceKind>(),
            Err(Error::UnknownSourceKind(_))
        ));
    }

    #[test]
    fn test_serialized_source_shape() {
        let record = SerializedSource {
            kind: SourceKind::Simple.to_string(),
            data: serde_json::json!(["00"]),
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["type"], "Simple Key Pair");
    }
}
