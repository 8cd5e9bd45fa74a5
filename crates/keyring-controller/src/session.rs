//! Session state and its public projection

use keyring_core::{Address, Error, KeySource, Result, SourceKind};
use serde::Serialize;
use std::fmt;
use zeroize::Zeroizing;

/// Handle of an active key source, stable while the vault stays unlocked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct SourceId(pub(crate) u64);

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

pub(crate) struct ActiveSource {
    pub(crate) id: SourceId,
    pub(crate) source: Box<dyn KeySource>,
}

/// Secrets and sources exist only while unlocked
pub(crate) struct UnlockedSession {
    pub(crate) password: Zeroizing<String>,
    pub(crate) sources: Vec<ActiveSource>,
}

impl UnlockedSession {
    pub(crate) fn new(password: &str) -> Self {
        Self {
            password: Zeroizing::new(password.to_string()),
            sources: Vec::new(),
        }
    }

    /// Index of the first source owning `address`
    pub(crate) async fn owner_index(&self, address: &Address) -> Result<usize> {
        for (index, active) in self.sources.iter().enumerate() {
            if active.source.accounts().await?.contains(address) {
                return Ok(index);
            }
        }
        Err(Error::AccountNotFound(format!(
            "No keyring found for the requested account {address}"
        )))
    }

    pub(crate) fn position(&self, id: SourceId) -> Result<usize> {
        self.sources
            .iter()
            .position(|active| active.id == id)
            .ok_or_else(|| Error::SourceNotFound(format!("No active source {id}")))
    }

    /// Every account, in source order then per-source order
    pub(crate) async fn all_accounts(&self) -> Result<Vec<Address>> {
        let mut accounts = Vec::new();
        for active in &self.sources {
            accounts.extend(active.source.accounts().await?);
        }
        Ok(accounts)
    }
}

pub(crate) enum Session {
    Locked,
    Unlocked(UnlockedSession),
}

impl Session {
    pub(crate) fn unlocked(&self) -> Result<&UnlockedSession> {
        match self {
            Session::Unlocked(session) => Ok(session),
            Session::Locked => Err(Error::Locked("Unlock the keyring first".to_string())),
        }
    }

    pub(crate) fn unlocked_mut(&mut self) -> Result<&mut UnlockedSession> {
        match self {
            Session::Unlocked(session) => Ok(session),
            Session::Locked => Err(Error::Locked("Unlock the keyring first".to_string())),
        }
    }
}

/// Accounts of one active source
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyringSummary {
    /// Source handle
    pub id: SourceId,
    /// Source kind
    #[serde(rename = "type")]
    pub kind: SourceKind,
    /// Accounts in source order
    pub accounts: Vec<Address>,
}

/// Non-secret view of the controller for observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyringSnapshot {
    /// Whether the vault is unlocked
    pub is_unlocked: bool,
    /// Source kinds that can be created
    pub keyring_types: Vec<SourceKind>,
    /// Active sources in order
    pub keyrings: Vec<KeyringSummary>,
}

impl KeyringSnapshot {
    /// All accounts across sources
    pub fn accounts(&self) -> impl Iterator<Item = &Address> {
        self.keyrings.iter().flat_map(|keyring| keyring.accounts.iter())
    }
}

/// Change notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyringEvent {
    /// A new vault was created; carries its first account
    NewVault(Address),
    /// An account was added
    NewAccount(Address),
    /// An account was removed
    RemovedAccount(Address),
}
