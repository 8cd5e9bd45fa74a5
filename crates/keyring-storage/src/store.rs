//! Vault persistence
//!
//! A store holds exactly one encrypted vault blob, read at unlock and
//! overwritten in full on every mutation.

use crate::Result;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Single-slot persistence for the encrypted vault
#[async_trait]
pub trait VaultStore: Send + Sync {
    /// Current vault, if one was ever written
    async fn load(&self) -> Result<Option<String>>;

    /// Replace the vault
    async fn save(&self, vault: &str) -> Result<()>;
}

/// In-memory vault slot
#[derive(Debug, Default)]
pub struct MemoryVaultStore {
    vault: RwLock<Option<String>>,
}

impl MemoryVaultStore {
    /// Empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store seeded with an existing vault
    pub fn with_vault(vault: impl Into<String>) -> Self {
        Self {
            vault: RwLock::new(Some(vault.into())),
        }
    }
}

#[async_trait]
impl VaultStore for MemoryVaultStore {
    async fn load(&self) -> Result<Option<String>> {
        Ok(self.vault.read().clone())
    }

    async fn save(&self, vault: &str) -> Result<()> {
        *self.vault.write() = Some(vault.to_string());
        Ok(())
    }
}

/// Vault kept in a single file, replaced atomically on save
#[derive(Debug, Clone)]
pub struct FileVaultStore {
    path: PathBuf,
}

impl FileVaultStore {
    /// Store backed by `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Vault file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl VaultStore for FileVaultStore {
    async fn load(&self) -> Result<Option<String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(vault) if vault.trim().is_empty() => Ok(None),
            Ok(vault) => Ok(Some(vault)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, vault: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let staging = self.staging_path();
        tokio::fs::write(&staging, vault).await?;
        tokio::fs::rename(&staging, &self.path).await?;
        debug!("Vault written to {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryVaultStore::new();
        assert!(store.load().await.unwrap().is_none());

        store.save("first").await.unwrap();
        store.save("second").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("second"));

        let seeded = MemoryVaultStore::with_vault("blob");
        assert_eq!(seeded.load().await.unwrap().as_deref(), Some("blob"));
    }

    #[tokio::test]
    async fn test_file_store_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileVaultStore::new(dir.path().join("nested").join("vault.json"));
        assert!(store.load().await.unwrap().is_none());

        store.save("first").await.unwrap();
        store.save("second").await.unwrap();
        assert_eq!(store.load().await.unwrap().as_deref(), Some("second"));
        assert!(!dir.path().join("nested").join("vault.json.tmp").exists());
    }
}
