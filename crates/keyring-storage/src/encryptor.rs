//! Vault encryption collaborator
//!
//! The vault is the JSON array of serialized key sources, sealed under a key
//! derived from the password. The stored blob is a small JSON envelope:
//!
//! ```json
//! {"version":1,"cipher":"chacha20-poly1305","kdf":{...},"salt":"<b64>","data":"<b64>"}
//! ```
//!
//! KDF parameters travel with the blob so older vaults stay readable when
//! the defaults change.

use crate::security::{generate_salt, KdfParams, VaultCipher, VaultKey};
use crate::{Error, Result};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use keyring_core::SerializedSource;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Envelope format version
pub const VAULT_FORMAT_VERSION: u32 = 1;

/// Encrypts and decrypts the serialized source list
#[async_trait]
pub trait Encryptor: Send + Sync {
    /// Seal `records` under `password`
    async fn encrypt(&self, password: &str, records: &[SerializedSource]) -> Result<String>;

    /// Open a vault; every failure is reported as [`Error::Decryption`]
    async fn decrypt(&self, password: &str, vault: &str) -> Result<Vec<SerializedSource>>;
}

#[derive(Debug, Serialize, Deserialize)]
struct VaultEnvelope {
    version: u32,
    cipher: VaultCipher,
    kdf: KdfParams,
    salt: String,
    data: String,
}

/// Argon2id + AEAD encryptor
#[derive(Debug, Clone, Default)]
pub struct PasswordEncryptor {
    params: KdfParams,
    cipher: VaultCipher,
}

impl PasswordEncryptor {
    /// Encryptor with default KDF cost and cipher
    pub fn new() -> Self {
        Self::default()
    }

    /// Encryptor with explicit KDF cost and cipher
    pub fn with_params(params: KdfParams, cipher: VaultCipher) -> Self {
        Self { params, cipher }
    }

    /// KDF parameters used for new vaults
    pub fn params(&self) -> &KdfParams {
        &self.params
    }
}

fn seal_records(
    password: &str,
    records: &[SerializedSource],
    params: KdfParams,
    cipher: VaultCipher,
) -> Result<String> {
    let plaintext = Zeroizing::new(serde_json::to_vec(records)?);
    let salt = generate_salt();
    let key = VaultKey::derive(password, &salt, &params, cipher)?;
    let sealed = key.seal(&plaintext)?;

    let envelope = VaultEnvelope {
        version: VAULT_FORMAT_VERSION,
        cipher,
        kdf: params,
        salt: BASE64.encode(salt),
        data: BASE64.encode(sealed),
    };
    Ok(serde_json::to_string(&envelope)?)
}

fn open_records(password: &str, vault: &str) -> Result<Vec<SerializedSource>> {
    let envelope: VaultEnvelope = serde_json::from_str(vault)
        .map_err(|e| Error::Decryption(format!("Malformed vault: {e}")))?;
    if envelope.version != VAULT_FORMAT_VERSION {
        return Err(Error::Decryption(format!(
            "Unsupported vault version {}",
            envelope.version
        )));
    }

    let salt = BASE64
        .decode(&envelope.salt)
        .map_err(|e| Error::Decryption(format!("Malformed salt: {e}")))?;
    let sealed = BASE64
        .decode(&envelope.data)
        .map_err(|e| Error::Decryption(format!("Malformed payload: {e}")))?;

    let key = VaultKey::derive(password, &salt, &envelope.kdf, envelope.cipher)
        .map_err(|e| Error::Decryption(e.to_string()))?;
    let plaintext = key.open(&sealed)?;

    serde_json::from_slice(&plaintext).map_err(|e| Error::Decryption(format!("Malformed records: {e}")))
}

#[async_trait]
impl Encryptor for PasswordEncryptor {
    async fn encrypt(&self, password: &str, records: &[SerializedSource]) -> Result<String> {
        let password = Zeroizing::new(password.to_string());
        let records = records.to_vec();
        let (params, cipher) = (self.params, self.cipher);

        tokio::task::spawn_blocking(move || seal_records(&password, &records, params, cipher))
            .await
            .map_err(|e| Error::Encryption(format!("Encryption task failed: {e}")))?
    }

    async fn decrypt(&self, password: &str, vault: &str) -> Result<Vec<SerializedSource>> {
        let password = Zeroizing::new(password.to_string());
        let vault = vault.to_string();

        tokio::task::spawn_blocking(move || open_records(&password, &vault))
            .await
            .map_err(|e| Error::Decryption(format!("Decryption task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn light() -> PasswordEncryptor {
        PasswordEncryptor::with_params(
            KdfParams {
                memory_kib: 256,
                iterations: 1,
                parallelism: 1,
            },
            VaultCipher::ChaCha20Poly1305,
        )
    }

    fn records() -> Vec<SerializedSource> {
        vec![SerializedSource {
            kind: "HD Key Tree".to_string(),
            data: json!({ "numberOfAccounts": 1 }),
        }]
    }

    #[tokio::test]
    async fn test_round_trip() {
        let encryptor = light();
        let vault = encryptor.encrypt("hunter2", &records()).await.unwrap();
        assert!(!vault.contains("numberOfAccounts"));

        let opened = encryptor.decrypt("hunter2", &vault).await.unwrap();
        assert_eq!(opened, records());
    }

    #[tokio::test]
    async fn test_wrong_password() {
        let encryptor = light();
        let vault = encryptor.encrypt("hunter2", &records()).await.unwrap();
        assert!(matches!(
            encryptor.decrypt("hunter3", &vault).await,
            Err(Error::Decryption(_))
        ));
    }

    #[tokio::test]
    async fn test_corrupt_vaults() {
        let encryptor = light();
        for vault in ["", "{}", "not json", r#"{"version":2}"#] {
            assert!(matches!(
                encryptor.decrypt("hunter2", vault).await,
                Err(Error::Decryption(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_params_travel_with_vault() {
        let vault = light().encrypt("hunter2", &records()).await.unwrap();
        let strict = PasswordEncryptor::with_params(KdfParams::default(), VaultCipher::Aes256Gcm);

        let envelope: serde_json::Value = serde_json::from_str(&vault).unwrap();
        assert_eq!(envelope["kdf"]["memoryKib"], 256);
        assert_eq!(envelope["cipher"], "chacha20-poly1305");
        assert_eq!(strict.params().memory_kib, 65536);
        assert_eq!(strict.decrypt("hunter2", &vault).await.unwrap(), records());
    }
}
