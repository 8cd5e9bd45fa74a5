//! Security and encryption primitives
//!
//! Implements AES-GCM and ChaCha20-Poly1305 sealing of the vault payload,
//! Argon2id for password derivation, and key zeroization.

use crate::{Error, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::{Argon2, ParamsBuilder, Version};
use chacha20poly1305::ChaCha20Poly1305;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

/// Current sealed payload version
pub const SEAL_VERSION: u8 = 1;

const NONCE_LEN: usize = 12;
const HEADER_LEN: usize = 2 + NONCE_LEN;

/// Minimum salt length accepted by the KDF
pub const MIN_SALT_LEN: usize = 16;

/// AEAD used to seal the vault
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum VaultCipher {
    /// AES-256-GCM
    #[serde(rename = "aes-256-gcm")]
    Aes256Gcm,
    /// ChaCha20-Poly1305
    #[default]
    #[serde(rename = "chacha20-poly1305")]
    ChaCha20Poly1305,
}

impl VaultCipher {
    fn tag(&self) -> u8 {
        match self {
            VaultCipher::Aes256Gcm => 0,
            VaultCipher::ChaCha20Poly1305 => 1,
        }
    }
}

/// Argon2id cost parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KdfParams {
    /// Memory cost in KiB
    pub memory_kib: u32,
    /// Number of passes
    pub iterations: u32,
    /// Degree of parallelism
    pub parallelism: u32,
}

impl Default for KdfParams {
    /// Memory: 64 MiB (65536 KiB), Iterations: 3, Parallelism: 4
    fn default() -> Self {
        Self {
            memory_kib: 65536,
            iterations: 3,
            parallelism: 4,
        }
    }
}

/// Symmetric key derived from the vault password
#[derive(Clone)]
pub struct VaultKey {
    key: Zeroizing<[u8; 32]>,
    cipher: VaultCipher,
}

impl VaultKey {
    /// Generate new random key
    pub fn generate(cipher: VaultCipher) -> Self {
        let mut key = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut key[..]);
        Self { key, cipher }
    }

    /// Create from bytes
    pub fn from_bytes(bytes: &[u8], cipher: VaultCipher) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(Error::Encryption("Invalid key length".to_string()));
        }

        let mut key = Zeroizing::new([0u8; 32]);
        key.copy_from_slice(bytes);
        Ok(Self { key, cipher })
    }

    /// Derive from a password and salt with Argon2id
    pub fn derive(password: &str, salt: &[u8], params: &KdfParams, cipher: VaultCipher) -> Result<Self> {
        let key = derive_key_bytes(password, salt, params)?;
        Ok(Self { key, cipher })
    }

    /// Cipher this key seals with
    pub fn cipher(&self) -> VaultCipher {
        self.cipher
    }

    /// Seal plaintext.
    ///
    /// Format: `[version(1)][cipher(1)][nonce(12)][ciphertext]`
    pub fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);

        let ciphertext = match self.cipher {
            VaultCipher::Aes256Gcm => Aes256Gcm::new(self.key.as_ref().into())
                .encrypt(Nonce::from_slice(&nonce_bytes), plaintext),
            VaultCipher::ChaCha20Poly1305 => ChaCha20Poly1305::new(self.key.as_ref().into())
                .encrypt(chacha20poly1305::Nonce::from_slice(&nonce_bytes), plaintext),
        }
        .map_err(|e| Error::Encryption(e.to_string()))?;

        let mut result = Vec::with_capacity(HEADER_LEN + ciphertext.len());
        result.push(SEAL_VERSION);
        result.push(self.cipher.tag());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    /// Open a payload produced by [`VaultKey::seal`]
    pub fn open(&self, data: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if data.len() < HEADER_LEN {
            return Err(Error::Decryption("Invalid ciphertext length".to_string()));
        }

        let version = data[0];
        if version != SEAL_VERSION {
            return Err(Error::Decryption(format!("Unsupported encryption version: {}", version)));
        }

        let tag = data[1];
        if tag != self.cipher.tag() {
            return Err(Error::Decryption(format!(
                "Cipher mismatch: expected {}, got {}",
                self.cipher.tag(),
                tag
            )));
        }

        let nonce = &data[2..HEADER_LEN];
        let ciphertext = &data[HEADER_LEN..];
        let plaintext = match self.cipher {
            VaultCipher::Aes256Gcm => Aes256Gcm::new(self.key.as_ref().into())
                .decrypt(Nonce::from_slice(nonce), ciphertext),
            VaultCipher::ChaCha20Poly1305 => ChaCha20Poly1305::new(self.key.as_ref().into())
                .decrypt(chacha20poly1305::Nonce::from_slice(nonce), ciphertext),
        }
        .map_err(|e| Error::Decryption(e.to_string()))?;

        Ok(Zeroizing::new(plaintext))
    }
}

/// Derive raw key bytes from a password using Argon2id.
pub fn derive_key_bytes(password: &str, salt: &[u8], params: &KdfParams) -> Result<Zeroizing<[u8; 32]>> {
    if salt.len() < MIN_SALT_LEN {
        return Err(Error::Encryption("Salt too short".to_string()));
    }

    let params = ParamsBuilder::new()
        .m_cost(params.memory_kib)
        .t_cost(params.iterations)
        .p_cost(params.parallelism)
        .output_len(32)
        .build()
        .map_err(|e| Error::Encryption(e.to_string()))?;

    let argon2 = Argon2::new(argon2::Algorithm::Argon2id, Version::V0x13, params);

    let mut key = Zeroizing::new([0u8; 32]);
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key[..])
        .map_err(|e| Error::Encryption(e.to_string()))?;
    Ok(key)
}

/// Generate secure random salt
pub fn generate_salt() -> [u8; 32] {
    let mut salt = [0u8; 32];
    OsRng.fill_bytes(&mut salt);
    salt
}
