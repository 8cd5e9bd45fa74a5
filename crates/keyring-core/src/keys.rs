//! Key derivation and management
//!
//! BIP-39 mnemonics, BIP-32/BIP-44 derivation over secp256k1, and
//! recoverable ECDSA signatures over keccak256 digests.

use crate::address::Address;
use crate::encoding::{decode_hex, strip_hex_prefix};
use crate::{Error, Result};
use bip32::{ChildNumber, DerivationPath, ExtendedKey, ExtendedKeyAttrs, Prefix, XPrv, XPub};
use bip39::{Language, Mnemonic};
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use k256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use sha3::{Digest, Keccak256};
use zeroize::Zeroizing;

/// keccak256 digest
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Generate new random mnemonic
///
/// # Arguments
/// * `word_count` - Number of words in mnemonic (12, 18, or 24). Defaults to 12.
pub fn generate_mnemonic(word_count: Option<u32>) -> Result<Zeroizing<String>> {
    // 12 words = 16 bytes, 18 words = 24 bytes, 24 words = 32 bytes
    let entropy_size = match word_count.unwrap_or(12) {
        18 => 24,
        24 => 32,
        _ => 16,
    };

    let mut entropy = Zeroizing::new(vec![0u8; entropy_size]);
    use rand::RngCore;
    OsRng.fill_bytes(&mut entropy);

    let mnemonic = Mnemonic::from_entropy(&entropy)
        .map_err(|e| Error::KeyDerivation(format!("Failed to build mnemonic: {e}")))?;
    Ok(Zeroizing::new(mnemonic.to_string()))
}

/// Parse and validate an English mnemonic (checksum + wordlist)
pub fn parse_mnemonic(phrase: &str) -> Result<Mnemonic> {
    Mnemonic::parse_in_normalized(Language::English, phrase.trim())
        .map_err(|e| Error::InvalidSeed(e.to_string()))
}

/// Check a mnemonic against the BIP-39 checksum and wordlist
pub fn validate_mnemonic(phrase: &str) -> bool {
    parse_mnemonic(phrase).is_ok()
}

/// BIP-39 seed for a mnemonic (empty passphrase in all key sources)
pub fn seed_from_mnemonic(phrase: &str) -> Result<Zeroizing<[u8; 64]>> {
    let mnemonic = parse_mnemonic(phrase)?;
    Ok(Zeroizing::new(mnemonic.to_seed("")))
}

/// Parse a derivation path such as `m/44'/60'/0'/0`
pub fn parse_path(path: &str) -> Result<DerivationPath> {
    path.parse::<DerivationPath>()
        .map_err(|e| Error::KeyDerivation(format!("Invalid derivation path '{path}': {e}")))
}

/// Derive the extended private key at `path` from a BIP-39 seed
pub fn derive_xprv(seed: &[u8], path: &str) -> Result<XPrv> {
    let path = parse_path(path)?;
    XPrv::derive_from_path(seed, &path).map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Derive the non-hardened child `index` of an extended private key
pub fn derive_private_child(parent: &XPrv, index: u32) -> Result<XPrv> {
    let child = ChildNumber::new(index, false).map_err(|e| Error::KeyDerivation(e.to_string()))?;
    parent
        .derive_child(child)
        .map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Derive the non-hardened child `index` of an extended public key
pub fn derive_public_child(parent: &XPub, index: u32) -> Result<XPub> {
    let child = ChildNumber::new(index, false).map_err(|e| Error::KeyDerivation(e.to_string()))?;
    parent
        .derive_child(child)
        .map_err(|e| Error::KeyDerivation(e.to_string()))
}

/// Rebuild an extended public key from a raw public key and chain code.
///
/// The public key may be SEC1 compressed (33 bytes) or uncompressed (65 bytes);
/// this is the shape devices report when unlocked at a path.
pub fn xpub_from_parts(public_key: &[u8], chain_code: &[u8]) -> Result<XPub> {
    let key = VerifyingKey::from_sec1_bytes(public_key)
        .map_err(|e| Error::InvalidKey(format!("Invalid public key: {e}")))?;
    let compressed = k256::PublicKey::from(&key).to_encoded_point(true);

    let mut key_bytes = [0u8; 33];
    key_bytes.copy_from_slice(compressed.as_bytes());

    if chain_code.len() != 32 {
        return Err(Error::InvalidKey(format!(
            "Chain code must be 32 bytes, got {}",
            chain_code.len()
        )));
    }
    let mut code = [0u8; 32];
    code.copy_from_slice(chain_code);

    let extended = ExtendedKey {
        prefix: Prefix::XPUB,
        attrs: ExtendedKeyAttrs {
            depth: 0,
            parent_fingerprint: [0u8; 4],
            child_number: ChildNumber(0),
            chain_code: code,
        },
        key_bytes,
    };
    XPub::try_from(extended).map_err(|e| Error::InvalidKey(e.to_string()))
}

/// Uncompressed SEC1 encoding of a public key (65 bytes, `0x04` tag)
pub fn uncompressed_public_key(key: &VerifyingKey) -> Vec<u8> {
    k256::PublicKey::from(key)
        .to_encoded_point(false)
        .as_bytes()
        .to_vec()
}

/// secp256k1 private key
pub struct PrivateKey {
    inner: SigningKey,
}

impl PrivateKey {
    /// Generate a random key
    pub fn generate() -> Self {
        Self {
            inner: SigningKey::random(&mut OsRng),
        }
    }

    /// Import from hex, with or without `0x`
    pub fn from_hex(value: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            hex::decode(strip_hex_prefix(value.trim()))
                .map_err(|e| Error::InvalidKey(format!("Invalid private key hex: {e}")))?,
        );
        Self::from_slice(&bytes)
    }

    /// Import from raw scalar bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let inner = SigningKey::from_slice(bytes)
            .map_err(|e| Error::InvalidKey(format!("Invalid private key: {e}")))?;
        Ok(Self { inner })
    }

    /// Key of a derived extended private key
    pub fn from_xprv(xprv: &XPrv) -> Self {
        Self {
            inner: xprv.private_key().clone(),
        }
    }

    /// Lowercase hex without prefix
    pub fn to_hex(&self) -> Zeroizing<String> {
        Zeroizing::new(hex::encode(self.inner.to_bytes()))
    }

    /// Public key
    pub fn verifying_key(&self) -> &VerifyingKey {
        self.inner.verifying_key()
    }

    /// Account address of this key
    pub fn address(&self) -> Address {
        Address::from_public_key(self.inner.verifying_key())
    }

    /// Sign a 32-byte digest, producing a low-S recoverable signature
    pub fn sign_prehash(&self, digest: &[u8; 32]) -> Result<RecoverableSignature> {
        let (signature, recovery_id) = self
            .inner
            .sign_prehash_recoverable(digest)
            .map_err(|e| Error::Other(format!("Signing failed: {e}")))?;
        Ok(RecoverableSignature::from_parts(&signature, recovery_id))
    }
}

impl Clone for PrivateKey {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

/// ECDSA signature with its recovery id (0 or 1)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoverableSignature {
    /// r scalar, big-endian
    pub r: [u8; 32],
    /// s scalar, big-endian
    pub s: [u8; 32],
    /// Recovery id (y parity)
    pub recovery_id: u8,
}

impl RecoverableSignature {
    fn from_parts(signature: &Signature, recovery_id: RecoveryId) -> Self {
        let bytes = signature.to_bytes();
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..]);
        Self {
            r,
            s,
            recovery_id: recovery_id.to_byte(),
        }
    }

    /// Parse a 65-byte `r || s || v` signature; `v` may be 0/1 or 27/28.
    pub fn from_rsv(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 65 {
            return Err(Error::InvalidMessage(format!(
                "Signature must be 65 bytes, got {}",
                bytes.len()
            )));
        }
        let v = bytes[64];
        let recovery_id = if v >= 27 { v - 27 } else { v };
        if recovery_id > 1 {
            return Err(Error::InvalidMessage(format!("Invalid recovery byte {v}")));
        }
        let mut r = [0u8; 32];
        let mut s = [0u8; 32];
        r.copy_from_slice(&bytes[..32]);
        s.copy_from_slice(&bytes[32..64]);
        Ok(Self { r, s, recovery_id })
    }

    /// Parse a hex `r || s || v` signature
    pub fn from_rsv_hex(value: &str) -> Result<Self> {
        Self::from_rsv(&decode_hex(value)?)
    }

    /// `r || s || (27 + recovery_id)` as `0x`-prefixed hex
    pub fn to_rsv_hex(&self) -> String {
        let mut bytes = Vec::with_capacity(65);
        bytes.extend_from_slice(&self.r);
        bytes.extend_from_slice(&self.s);
        bytes.push(27 + self.recovery_id);
        crate::encoding::to_prefixed_hex(&bytes)
    }

    /// Recover the signing address of a 32-byte digest
    pub fn recover(&self, digest: &[u8; 32]) -> Result<Address> {
        let mut bytes = [0u8; 64];
        bytes[..32].copy_from_slice(&self.r);
        bytes[32..].copy_from_slice(&self.s);
        let signature = Signature::from_slice(&bytes)
            .map_err(|e| Error::SignatureVerification(format!("Malformed signature: {e}")))?;
        let recovery_id = RecoveryId::from_byte(self.recovery_id).ok_or_else(|| {
            Error::SignatureVerification(format!("Invalid recovery id {}", self.recovery_id))
        })?;
        let key = VerifyingKey::recover_from_prehash(digest, &signature, recovery_id)
            .map_err(|e| Error::SignatureVerification(format!("Recovery failed: {e}")))?;
        Ok(Address::from_public_key(&key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ABANDON: &str =
        "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";

    #[test]
    fn test_keccak_empty() {
        assert_eq!(
            hex::encode(keccak256(b"")),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_generate_mnemonic_word_counts() {
        assert_eq!(generate_mnemonic(None).unwrap().split_whitespace().count(), 12);
        assert_eq!(generate_mnemonic(Some(24)).unwrap().split_whitespace().count(), 24);
        assert!(validate_mnemonic(&generate_mnemonic(Some(18)).unwrap()));
    }

    #[test]
    fn test_invalid_mnemonic() {
        assert!(!validate_mnemonic("abandon abandon abandon"));
        assert!(matches!(
            parse_mnemonic("abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon"),
            Err(Error::InvalidSeed(_))
        ));
    }

    #[test]
    fn test_known_derivation_vector() {
        // Well-known first account of the all-"abandon" test mnemonic
        let seed = seed_from_mnemonic(ABANDON).unwrap();
        let account = derive_xprv(&seed[..], "m/44'/60'/0'/0/0").unwrap();
        let key = PrivateKey::from_xprv(&account);
        assert_eq!(
            key.address().to_checksum(),
            "0x9858EfFD232B4033E47d90003D41EC34EcaEda94"
        );
    }

    #[test]
    fn test_public_child_matches_private_child() {
        let seed = seed_from_mnemonic(ABANDON).unwrap();
        let parent = derive_xprv(&seed[..], "m/44'/60'/0'").unwrap();
        let xpub = xpub_from_parts(
            &uncompressed_public_key(parent.public_key().public_key()),
            &parent.attrs().chain_code,
        )
        .unwrap();

        for index in [0u32, 1, 7] {
            let private = derive_private_child(&parent, index).unwrap();
            let public = derive_public_child(&xpub, index).unwrap();
            assert_eq!(
                PrivateKey::from_xprv(&private).address(),
                Address::from_public_key(public.public_key())
            );
        }
    }

    #[test]
    fn test_sign_and_recover() {
        let key = PrivateKey::generate();
        let digest = keccak256(b"custody");
        let signature = key.sign_prehash(&digest).unwrap();
        assert_eq!(signature.recover(&digest).unwrap(), key.address());

        let reparsed = RecoverableSignature::from_rsv_hex(&signature.to_rsv_hex()).unwrap();
        assert_eq!(reparsed, signature);
    }

    #[test]
    fn test_private_key_hex_roundtrip() {
        let key = PrivateKey::generate();
        let hex = key.to_hex();
        let prefixed = format!("0x{}", hex.as_str());
        assert_eq!(PrivateKey::from_hex(&prefixed).unwrap().address(), key.address());
        assert!(PrivateKey::from_hex("0x00").is_err());
    }
}
