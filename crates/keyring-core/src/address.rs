//! Account addresses and normalization
//!
//! An [`Address`] is the sole key for account equality and lookup. Parsing
//! accepts any hex casing with or without the `0x` prefix, so two inputs that
//! differ only in prefix or checksum casing normalize to the same address.

use crate::encoding::strip_hex_prefix;
use crate::keys::keccak256;
use crate::{Error, Result};
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Address length in bytes
pub const ADDRESS_LENGTH: usize = 20;

/// A 20-byte account address
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_LENGTH]);

impl Address {
    /// Create from raw bytes
    pub const fn from_bytes(bytes: [u8; ADDRESS_LENGTH]) -> Self {
        Self(bytes)
    }

    /// Raw bytes
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LENGTH] {
        &self.0
    }

    /// Parse a hex address, with or without prefix, in any casing
    pub fn parse(value: &str) -> Result<Self> {
        let stripped = strip_hex_prefix(value.trim());
        if stripped.len() != ADDRESS_LENGTH * 2 {
            return Err(Error::InvalidAddress(format!(
                "'{value}' must be {} hex characters",
                ADDRESS_LENGTH * 2
            )));
        }

        let mut bytes = [0u8; ADDRESS_LENGTH];
        hex::decode_to_slice(stripped, &mut bytes)
            .map_err(|e| Error::InvalidAddress(format!("'{value}': {e}")))?;
        Ok(Self(bytes))
    }

    /// Derive the address of a secp256k1 public key
    ///
    /// keccak256 of the uncompressed point without its `0x04` tag; last 20 bytes.
    pub fn from_public_key(key: &VerifyingKey) -> Self {
        let point = k256::PublicKey::from(key).to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        let mut bytes = [0u8; ADDRESS_LENGTH];
        bytes.copy_from_slice(&hash[12..]);
        Self(bytes)
    }

    /// Lowercase `0x`-prefixed form
    pub fn to_lower_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    /// Mixed-case checksummed `0x`-prefixed form (EIP-55)
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());

        let mut out = String::with_capacity(2 + lower.len());
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = (hash[i / 2] >> (if i % 2 == 0 { 4 } else { 0 })) & 0x0f;
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

/// Normalize an address string to its canonical form
pub fn normalize(value: &str) -> Result<Address> {
    Address::parse(value)
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_checksum())
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.to_checksum())
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_checksum())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checksum_vectors() {
        // EIP-55 reference vectors
        for expected in [
            "0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed",
            "0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359",
            "0xdbF03B407c01E7cD3CBea99509d93f8DDDC8C6FB",
            "0xD1220A0cf47c7B9Be7A2E6BA89F429762e7b9aDb",
        ] {
            let address = Address::parse(&expected.to_lowercase()).unwrap();
            assert_eq!(address.to_checksum(), expected);
        }
    }

    #[test]
    fn test_prefix_and_case_insensitive() {
        let a = normalize("0x5aAeb6053F3E94C9b9A09f33669435E7Ef1BeAed").unwrap();
        let b = normalize("5aaeb6053f3e94c9b9a09f33669435e7ef1beaed").unwrap();
        assert_eq!(a, b);
        assert_eq!(b.to_lower_hex(), "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed");
    }

    #[test]
    fn test_invalid_addresses() {
        assert!(matches!(Address::parse("0x1234"), Err(Error::InvalidAddress(_))));
        assert!(matches!(
            Address::parse("0xzzAeb6053F3E94C9b9A09f33669435E7Ef1BeAed"),
            Err(Error::InvalidAddress(_))
        ));
    }

    #[test]
    fn test_serde_uses_checksum() {
        let address = normalize("0xfb6916095ca1df60bb79ce92ce3ea74c37c5d359").unwrap();
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, "\"0xfB6916095ca1df60bB79Ce92cE3Ea74c37c5d359\"");
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, address);
    }
}
