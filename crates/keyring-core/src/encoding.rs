//! Hex helpers for `0x`-prefixed payloads.

use crate::{Error, Result};

/// Strip a leading `0x`/`0X` if present
pub fn strip_hex_prefix(value: &str) -> &str {
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value)
}

/// Add a `0x` prefix unless one is already present
pub fn add_hex_prefix(value: &str) -> String {
    format!("0x{}", strip_hex_prefix(value))
}

/// Encode bytes as lowercase `0x`-prefixed hex
pub fn to_prefixed_hex(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Decode optionally-prefixed hex; an odd digit count is left-padded with a zero.
pub fn decode_hex(value: &str) -> Result<Vec<u8>> {
    let stripped = strip_hex_prefix(value);
    let decoded = if stripped.len() % 2 == 1 {
        hex::decode(format!("0{stripped}"))
    } else {
        hex::decode(stripped)
    };
    decoded.map_err(|e| Error::Other(format!("Invalid hex '{value}': {e}")))
}

/// Decode hex into a fixed-width, left-padded array
pub fn decode_hex_fixed<const N: usize>(value: &str) -> Result<[u8; N]> {
    let bytes = decode_hex(value)?;
    if bytes.len() > N {
        return Err(Error::Other(format!(
            "Hex value is {} bytes, expected at most {N}",
            bytes.len()
        )));
    }
    let mut out = [0u8; N];
    out[N - bytes.len()..].copy_from_slice(&bytes);
    Ok(out)
}

/// Minimal big-endian bytes of an integer (empty for zero)
pub fn trim_leading_zeros(bytes: &[u8]) -> &[u8] {
    let first = bytes.iter().position(|&b| b != 0).unwrap_or(bytes.len());
    &bytes[first..]
}

/// Serde adapter for byte vectors as `0x`-prefixed hex
pub mod serde_hex {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `0x`-prefixed hex
    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_prefixed_hex(bytes))
    }

    /// Deserialize from optionally-prefixed hex
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::decode_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for fixed 32-byte words as `0x`-prefixed hex
pub mod serde_word {
    use serde::{Deserialize, Deserializer, Serializer};

    /// Serialize as `0x`-prefixed hex
    pub fn serialize<S: Serializer>(bytes: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::to_prefixed_hex(bytes))
    }

    /// Deserialize from optionally-prefixed hex, left-padding short values
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<[u8; 32], D::Error> {
        let raw = String::deserialize(deserializer)?;
        super::decode_hex_fixed::<32>(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_handling() {
        assert_eq!(strip_hex_prefix("0xdead"), "dead");
        assert_eq!(strip_hex_prefix("0Xdead"), "dead");
        assert_eq!(strip_hex_prefix("dead"), "dead");
        assert_eq!(add_hex_prefix("dead"), "0xdead");
        assert_eq!(add_hex_prefix("0xdead"), "0xdead");
    }

    #[test]
    fn test_decode_odd_length() {
        assert_eq!(decode_hex("0x1").unwrap(), vec![0x01]);
        assert_eq!(decode_hex("abc").unwrap(), vec![0x0a, 0xbc]);
        assert!(decode_hex("0xzz").is_err());
    }

    #[test]
    fn test_decode_fixed() {
        let padded: [u8; 4] = decode_hex_fixed("0x0102").unwrap();
        assert_eq!(padded, [0, 0, 1, 2]);
        assert!(decode_hex_fixed::<1>("0x0102").is_err());
    }

    #[test]
    fn test_trim_leading_zeros() {
        assert_eq!(trim_leading_zeros(&[0, 0, 5, 0]), &[5, 0]);
        assert!(trim_leading_zeros(&[0, 0]).is_empty());
    }
}
