//! Message payloads: raw `eth_sign` digests, personal messages and legacy
//! (V1) typed data.

use crate::address::Address;
use crate::encoding::{decode_hex, decode_hex_fixed, strip_hex_prefix};
use crate::keys::{keccak256, RecoverableSignature};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Personal message prefix
pub const PERSONAL_MESSAGE_PREFIX: &str = "\x19Ethereum Signed Message:\n";

/// Request to sign a raw digest or personal message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageParams {
    /// Account expected to sign
    pub from: Address,
    /// Hex payload (or plain text for personal messages)
    pub data: String,
}

/// Request to sign legacy typed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedMessageParams {
    /// Account expected to sign
    pub from: Address,
    /// Typed fields
    pub data: Vec<TypedField>,
}

/// A single `{type, name, value}` entry of legacy typed data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypedField {
    /// Solidity type name
    #[serde(rename = "type")]
    pub kind: String,
    /// Field name
    pub name: String,
    /// Field value
    pub value: Value,
}

/// Interpret message data: valid `0x` hex is decoded, anything else is UTF-8 text
pub fn message_bytes(data: &str) -> Vec<u8> {
    if data.starts_with("0x") || data.starts_with("0X") {
        if let Ok(bytes) = decode_hex(data) {
            return bytes;
        }
    }
    data.as_bytes().to_vec()
}

/// Digest of an `eth_sign` payload, which must already be 32 bytes
pub fn raw_digest(data: &str) -> Result<[u8; 32]> {
    let bytes = decode_hex(data)?;
    bytes.try_into().map_err(|bytes: Vec<u8>| {
        Error::InvalidMessage(format!("Digest must be 32 bytes, got {}", bytes.len()))
    })
}

/// Prefixed keccak256 digest of a personal message
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut prefixed = format!("{PERSONAL_MESSAGE_PREFIX}{}", message.len()).into_bytes();
    prefixed.extend_from_slice(message);
    keccak256(&prefixed)
}

/// Recover the signer of a personal message from an `r || s || v` hex signature
pub fn recover_personal_signature(data: &str, signature: &str) -> Result<Address> {
    let signature = RecoverableSignature::from_rsv_hex(signature)?;
    signature.recover(&personal_message_hash(&message_bytes(data)))
}

/// Legacy typed data digest:
/// `keccak(keccak(pack("type name"...)) || keccak(pack(values...)))`
pub fn typed_data_hash(fields: &[TypedField]) -> Result<[u8; 32]> {
    if fields.is_empty() {
        return Err(Error::InvalidMessage("Typed data has no fields".to_string()));
    }

    let mut schema = Vec::new();
    let mut values = Vec::new();
    for field in fields {
        schema.extend_from_slice(format!("{} {}", field.kind, field.name).as_bytes());
        values.extend(pack_value(&field.kind, &field.value)?);
    }

    let mut outer = Vec::with_capacity(64);
    outer.extend_from_slice(&keccak256(&schema));
    outer.extend_from_slice(&keccak256(&values));
    Ok(keccak256(&outer))
}

fn pack_value(kind: &str, value: &Value) -> Result<Vec<u8>> {
    match kind {
        "string" => Ok(value_str(kind, value)?.as_bytes().to_vec()),
        "bytes" => Ok(message_bytes(value_str(kind, value)?)),
        "bool" => {
            let flag = match value {
                Value::Bool(flag) => *flag,
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                Value::Number(n) => n.as_u64().map(|n| n != 0).unwrap_or(false),
                _ => return Err(type_mismatch(kind, value)),
            };
            Ok(vec![u8::from(flag)])
        }
        "address" => Ok(Address::parse(value_str(kind, value)?)?.as_bytes().to_vec()),
        _ => {
            if let Some(bits) = kind.strip_prefix("uint") {
                let width = int_width(kind, bits)?;
                let word = parse_word(kind, value, false)?;
                if word[..32 - width].iter().any(|b| *b != 0) {
                    return Err(Error::InvalidMessage(format!("{value} overflows {kind}")));
                }
                Ok(word[32 - width..].to_vec())
            } else if let Some(bits) = kind.strip_prefix("int") {
                let width = int_width(kind, bits)?;
                let word = parse_word(kind, value, true)?;
                Ok(word[32 - width..].to_vec())
            } else if let Some(size) = kind.strip_prefix("bytes") {
                let size: usize = size
                    .parse()
                    .ok()
                    .filter(|s| (1..=32).contains(s))
                    .ok_or_else(|| Error::InvalidMessage(format!("Unsupported type {kind}")))?;
                let mut bytes = message_bytes(value_str(kind, value)?);
                if bytes.len() > size {
                    return Err(Error::InvalidMessage(format!(
                        "{kind} value is {} bytes",
                        bytes.len()
                    )));
                }
                bytes.resize(size, 0);
                Ok(bytes)
            } else {
                Err(Error::InvalidMessage(format!("Unsupported type {kind}")))
            }
        }
    }
}

fn value_str<'a>(kind: &str, value: &'a Value) -> Result<&'a str> {
    value.as_str().ok_or_else(|| type_mismatch(kind, value))
}

fn type_mismatch(kind: &str, value: &Value) -> Error {
    Error::InvalidMessage(format!("Value {value} is not a valid {kind}"))
}

/// Byte width of `uintN`/`intN`; bare `uint`/`int` is 256 bits
fn int_width(kind: &str, bits: &str) -> Result<usize> {
    if bits.is_empty() {
        return Ok(32);
    }
    bits.parse::<usize>()
        .ok()
        .filter(|b| *b > 0 && *b <= 256 && b % 8 == 0)
        .map(|b| b / 8)
        .ok_or_else(|| Error::InvalidMessage(format!("Unsupported type {kind}")))
}

/// Parse a JSON number, decimal string or hex string into a 256-bit
/// two's-complement word.
fn parse_word(kind: &str, value: &Value, signed: bool) -> Result<[u8; 32]> {
    let text = match value {
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        _ => return Err(type_mismatch(kind, value)),
    };

    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) if signed => (true, rest),
        Some(_) => return Err(type_mismatch(kind, value)),
        None => (false, text.as_str()),
    };

    let mut word = if digits.starts_with("0x") || digits.starts_with("0X") {
        decode_hex_fixed::<32>(strip_hex_prefix(digits)).map_err(|_| type_mismatch(kind, value))?
    } else {
        parse_decimal(digits).ok_or_else(|| type_mismatch(kind, value))?
    };

    if negative {
        for byte in word.iter_mut() {
            *byte = !*byte;
        }
        for byte in word.iter_mut().rev() {
            let (sum, carry) = byte.overflowing_add(1);
            *byte = sum;
            if !carry {
                break;
            }
        }
    }
    Ok(word)
}

fn parse_decimal(digits: &str) -> Option<[u8; 32]> {
    if digits.is_empty() {
        return None;
    }
    let mut word = [0u8; 32];
    for c in digits.chars() {
        let mut carry = c.to_digit(10)?;
        for byte in word.iter_mut().rev() {
            let product = u32::from(*byte) * 10 + carry;
            *byte = (product & 0xff) as u8;
            carry = product >> 8;
        }
        if carry != 0 {
            return None;
        }
    }
    Some(word)
}
