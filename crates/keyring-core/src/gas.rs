//! Gas limit padding
//!
//! Estimated gas limits are padded by a fixed amount before a transaction is
//! handed to a key source.

use crate::encoding::strip_hex_prefix;
use crate::{Error, Result};
use keyring_params::DEFAULT_GAS_BUFFER;

/// Add [`DEFAULT_GAS_BUFFER`] to a hex gas value, returning `0x`-prefixed hex.
pub fn add_gas_buffer(gas: &str) -> Result<String> {
    add_gas_buffer_with(gas, DEFAULT_GAS_BUFFER)
}

/// Add `buffer` to a hex gas value, returning `0x`-prefixed hex.
pub fn add_gas_buffer_with(gas: &str, buffer: u64) -> Result<String> {
    let digits = strip_hex_prefix(gas.trim());
    let value = if digits.is_empty() {
        0
    } else {
        u128::from_str_radix(digits, 16)
            .map_err(|e| Error::InvalidTransaction(format!("Invalid gas value '{gas}': {e}")))?
    };

    let padded = value.checked_add(u128::from(buffer)).ok_or_else(|| {
        Error::InvalidTransaction(format!("Gas value '{gas}' overflows with buffer {buffer}"))
    })?;

    tracing::debug!("Gas {} padded to {}", value, padded);

    Ok(format!("0x{padded:x}"))
}
