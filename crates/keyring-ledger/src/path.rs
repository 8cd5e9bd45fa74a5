//! Derivation path helpers for the two discovery modes
//!
//! Legacy mode derives account `i` locally as the non-hardened child `i` of
//! the key unlocked at the base path. BIP-44 mode asks the device for
//! `m/44'/60'/{i}'/0/0`, one round trip per account.

use keyring_params::BIP44_DEFAULT_PATH;

/// Whether `hd_path` selects BIP-44 account discovery
pub fn is_bip44(hd_path: &str) -> bool {
    hd_path == BIP44_DEFAULT_PATH
}

/// Full derivation path of account `index`
pub fn path_for_index(hd_path: &str, index: u32) -> String {
    if is_bip44(hd_path) {
        format!("m/44'/60'/{index}'/0/0")
    } else {
        format!("{hd_path}/{index}")
    }
}

/// Path as the device expects it, without the leading `m/`
pub fn to_device_path(path: &str) -> String {
    path.replacen("m/", "", 1)
}
