//! Policy constants shared by the key sources and the controller.
//!
//! These are defaults; the settings structs allow overriding the ones that
//! are policy rather than protocol.

/// Base path of the hardware source in legacy mode (one shared extended key)
pub const DEFAULT_HD_PATH: &str = "m/44'/60'/0'";

/// Canonical BIP-44 external-chain address path; selecting it enables per-account derivation
pub const BIP44_DEFAULT_PATH: &str = "m/44'/60'/0'/0/0";

/// Base path of the mnemonic-derived HD tree source
pub const HD_TREE_DEFAULT_PATH: &str = "m/44'/60'/0'/0";

/// Relative base used when deriving children from the unlocked extended key
pub const LEGACY_PATH_BASE: &str = "m";

/// Accounts returned per discovery page
pub const DEFAULT_ACCOUNTS_PER_PAGE: usize = 5;

/// Upper bound of the linear scan used to recover an index from an address
pub const MAX_REVERSE_LOOKUP_INDEX: u32 = 1000;

/// Seconds to wait for a device reply before giving up
pub const DEFAULT_DEVICE_TIMEOUT_SECS: u64 = 60;

/// Safety margin added to raw gas estimates
pub const DEFAULT_GAS_BUFFER: u64 = 100_000;

/// Fixed target tag carried by every bridge request
pub const BRIDGE_TARGET: &str = "LEDGER-IFRAME";
