//! Vault controller tests
//!
//! Tests cover:
//! - Vault creation, restore, lock and unlock round trips
//! - Account resolution, duplicate policy and removal
//! - Signing dispatch across Simple, HD-Tree and hardware sources
//! - Events and the published snapshot
//! - Memory and stored vault staying in step when a save fails

use keyring_controller::{KeyringController, KeyringEvent};
use keyring_core::message::recover_personal_signature;
use keyring_core::{Address, Error, MessageParams, PrivateKey, SourceKind, SourceRegistry, Transaction};
use keyring_ledger::mock::{MockBehavior, MockDevice, StaticActivity};
use keyring_ledger::{ledger_factory, BridgeClient, LedgerKeySource};
use keyring_params::LedgerSettings;
use keyring_storage::{FileVaultStore, KdfParams, MemoryVaultStore, PasswordEncryptor, VaultCipher, VaultStore};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

const MNEMONIC: &str =
    "abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon abandon about";
const FIRST_ACCOUNT: &str = "0x9858EfFD232B4033E47d90003D41EC34EcaEda94";
const SIMPLE_KEY: &str = "4646464646464646464646464646464646464646464646464646464646464646";
const BRIDGE_URL: &str = "https://bridge.irchain.io/ledger/index.html";

fn light_encryptor() -> Arc<PasswordEncryptor> {
    Arc::new(PasswordEncryptor::with_params(
        KdfParams {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        },
        VaultCipher::ChaCha20Poly1305,
    ))
}

fn controller_on(store: Arc<dyn VaultStore>) -> KeyringController {
    KeyringController::new(store, light_encryptor(), SourceRegistry::with_defaults())
}

fn controller() -> KeyringController {
    controller_on(Arc::new(MemoryVaultStore::new()))
}

fn hardware_controller(store: Arc<dyn VaultStore>) -> (Arc<MockDevice>, KeyringController) {
    let settings = LedgerSettings {
        bridge_url: BRIDGE_URL.to_string(),
        max_lookup_index: 20,
        ..LedgerSettings::default()
    };
    let device = MockDevice::new(BRIDGE_URL).unwrap();
    let client = BridgeClient::new(device.clone(), BRIDGE_URL, settings.request_timeout()).unwrap();

    let mut registry = SourceRegistry::with_defaults();
    registry.register(
        SourceKind::Hardware,
        ledger_factory(Arc::new(client), StaticActivity::new(Vec::new()), settings),
    );
    (device, KeyringController::new(store, light_encryptor(), registry))
}

/// Memory store whose saves can be made to fail
#[derive(Default)]
struct FailingStore {
    inner: MemoryVaultStore,
    fail: AtomicBool,
}

impl FailingStore {
    fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl VaultStore for FailingStore {
    async fn load(&self) -> keyring_storage::Result<Option<String>> {
        self.inner.load().await
    }

    async fn save(&self, vault: &str) -> keyring_storage::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(keyring_storage::Error::Storage("disk full".to_string()));
        }
        self.inner.save(vault).await
    }
}

fn simple_address() -> Address {
    PrivateKey::from_hex(SIMPLE_KEY).unwrap().address()
}

fn transfer() -> Transaction {
    Transaction {
        nonce: 0,
        gas_price: 1_000_000_000,
        gas_limit: 21_000,
        to: Some(Address::parse("0x3535353535353535353535353535353535353535").unwrap()),
        value: 10,
        data: Vec::new(),
        chain_id: 1,
        signature: None,
    }
}

// =============================================================================
// Lifecycle
// =============================================================================

#[tokio::test]
async fn test_restore_lock_unlock_round_trip() {
    let controller = controller();
    let snapshot = controller
        .create_new_vault_and_restore("correct horse", MNEMONIC)
        .await
        .unwrap();
    assert!(snapshot.is_unlocked);
    assert_eq!(snapshot.keyrings.len(), 1);
    assert_eq!(snapshot.keyrings[0].kind, SourceKind::HdTree);

    let accounts = controller.get_accounts().await.unwrap();
    assert_eq!(accounts, vec![Address::parse(FIRST_ACCOUNT).unwrap()]);

    controller.lock().await.unwrap();
    let snapshot = controller.submit_password("correct horse").await.unwrap();
    assert!(snapshot.is_unlocked);
    assert_eq!(controller.get_accounts().await.unwrap(), accounts);
}

#[tokio::test]
async fn test_create_keychain() {
    let controller = controller();
    let mut events = controller.subscribe_events();

    let snapshot = controller.create_new_vault_and_keychain("pw").await.unwrap();
    assert_eq!(snapshot.keyrings.len(), 1);
    assert_eq!(snapshot.keyrings[0].accounts.len(), 1);

    let first = snapshot.keyrings[0].accounts[0];
    assert_eq!(events.try_recv().unwrap(), KeyringEvent::NewVault(first));
    assert!(controller.subscribe_state().borrow().is_unlocked);
}

#[tokio::test]
async fn test_invalid_seed_rejected() {
    let controller = controller();
    let err = controller
        .create_new_vault_and_restore("pw", "abandon abandon abandon")
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidSeed(_)));
    assert!(!controller.is_unlocked().await);
}

#[tokio::test]
async fn test_unlock_failures_stay_locked() {
    let controller = controller();
    assert!(matches!(
        controller.submit_password("pw").await,
        Err(Error::Authentication(_))
    ));

    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    controller.lock().await.unwrap();
    assert!(matches!(
        controller.submit_password("wrong").await,
        Err(Error::Authentication(_))
    ));
    assert!(!controller.is_unlocked().await);
    assert!(controller.get_accounts().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_lock_clears_everything() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();

    let snapshot = controller.lock().await.unwrap();
    assert!(!snapshot.is_unlocked);
    assert!(snapshot.keyrings.is_empty());
    assert!(controller.get_accounts().await.unwrap().is_empty());

    let first = Address::parse(FIRST_ACCOUNT).unwrap();
    assert!(matches!(
        controller.add_new_keyring(SourceKind::Simple, Value::Null).await,
        Err(Error::Locked(_))
    ));
    assert!(matches!(controller.export_account(&first).await, Err(Error::Locked(_))));
}

#[tokio::test]
async fn test_file_vault_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vault.json");

    let accounts = {
        let controller = controller_on(Arc::new(FileVaultStore::new(&path)));
        controller.create_new_vault_and_keychain("pw").await.unwrap();
        controller.get_accounts().await.unwrap()
    };

    let controller = controller_on(Arc::new(FileVaultStore::new(&path)));
    controller.submit_password("pw").await.unwrap();
    assert_eq!(controller.get_accounts().await.unwrap(), accounts);
}

// =============================================================================
// Sources and accounts
// =============================================================================

#[tokio::test]
async fn test_simple_duplicates_rejected() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    let first = Address::parse(FIRST_ACCOUNT).unwrap();

    controller
        .add_new_keyring(SourceKind::Simple, json!([SIMPLE_KEY]))
        .await
        .unwrap();
    let err = controller
        .add_new_keyring(SourceKind::Simple, json!([format!("0x{SIMPLE_KEY}")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateAccount(_)));

    // Importing the HD account's own key collides as well
    let exported = controller.export_account(&first).await.unwrap();
    let err = controller
        .add_new_keyring(SourceKind::Simple, json!([exported.as_str()]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateAccount(_)));

    // HD-Tree sources are never checked
    controller
        .add_new_keyring(
            SourceKind::HdTree,
            json!({ "mnemonic": MNEMONIC, "numberOfAccounts": 1 }),
        )
        .await
        .unwrap();
    assert_eq!(controller.get_accounts().await.unwrap(), vec![first, simple_address(), first]);
}

#[tokio::test]
async fn test_simple_import_with_repeated_key_rejected() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    let before = controller.get_accounts().await.unwrap();

    let err = controller
        .add_new_keyring(SourceKind::Simple, json!([SIMPLE_KEY, format!("0x{SIMPLE_KEY}")]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DuplicateAccount(_)));
    assert_eq!(controller.get_accounts().await.unwrap(), before);
    assert_eq!(controller.snapshot().await.unwrap().keyrings.len(), 1);
}

#[tokio::test]
async fn test_account_resolution() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    let simple = controller
        .add_new_keyring(SourceKind::Simple, json!([SIMPLE_KEY]))
        .await
        .unwrap();

    assert_eq!(controller.get_keyring_for_account(&simple_address()).await.unwrap(), simple);
    assert_eq!(controller.get_keyrings_by_type(SourceKind::Simple).await.unwrap(), vec![simple]);

    let stranger = Address::parse("0x000000000000000000000000000000000000dead").unwrap();
    assert!(matches!(
        controller.get_keyring_for_account(&stranger).await,
        Err(Error::AccountNotFound(_))
    ));
}

#[tokio::test]
async fn test_unknown_kind_rejected() {
    let controller = controller();
    controller.create_new_vault_and_keychain("pw").await.unwrap();
    assert!(matches!(
        controller.add_new_keyring(SourceKind::Hardware, Value::Null).await,
        Err(Error::UnknownSourceKind(_))
    ));
}

#[tokio::test]
async fn test_add_account_persists() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    let mut events = controller.subscribe_events();

    let hd = controller.get_keyrings_by_type(SourceKind::HdTree).await.unwrap()[0];
    let added = controller.add_new_account(hd).await.unwrap();
    assert_eq!(added.len(), 1);
    assert_eq!(events.try_recv().unwrap(), KeyringEvent::NewAccount(added[0]));

    controller.lock().await.unwrap();
    controller.submit_password("pw").await.unwrap();
    assert_eq!(controller.get_accounts().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_remove_account_drops_empty_source() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    controller
        .add_new_keyring(SourceKind::Simple, json!([SIMPLE_KEY]))
        .await
        .unwrap();
    let mut events = controller.subscribe_events();

    controller.remove_account(&simple_address()).await.unwrap();
    assert_eq!(events.try_recv().unwrap(), KeyringEvent::RemovedAccount(simple_address()));
    assert!(controller.get_keyrings_by_type(SourceKind::Simple).await.unwrap().is_empty());

    let first = Address::parse(FIRST_ACCOUNT).unwrap();
    assert!(matches!(
        controller.remove_account(&first).await,
        Err(Error::Unsupported(_))
    ));

    controller.lock().await.unwrap();
    let snapshot = controller.submit_password("pw").await.unwrap();
    assert_eq!(snapshot.keyrings.len(), 1);
}

#[tokio::test]
async fn test_remove_empty_keyrings() {
    let controller = controller();
    controller.create_new_vault_and_keychain("pw").await.unwrap();
    controller
        .add_new_keyring(SourceKind::Simple, Value::Null)
        .await
        .unwrap();
    assert_eq!(controller.snapshot().await.unwrap().keyrings.len(), 2);

    controller.remove_empty_keyrings().await.unwrap();
    assert_eq!(controller.snapshot().await.unwrap().keyrings.len(), 1);
}

#[tokio::test]
async fn test_failed_save_keeps_memory_and_vault_in_step() {
    let store = Arc::new(FailingStore::default());
    let controller = controller_on(store.clone());
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    controller
        .add_new_keyring(SourceKind::Simple, json!([SIMPLE_KEY]))
        .await
        .unwrap();
    controller
        .add_new_keyring(SourceKind::Simple, Value::Null)
        .await
        .unwrap();
    let hd = controller.get_keyrings_by_type(SourceKind::HdTree).await.unwrap()[0];

    let before = controller.snapshot().await.unwrap();
    let vault = store.load().await.unwrap();
    store.set_failing(true);

    let other_key = "47".repeat(32);
    let err = controller
        .add_new_keyring(SourceKind::Simple, json!([other_key]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Storage(_)));
    assert_eq!(controller.snapshot().await.unwrap(), before);

    assert!(controller.add_new_account(hd).await.is_err());
    assert_eq!(controller.snapshot().await.unwrap(), before);

    assert!(controller.remove_account(&simple_address()).await.is_err());
    assert_eq!(controller.snapshot().await.unwrap(), before);

    assert!(controller.remove_empty_keyrings().await.is_err());
    assert_eq!(controller.snapshot().await.unwrap(), before);

    assert_eq!(store.load().await.unwrap(), vault);

    // The stored vault still matches memory
    store.set_failing(false);
    controller.lock().await.unwrap();
    controller.submit_password("pw").await.unwrap();
    assert_eq!(
        controller.get_accounts().await.unwrap(),
        before.accounts().copied().collect::<Vec<_>>()
    );

    // The rolled back source still derives its next account
    let hd = controller.get_keyrings_by_type(SourceKind::HdTree).await.unwrap()[0];
    assert_eq!(controller.add_new_account(hd).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_failed_first_save_keeps_previous_session() {
    let store = Arc::new(FailingStore::default());
    let controller = controller_on(store.clone());
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    let before = controller.snapshot().await.unwrap();

    store.set_failing(true);
    assert!(controller.create_new_vault_and_keychain("other").await.is_err());
    assert_eq!(controller.snapshot().await.unwrap(), before);
}

// =============================================================================
// Signing
// =============================================================================

#[tokio::test]
async fn test_signing_dispatch() {
    let controller = controller();
    controller.create_new_vault_and_restore("pw", MNEMONIC).await.unwrap();
    controller
        .add_new_keyring(SourceKind::Simple, json!([SIMPLE_KEY]))
        .await
        .unwrap();

    for from in [Address::parse(FIRST_ACCOUNT).unwrap(), simple_address()] {
        let signed = controller.sign_transaction(transfer(), &from).await.unwrap();
        assert_eq!(signed.recover_signer().unwrap(), from);

        let params = MessageParams {
            from,
            data: "0x68656c6c6f".to_string(),
        };
        let signature = controller.sign_personal_message(&params).await.unwrap();
        assert_eq!(recover_personal_signature(&params.data, &signature).unwrap(), from);
    }

    assert_eq!(
        controller.export_account(&simple_address()).await.unwrap().as_str(),
        SIMPLE_KEY
    );
}

#[tokio::test]
async fn test_gas_buffer() {
    let controller = controller();
    assert_eq!(controller.add_gas_buffer("0x5208").unwrap(), "0x1d8a8");
}

// =============================================================================
// Hardware sources
// =============================================================================

#[tokio::test]
async fn test_hardware_account_flow() {
    let store: Arc<dyn VaultStore> = Arc::new(MemoryVaultStore::new());
    let (device, controller) = hardware_controller(store);
    controller.create_new_vault_and_keychain("pw").await.unwrap();

    let id = controller
        .add_new_keyring(SourceKind::Hardware, Value::Null)
        .await
        .unwrap();
    {
        let mut ledger = controller.source_mut::<LedgerKeySource>(id).await.unwrap();
        let page = ledger.first_page().await.unwrap();
        assert_eq!(page.len(), 5);
        ledger.set_account_to_unlock(page[2].index);
    }

    let added = controller.add_new_account(id).await.unwrap();
    assert_eq!(added, vec![device.address_at("m/44'/60'/0'/2").unwrap()]);

    let signed = controller.sign_transaction(transfer(), &added[0]).await.unwrap();
    assert_eq!(signed.recover_signer().unwrap(), added[0]);

    let params = MessageParams {
        from: added[0],
        data: "hello".to_string(),
    };
    assert!(matches!(
        controller.sign_message(&params).await,
        Err(Error::Unsupported(_))
    ));
    assert!(matches!(
        controller.export_account(&added[0]).await,
        Err(Error::Unsupported(_))
    ));

    controller.lock().await.unwrap();
    controller.submit_password("pw").await.unwrap();
    assert!(controller.get_accounts().await.unwrap().contains(&added[0]));

    // Typed access to the wrong kind is refused
    let id = controller.get_keyrings_by_type(SourceKind::Hardware).await.unwrap()[0];
    assert!(controller.source_mut::<LedgerKeySource>(id).await.is_ok());
    assert!(matches!(
        controller.source_mut::<keyring_core::HdKeySource>(id).await,
        Err(Error::SourceNotFound(_))
    ));
}

#[tokio::test]
async fn test_hardware_tampering_rejected() {
    let store: Arc<dyn VaultStore> = Arc::new(MemoryVaultStore::new());
    let (device, controller) = hardware_controller(store);
    controller.create_new_vault_and_keychain("pw").await.unwrap();
    let id = controller
        .add_new_keyring(SourceKind::Hardware, Value::Null)
        .await
        .unwrap();
    let added = controller.add_new_account(id).await.unwrap();

    device.set_behavior(MockBehavior {
        tamper: true,
        ..MockBehavior::default()
    });
    assert!(matches!(
        controller.sign_transaction(transfer(), &added[0]).await,
        Err(Error::SignatureVerification(_))
    ));
}
