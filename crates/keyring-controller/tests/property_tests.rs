//! Property tests for the vault controller
//!
//! Tests cover:
//! - Restore, lock and unlock reproduce the account set for generated seeds
//! - Account listing is stable without mutation

use keyring_controller::KeyringController;
use keyring_core::{generate_mnemonic, SourceRegistry};
use keyring_storage::{KdfParams, MemoryVaultStore, PasswordEncryptor, VaultCipher};
use proptest::prelude::*;
use std::sync::Arc;

fn block_on<F: std::future::Future>(future: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(future)
}

fn controller() -> KeyringController {
    let encryptor = PasswordEncryptor::with_params(
        KdfParams {
            memory_kib: 256,
            iterations: 1,
            parallelism: 1,
        },
        VaultCipher::Aes256Gcm,
    );
    KeyringController::new(
        Arc::new(MemoryVaultStore::new()),
        Arc::new(encryptor),
        SourceRegistry::with_defaults(),
    )
}

// =============================================================================
// Vault round trips
// =============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_restore_lock_unlock(password in "[ -~]{0,24}", extra in 0usize..3) {
        let mnemonic = generate_mnemonic(None).unwrap();
        block_on(async {
            let controller = controller();
            controller.create_new_vault_and_restore(&password, &mnemonic).await.unwrap();
            let hd = controller.get_keyrings_by_type(keyring_core::SourceKind::HdTree).await.unwrap()[0];
            for _ in 0..extra {
                controller.add_new_account(hd).await.unwrap();
            }

            let before = controller.get_accounts().await.unwrap();
            prop_assert_eq!(&before, &controller.get_accounts().await.unwrap());

            controller.lock().await.unwrap();
            controller.submit_password(&password).await.unwrap();
            prop_assert_eq!(before, controller.get_accounts().await.unwrap());
            Ok(())
        })?;
    }
}
