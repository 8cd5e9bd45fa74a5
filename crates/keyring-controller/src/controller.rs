//! Vault controller
//!
//! Owns the lock state machine and the ordered list of active key sources.
//! All operations are serialized through one session mutex, and every
//! mutation re-encrypts and rewrites the whole vault before returning.

use crate::session::{
    ActiveSource, KeyringEvent, KeyringSnapshot, KeyringSummary, Session, SourceId, UnlockedSession,
};
use keyring_core::{
    validate_mnemonic, Address, Error, KeySource, MessageParams, Result, SerializedSource,
    SourceKind, SourceRegistry, Transaction, TypedMessageParams,
};
use keyring_storage::{Encryptor, PasswordEncryptor, VaultStore};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, watch, MappedMutexGuard, Mutex, MutexGuard};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const EVENT_CAPACITY: usize = 64;

/// Keyring vault controller
pub struct KeyringController {
    store: Arc<dyn VaultStore>,
    encryptor: Arc<dyn Encryptor>,
    registry: SourceRegistry,
    session: Mutex<Session>,
    next_id: AtomicU64,
    events: broadcast::Sender<KeyringEvent>,
    state: watch::Sender<KeyringSnapshot>,
}

impl KeyringController {
    /// Controller over `store`, sealing vaults with `encryptor`
    pub fn new(
        store: Arc<dyn VaultStore>,
        encryptor: Arc<dyn Encryptor>,
        registry: SourceRegistry,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let initial = KeyringSnapshot {
            is_unlocked: false,
            keyring_types: registry.kinds(),
            keyrings: Vec::new(),
        };
        let (state, _) = watch::channel(initial);

        Self {
            store,
            encryptor,
            registry,
            session: Mutex::new(Session::Locked),
            next_id: AtomicU64::new(1),
            events,
            state,
        }
    }

    /// Controller with the default encryptor and the Simple and HD-Tree sources
    pub fn with_store(store: Arc<dyn VaultStore>) -> Self {
        Self::new(
            store,
            Arc::new(PasswordEncryptor::new()),
            SourceRegistry::with_defaults(),
        )
    }

    /// Change notifications
    pub fn subscribe_events(&self) -> broadcast::Receiver<KeyringEvent> {
        self.events.subscribe()
    }

    /// Snapshot updates, published after every state change
    pub fn subscribe_state(&self) -> watch::Receiver<KeyringSnapshot> {
        self.state.subscribe()
    }

    /// Whether the vault is unlocked
    pub async fn is_unlocked(&self) -> bool {
        matches!(*self.session.lock().await, Session::Unlocked(_))
    }

    /// Wipe, then create a vault holding one HD-Tree source with a fresh
    /// mnemonic and one account
    pub async fn create_new_vault_and_keychain(&self, password: &str) -> Result<KeyringSnapshot> {
        let mut session = self.session.lock().await;
        let first = self
            .replace_vault(&mut session, password, json!({ "numberOfAccounts": 1 }))
            .await?;

        info!("Created new vault");
        self.emit(KeyringEvent::NewVault(first));
        self.publish(&session).await
    }

    /// Wipe, then create a vault restoring one HD-Tree account from `mnemonic`
    pub async fn create_new_vault_and_restore(
        &self,
        password: &str,
        mnemonic: &str,
    ) -> Result<KeyringSnapshot> {
        if !validate_mnemonic(mnemonic) {
            return Err(Error::InvalidSeed("Seed phrase is invalid".to_string()));
        }

        let mut session = self.session.lock().await;
        let opts = json!({ "mnemonic": mnemonic, "numberOfAccounts": 1 });
        let first = self.replace_vault(&mut session, password, opts).await?;

        info!("Restored vault from seed phrase");
        self.emit(KeyringEvent::NewVault(first));
        self.publish(&session).await
    }

    /// Store an empty vault under `password`, switch to it, then add the
    /// first key tree. Memory always matches the last vault written.
    async fn replace_vault(&self, session: &mut Session, password: &str, opts: Value) -> Result<Address> {
        let fresh = UnlockedSession::new(password);
        self.persist(&fresh).await?;
        *session = Session::Unlocked(fresh);

        let unlocked = session.unlocked_mut()?;
        let first = self.create_first_key_tree(unlocked, opts).await?;
        if let Err(e) = self.persist(unlocked).await {
            unlocked.sources.clear();
            return Err(e);
        }
        Ok(first)
    }

    async fn create_first_key_tree(&self, session: &mut UnlockedSession, opts: Value) -> Result<Address> {
        session.sources.clear();
        let mut source = self.registry.create(SourceKind::HdTree.as_str())?;
        source.deserialize(opts).await?;

        let first = source
            .accounts()
            .await?
            .first()
            .copied()
            .ok_or_else(|| Error::EmptyAccount("First account not found".to_string()))?;

        let id = self.allocate_id();
        session.sources.push(ActiveSource { id, source });
        debug!("Created HD key tree {} with first account {}", id, first);
        Ok(first)
    }

    /// Open the stored vault with `password` and rebuild every source.
    ///
    /// On failure the controller stays locked and nothing else changes.
    pub async fn submit_password(&self, password: &str) -> Result<KeyringSnapshot> {
        let mut session = self.session.lock().await;

        let vault = self
            .store
            .load()
            .await?
            .ok_or_else(|| Error::Authentication("Cannot unlock without a previous vault".to_string()))?;
        let records = self.encryptor.decrypt(password, &vault).await?;

        let mut unlocked = UnlockedSession::new(password);
        for record in records {
            let mut source = self.registry.create(&record.kind)?;
            source.deserialize(record.data).await?;
            unlocked.sources.push(ActiveSource {
                id: self.allocate_id(),
                source,
            });
        }

        info!("Vault unlocked with {} source(s)", unlocked.sources.len());
        *session = Session::Unlocked(unlocked);
        self.publish(&session).await
    }

    /// Drop the password and every in-memory source
    pub async fn lock(&self) -> Result<KeyringSnapshot> {
        let mut session = self.session.lock().await;
        *session = Session::Locked;
        info!("Vault locked");
        self.publish(&session).await
    }

    /// Create a source of `kind`, restore `opts` into it, and append it.
    ///
    /// Imported Simple keys must not collide with any existing account.
    pub async fn add_new_keyring(&self, kind: SourceKind, opts: Value) -> Result<SourceId> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;

        let mut source = self.registry.create(kind.as_str())?;
        if !opts.is_null() {
            source.deserialize(opts).await?;
        }

        let accounts = source.accounts().await?;
        if kind == SourceKind::Simple {
            let existing = unlocked.all_accounts().await?;
            if let Some(duplicate) = accounts.iter().find(|a| existing.contains(a)) {
                return Err(Error::DuplicateAccount(format!(
                    "The account you're trying to import is a duplicate: {duplicate}"
                )));
            }
        }

        let id = self.allocate_id();
        unlocked.sources.push(ActiveSource { id, source });
        if let Err(e) = self.persist(unlocked).await {
            unlocked.sources.pop();
            return Err(e);
        }

        info!("Added {} source {} with {} account(s)", kind, id, accounts.len());
        self.publish(&session).await?;
        Ok(id)
    }

    /// Ask source `id` for one more account
    pub async fn add_new_account(&self, id: SourceId) -> Result<Vec<Address>> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;

        let position = unlocked.position(id)?;
        let previous = unlocked.sources[position].source.serialize().await?;
        let added = unlocked.sources[position].source.add_accounts(1).await?;
        if let Err(e) = self.persist(unlocked).await {
            restore_source(&mut unlocked.sources[position], previous).await;
            return Err(e);
        }

        for address in &added {
            self.emit(KeyringEvent::NewAccount(*address));
        }
        self.publish(&session).await?;
        Ok(added)
    }

    /// Remove `address` from its source; a source left empty is dropped
    pub async fn remove_account(&self, address: &Address) -> Result<()> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;

        let position = unlocked.owner_index(address).await?;
        let owner = unlocked.sources[position].id;
        let previous = unlocked.sources[position].source.serialize().await?;
        unlocked.sources[position].source.remove_account(address).await?;
        debug!("Removed {} from source {}", address, owner);

        let detached = detach_empty_sources(unlocked).await?;
        if let Err(e) = self.persist(unlocked).await {
            reattach_sources(unlocked, detached);
            if let Ok(position) = unlocked.position(owner) {
                restore_source(&mut unlocked.sources[position], previous).await;
            }
            return Err(e);
        }
        for (_, active) in &detached {
            debug!("Dropped empty source {}", active.id);
        }

        self.emit(KeyringEvent::RemovedAccount(*address));
        self.publish(&session).await?;
        Ok(())
    }

    /// Drop every source without accounts
    pub async fn remove_empty_keyrings(&self) -> Result<()> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;

        let detached = detach_empty_sources(unlocked).await?;
        if detached.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.persist(unlocked).await {
            reattach_sources(unlocked, detached);
            return Err(e);
        }

        debug!("Dropped {} empty source(s)", detached.len());
        self.publish(&session).await?;
        Ok(())
    }

    /// Re-encrypt and store the current sources
    pub async fn persist_all_keyrings(&self) -> Result<()> {
        let session = self.session.lock().await;
        self.persist(session.unlocked()?).await?;
        self.publish(&session).await?;
        Ok(())
    }

    /// Private key of `address`, as the owning source exports it
    pub async fn export_account(&self, address: &Address) -> Result<Zeroizing<String>> {
        let session = self.session.lock().await;
        let unlocked = session.unlocked()?;
        let position = unlocked.owner_index(address).await?;
        unlocked.sources[position].source.export_account(address).await
    }

    /// Sign `tx` with the source owning `from`
    pub async fn sign_transaction(&self, tx: Transaction, from: &Address) -> Result<Transaction> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;
        let position = unlocked.owner_index(from).await?;
        unlocked.sources[position].source.sign_transaction(from, tx).await
    }

    /// Sign a raw 32-byte digest
    pub async fn sign_message(&self, params: &MessageParams) -> Result<String> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;
        let position = unlocked.owner_index(&params.from).await?;
        unlocked.sources[position]
            .source
            .sign_message(&params.from, &params.data)
            .await
    }

    /// Sign a prefixed personal message
    pub async fn sign_personal_message(&self, params: &MessageParams) -> Result<String> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;
        let position = unlocked.owner_index(&params.from).await?;
        unlocked.sources[position]
            .source
            .sign_personal_message(&params.from, &params.data)
            .await
    }

    /// Sign legacy typed data
    pub async fn sign_typed_message(&self, params: &TypedMessageParams) -> Result<String> {
        let mut session = self.session.lock().await;
        let unlocked = session.unlocked_mut()?;
        let position = unlocked.owner_index(&params.from).await?;
        unlocked.sources[position]
            .source
            .sign_typed_data(&params.from, &params.data)
            .await
    }

    /// Every account, in source order; empty while locked
    pub async fn get_accounts(&self) -> Result<Vec<Address>> {
        match &*self.session.lock().await {
            Session::Unlocked(unlocked) => unlocked.all_accounts().await,
            Session::Locked => Ok(Vec::new()),
        }
    }

    /// First source whose accounts contain `address`
    pub async fn get_keyring_for_account(&self, address: &Address) -> Result<SourceId> {
        let session = self.session.lock().await;
        let unlocked = session.unlocked()?;
        let position = unlocked.owner_index(address).await?;
        let id = unlocked.sources[position].id;
        debug!("Resolved {} to source {}", address, id);
        Ok(id)
    }

    /// Active sources of `kind`, in order
    pub async fn get_keyrings_by_type(&self, kind: SourceKind) -> Result<Vec<SourceId>> {
        let session = self.session.lock().await;
        Ok(session
            .unlocked()?
            .sources
            .iter()
            .filter(|active| active.source.kind() == kind)
            .map(|active| active.id)
            .collect())
    }

    /// Exclusive typed access to source `id`.
    ///
    /// Every other controller operation waits while the guard is held;
    /// call [`Self::persist_all_keyrings`] afterwards to store changes.
    pub async fn source_mut<T: KeySource>(&self, id: SourceId) -> Result<MappedMutexGuard<'_, T>> {
        let session = self.session.lock().await;
        let position = session.unlocked()?.position(id)?;

        MutexGuard::try_map(session, |session| match session {
            Session::Unlocked(unlocked) => unlocked.sources[position]
                .source
                .as_any_mut()
                .downcast_mut::<T>(),
            Session::Locked => None,
        })
        .map_err(|_| {
            Error::SourceNotFound(format!(
                "Source {id} is not a {}",
                std::any::type_name::<T>()
            ))
        })
    }

    /// Current public snapshot
    pub async fn snapshot(&self) -> Result<KeyringSnapshot> {
        let session = self.session.lock().await;
        self.build_snapshot(&session).await
    }

    /// Rebuild and publish the snapshot
    pub async fn full_update(&self) -> Result<KeyringSnapshot> {
        let session = self.session.lock().await;
        self.publish(&session).await
    }

    /// Add the gas safety margin to a hex gas estimate
    pub fn add_gas_buffer(&self, gas: &str) -> Result<String> {
        keyring_core::add_gas_buffer(gas)
    }

    fn allocate_id(&self) -> SourceId {
        SourceId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    fn emit(&self, event: KeyringEvent) {
        // Err only means nobody is listening
        let _ = self.events.send(event);
    }

    async fn persist(&self, session: &UnlockedSession) -> Result<()> {
        let mut records = Vec::with_capacity(session.sources.len());
        for active in &session.sources {
            records.push(SerializedSource {
                kind: active.source.kind().to_string(),
                data: active.source.serialize().await?,
            });
        }

        let vault = self.encryptor.encrypt(&session.password, &records).await?;
        self.store.save(&vault).await?;
        debug!("Persisted {} source(s)", records.len());
        Ok(())
    }

    async fn build_snapshot(&self, session: &Session) -> Result<KeyringSnapshot> {
        let keyring_types = self.registry.kinds();
        match session {
            Session::Locked => Ok(KeyringSnapshot {
                is_unlocked: false,
                keyring_types,
                keyrings: Vec::new(),
            }),
            Session::Unlocked(unlocked) => {
                let mut keyrings = Vec::with_capacity(unlocked.sources.len());
                for active in &unlocked.sources {
                    keyrings.push(KeyringSummary {
                        id: active.id,
                        kind: active.source.kind(),
                        accounts: active.source.accounts().await?,
                    });
                }
                Ok(KeyringSnapshot {
                    is_unlocked: true,
                    keyring_types,
                    keyrings,
                })
            }
        }
    }

    async fn publish(&self, session: &Session) -> Result<KeyringSnapshot> {
        let snapshot = self.build_snapshot(session).await?;
        self.state.send_replace(snapshot.clone());
        Ok(snapshot)
    }
}

/// Take every source without accounts out of the session, keeping the
/// positions they held
async fn detach_empty_sources(session: &mut UnlockedSession) -> Result<Vec<(usize, ActiveSource)>> {
    let mut empty = Vec::new();
    for (position, active) in session.sources.iter().enumerate() {
        if active.source.accounts().await?.is_empty() {
            empty.push(position);
        }
    }

    let mut detached = Vec::with_capacity(empty.len());
    for position in empty.into_iter().rev() {
        detached.push((position, session.sources.remove(position)));
    }
    detached.reverse();
    Ok(detached)
}

fn reattach_sources(session: &mut UnlockedSession, detached: Vec<(usize, ActiveSource)>) {
    for (position, active) in detached {
        session.sources.insert(position, active);
    }
}

/// Put a source back into the state it serialized to
async fn restore_source(active: &mut ActiveSource, state: Value) {
    if let Err(e) = active.source.deserialize(state).await {
        warn!("Failed to roll back source {}: {}", active.id, e);
    }
}
