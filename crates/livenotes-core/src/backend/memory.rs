//! In-process backend.
//!
//! Holds every collection and the signed-in account in memory. Used by tests
//! and demos; optional fault injection simulates a misbehaving backend.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{
    claims_from_credential, exchange_local_token, sort_newest_first, NoteCollection,
    RawNoteRecord, Snapshot, SnapshotReceiver, SnapshotSender,
};
use crate::auth::{AuthError, AuthResult, Credential, CredentialBackend, IdentityFanout, IdentityListener};
use crate::models::{Identity, IdentityId, NoteId};
use crate::util::unix_timestamp_millis;
use crate::{Error, Result};

#[derive(Debug, Clone)]
struct StoredNote {
    id: NoteId,
    text: String,
    created_at: Option<i64>,
    updated_at: Option<i64>,
}

impl StoredNote {
    fn to_record(&self) -> RawNoteRecord {
        RawNoteRecord {
            id: self.id.clone(),
            text: self.text.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Default)]
struct Faults {
    write_error: Option<String>,
    live_query_error: Option<String>,
    reject_credentials: bool,
    invalidate_error: Option<String>,
}

#[derive(Debug, Default)]
struct MemoryState {
    collections: HashMap<IdentityId, Vec<StoredNote>>,
    watchers: HashMap<IdentityId, Vec<SnapshotSender>>,
    accounts: HashMap<IdentityId, Identity>,
    current: Option<Identity>,
    last_timestamp: i64,
    faults: Faults,
}

impl MemoryState {
    /// Server clock; strictly increasing so creation order is never ambiguous.
    fn server_timestamp(&mut self) -> i64 {
        let now = unix_timestamp_millis().max(self.last_timestamp + 1);
        self.last_timestamp = now;
        now
    }

    fn snapshot(&self, owner: &IdentityId) -> Snapshot {
        let mut records = self
            .collections
            .get(owner)
            .map(|notes| notes.iter().rev().map(StoredNote::to_record).collect::<Vec<_>>())
            .unwrap_or_default();
        sort_newest_first(&mut records);
        records
    }

    fn broadcast(&mut self, owner: &IdentityId) {
        let snapshot = self.snapshot(owner);
        if let Some(watchers) = self.watchers.get_mut(owner) {
            watchers.retain(|tx| tx.send(Ok(snapshot.clone())).is_ok());
        }
    }

    fn check_write(&self) -> Result<()> {
        match &self.faults.write_error {
            Some(reason) => Err(Error::Backend(reason.clone())),
            None => Ok(()),
        }
    }

    fn find_note_mut(&mut self, owner: &IdentityId, id: &NoteId) -> Result<&mut StoredNote> {
        self.collections
            .get_mut(owner)
            .and_then(|notes| notes.iter_mut().find(|note| note.id == *id))
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

/// In-memory note collections plus a local credential backend.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
    identities: IdentityFanout,
    pending_timestamps: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report each new note once with unconfirmed timestamps before the
    /// confirmed snapshot, the way latency-compensated stores do.
    #[must_use]
    pub const fn with_pending_timestamps(mut self) -> Self {
        self.pending_timestamps = true;
        self
    }

    /// Start with `identity` already signed in (a restored session).
    #[must_use]
    pub fn with_signed_in(self, identity: Identity) -> Self {
        {
            let mut state = self.lock();
            state.accounts.insert(identity.id.clone(), identity.clone());
            state.current = Some(identity);
        }
        self
    }

    /// Make every subsequent write fail with `reason` (`None` heals).
    pub fn fail_writes(&self, reason: Option<&str>) {
        self.lock().faults.write_error = reason.map(ToString::to_string);
    }

    /// Make subsequent live queries fail to open with `reason` (`None` heals).
    pub fn fail_live_queries(&self, reason: Option<&str>) {
        self.lock().faults.live_query_error = reason.map(ToString::to_string);
    }

    /// Drop every open live query for `owner` with an error.
    pub fn break_live_queries(&self, owner: &IdentityId, reason: &str) {
        let mut state = self.lock();
        if let Some(watchers) = state.watchers.remove(owner) {
            for tx in watchers {
                let _ = tx.send(Err(Error::Subscription(reason.to_string())));
            }
        }
    }

    pub fn reject_credentials(&self, reject: bool) {
        self.lock().faults.reject_credentials = reject;
    }

    pub fn fail_invalidate(&self, reason: Option<&str>) {
        self.lock().faults.invalidate_error = reason.map(ToString::to_string);
    }

    /// Report an identity change that did not come from this client,
    /// e.g. a revoked session (`None`) or a refreshed profile.
    pub fn force_identity(&self, identity: Option<Identity>) {
        {
            let mut state = self.lock();
            if let Some(identity) = &identity {
                state.accounts.insert(identity.id.clone(), identity.clone());
            }
            state.current.clone_from(&identity);
        }
        self.identities.publish(&identity);
    }

    /// Number of live queries still connected for `owner`.
    pub fn live_query_count(&self, owner: &IdentityId) -> usize {
        self.lock()
            .watchers
            .get(owner)
            .map_or(0, |watchers| watchers.iter().filter(|tx| !tx.is_closed()).count())
    }

    pub fn note_count(&self, owner: &IdentityId) -> usize {
        self.lock().collections.get(owner).map_or(0, Vec::len)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        // Poisoning only follows a panic elsewhere; the data is still usable.
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl NoteCollection for MemoryBackend {
    async fn create(&self, owner: &IdentityId, text: &str) -> Result<NoteId> {
        let mut state = self.lock();
        state.check_write()?;

        let id = NoteId::generate();
        let mut note = StoredNote {
            id: id.clone(),
            text: text.to_string(),
            created_at: None,
            updated_at: None,
        };

        if self.pending_timestamps {
            state
                .collections
                .entry(owner.clone())
                .or_default()
                .push(note);
            state.broadcast(owner);
            let timestamp = state.server_timestamp();
            let stored = state.find_note_mut(owner, &id)?;
            stored.created_at = Some(timestamp);
            stored.updated_at = Some(timestamp);
        } else {
            let timestamp = state.server_timestamp();
            note.created_at = Some(timestamp);
            note.updated_at = Some(timestamp);
            state
                .collections
                .entry(owner.clone())
                .or_default()
                .push(note);
        }

        state.broadcast(owner);
        tracing::debug!("Created note {} for {}", id, owner);
        Ok(id)
    }

    async fn update(&self, owner: &IdentityId, id: &NoteId, text: &str) -> Result<()> {
        let mut state = self.lock();
        state.check_write()?;

        let timestamp = state.server_timestamp();
        let note = state.find_note_mut(owner, id)?;
        note.text = text.to_string();
        note.updated_at = Some(timestamp);

        state.broadcast(owner);
        Ok(())
    }

    async fn delete(&self, owner: &IdentityId, id: &NoteId) -> Result<()> {
        let mut state = self.lock();
        state.check_write()?;

        let notes = state
            .collections
            .get_mut(owner)
            .ok_or_else(|| Error::NotFound(id.to_string()))?;
        let before = notes.len();
        notes.retain(|note| note.id != *id);
        if notes.len() == before {
            return Err(Error::NotFound(id.to_string()));
        }

        state.broadcast(owner);
        Ok(())
    }

    async fn live_query(&self, owner: &IdentityId) -> Result<SnapshotReceiver> {
        let mut state = self.lock();
        if let Some(reason) = &state.faults.live_query_error {
            return Err(Error::Subscription(reason.clone()));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(Ok(state.snapshot(owner)));
        state.watchers.entry(owner.clone()).or_default().push(tx);
        Ok(rx)
    }
}

#[async_trait]
impl CredentialBackend for MemoryBackend {
    async fn exchange_token(&self, id_token: &str) -> AuthResult<Credential> {
        exchange_local_token(id_token)
    }

    async fn authenticate_with_credential(&self, credential: Credential) -> AuthResult<Identity> {
        let claims = claims_from_credential(&credential)?;
        let identity = {
            let mut state = self.lock();
            if state.faults.reject_credentials {
                return Err(AuthError::CredentialRejected(
                    "credential was rejected by the backend".to_string(),
                ));
            }

            let id = IdentityId::new(claims.sub.trim());
            let created_at = state
                .accounts
                .get(&id)
                .and_then(|account| account.created_at)
                .unwrap_or_else(unix_timestamp_millis);
            let identity = claims.to_identity(created_at);
            state.accounts.insert(id, identity.clone());
            state.current = Some(identity.clone());
            identity
        };

        self.identities.publish(&Some(identity.clone()));
        Ok(identity)
    }

    async fn invalidate_session(&self) -> AuthResult<()> {
        {
            let mut state = self.lock();
            if let Some(reason) = &state.faults.invalidate_error {
                return Err(AuthError::Storage(Error::Backend(reason.clone())));
            }
            state.current = None;
        }
        self.identities.publish(&None);
        Ok(())
    }

    fn on_identity_changed(&self) -> IdentityListener {
        let current = self.lock().current.clone();
        self.identities.register(current)
    }
}
