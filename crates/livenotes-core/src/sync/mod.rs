//! Note Sync Channel.
//!
//! Keeps a live, ordered view of one identity's notes and forwards
//! mutations to the backend collection. Every delivery is a complete
//! snapshot; nothing is cached between subscriptions.

mod handle;

use std::sync::Arc;

use crate::backend::{NoteCollection, RawNoteRecord};
use crate::error::WriteOp;
use crate::models::{IdentityId, Note, NoteId};
use crate::util::{normalize_note_text, unix_timestamp_millis};
use crate::{Error, Result};

pub use handle::{SnapshotListener, SubscriptionHandle, SubscriptionState};

/// Live note view and mutations for identity-scoped collections.
#[derive(Clone)]
pub struct NoteSyncChannel {
    collection: Arc<dyn NoteCollection>,
}

impl NoteSyncChannel {
    pub fn new(collection: Arc<dyn NoteCollection>) -> Self {
        Self { collection }
    }

    /// Open a live subscription to `owner`'s notes, newest first.
    ///
    /// `listener` receives the full ordered note list once immediately and
    /// again after every change, one delivery at a time. Delivery stops when
    /// the returned handle is closed or dropped.
    pub async fn subscribe<L>(&self, owner: &IdentityId, listener: L) -> Result<SubscriptionHandle>
    where
        L: SnapshotListener + 'static,
    {
        let snapshots = self.collection.live_query(owner).await?;
        tracing::debug!("Subscribed to notes of {}", owner);
        Ok(SubscriptionHandle::spawn(owner.clone(), snapshots, Box::new(listener)))
    }

    /// Close `handle`; same as [`SubscriptionHandle::close`].
    pub fn unsubscribe(&self, mut handle: SubscriptionHandle) {
        handle.close();
    }

    /// Create a note from `text`.
    ///
    /// Text is trimmed; if nothing is left this is a no-op that returns
    /// `Ok(None)` without touching the backend.
    pub async fn add_note(&self, owner: &IdentityId, text: &str) -> Result<Option<NoteId>> {
        let Some(text) = normalize_note_text(text) else {
            tracing::debug!("Skipping empty note for {}", owner);
            return Ok(None);
        };

        let id = self
            .collection
            .create(owner, &text)
            .await
            .map_err(|error| Error::write(WriteOp::Add, error))?;
        tracing::info!("Added note {} for {}", id, owner);
        Ok(Some(id))
    }

    /// Replace a note's text and refresh its update time.
    pub async fn update_note(&self, owner: &IdentityId, id: &NoteId, text: &str) -> Result<()> {
        let text = normalize_note_text(text)
            .ok_or_else(|| Error::InvalidInput("Note text cannot be empty".to_string()))?;

        self.collection
            .update(owner, id, &text)
            .await
            .map_err(|error| Error::write(WriteOp::Update, error))?;
        tracing::info!("Updated note {} for {}", id, owner);
        Ok(())
    }

    /// Delete a note. Callers confirm with the user before calling this.
    pub async fn delete_note(&self, owner: &IdentityId, id: &NoteId) -> Result<()> {
        self.collection
            .delete(owner, id)
            .await
            .map_err(|error| Error::write(WriteOp::Delete, error))?;
        tracing::info!("Deleted note {} for {}", id, owner);
        Ok(())
    }
}

/// Turn a backend snapshot into deliverable notes.
///
/// Unconfirmed timestamps fall back to the local clock so every note carries
/// both. The result is ordered by creation time, newest first; records the
/// backend already ordered keep their relative order on ties.
pub(crate) fn notes_from_snapshot(records: Vec<RawNoteRecord>) -> Vec<Note> {
    let now = unix_timestamp_millis();
    let mut notes = records
        .into_iter()
        .map(|record| Note {
            id: record.id,
            text: record.text,
            created_at: record.created_at.unwrap_or(now),
            updated_at: record.updated_at.unwrap_or(now),
        })
        .collect::<Vec<_>>();
    notes.sort_by(|left, right| right.created_at.cmp(&left.created_at));
    notes
}
