//! Subscription handles and the per-subscription delivery task.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;

use super::notes_from_snapshot;
use crate::backend::SnapshotReceiver;
use crate::models::{IdentityId, Note};
use crate::Error;

/// Receives note snapshots from a subscription.
///
/// Any `FnMut(Vec<Note>) + Send` closure is a listener. Implement the trait
/// directly to also hear about a subscription failing.
pub trait SnapshotListener: Send {
    fn on_update(&mut self, notes: Vec<Note>);

    /// The live query failed; no further updates will follow.
    fn on_error(&mut self, _error: &Error) {}
}

impl<F> SnapshotListener for F
where
    F: FnMut(Vec<Note>) + Send,
{
    fn on_update(&mut self, notes: Vec<Note>) {
        self(notes);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionState {
    Active,
    Closed,
    /// The live query broke; resubscribe to resume.
    Failed(String),
}

struct Shared {
    listener: Mutex<Option<Box<dyn SnapshotListener>>>,
    state: Mutex<SubscriptionState>,
}

impl Shared {
    fn listener(&self) -> MutexGuard<'_, Option<Box<dyn SnapshotListener>>> {
        self.listener.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// An open live subscription.
///
/// Closing is idempotent and also happens on drop. Once [`close`] returns
/// the listener is never called again.
///
/// [`close`]: SubscriptionHandle::close
pub struct SubscriptionHandle {
    owner: IdentityId,
    shared: Arc<Shared>,
    task: Option<JoinHandle<()>>,
}

impl SubscriptionHandle {
    pub(crate) fn spawn(
        owner: IdentityId,
        snapshots: SnapshotReceiver,
        listener: Box<dyn SnapshotListener>,
    ) -> Self {
        let shared = Arc::new(Shared {
            listener: Mutex::new(Some(listener)),
            state: Mutex::new(SubscriptionState::Active),
        });
        let task = tokio::spawn(deliver(owner.clone(), snapshots, Arc::clone(&shared)));
        Self {
            owner,
            shared,
            task: Some(task),
        }
    }

    /// Identity whose collection this subscription follows.
    pub const fn owner(&self) -> &IdentityId {
        &self.owner
    }

    pub fn state(&self) -> SubscriptionState {
        self.shared.state().clone()
    }

    pub fn is_active(&self) -> bool {
        *self.shared.state() == SubscriptionState::Active
    }

    /// Stop deliveries and release the backend live query.
    pub fn close(&mut self) {
        // Waits for an in-flight delivery to finish.
        let listener = self.shared.listener().take();
        if let Some(task) = self.task.take() {
            task.abort();
        }

        if listener.is_some() {
            let mut state = self.shared.state();
            if *state == SubscriptionState::Active {
                *state = SubscriptionState::Closed;
            }
            tracing::debug!("Closed note subscription for {}", self.owner);
        }
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("owner", &self.owner)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

async fn deliver(owner: IdentityId, mut snapshots: SnapshotReceiver, shared: Arc<Shared>) {
    while let Some(message) = snapshots.recv().await {
        let mut slot = shared.listener();
        let Some(listener) = slot.as_mut() else {
            return;
        };

        match message {
            Ok(records) => {
                let notes = notes_from_snapshot(records);
                tracing::debug!("Delivering {} notes to {}", notes.len(), owner);
                listener.on_update(notes);
            }
            Err(error) => {
                fail(&owner, &shared, slot, &error);
                return;
            }
        }
    }

    let slot = shared.listener();
    if slot.is_some() {
        let error = Error::Subscription("live query ended unexpectedly".to_string());
        fail(&owner, &shared, slot, &error);
    }
}

fn fail(
    owner: &IdentityId,
    shared: &Shared,
    mut slot: MutexGuard<'_, Option<Box<dyn SnapshotListener>>>,
    error: &Error,
) {
    tracing::error!("Note subscription for {} failed: {}", owner, error);
    if let Some(mut listener) = slot.take() {
        listener.on_error(error);
    }
    *shared.state() = SubscriptionState::Failed(error.to_string());
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc;

    use super::*;
    use crate::testing::{channel_listener, eventually, next_delivery};

    #[tokio::test]
    async fn stream_ending_marks_subscription_failed() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (listener, mut notes) = channel_listener();
        let handle = SubscriptionHandle::spawn(IdentityId::new("ada"), rx, Box::new(listener));

        tx.send(Ok(Vec::new())).unwrap();
        assert!(next_delivery(&mut notes).await.is_empty());
        drop(tx);

        eventually(|| {
            let failed = matches!(handle.state(), SubscriptionState::Failed(_));
            async move { failed }
        })
        .await;
        assert!(!handle.is_active());
    }

    #[tokio::test]
    async fn close_before_first_snapshot_suppresses_delivery() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (listener, mut notes) = channel_listener();
        let mut handle = SubscriptionHandle::spawn(IdentityId::new("ada"), rx, Box::new(listener));

        handle.close();
        let _ = tx.send(Ok(Vec::new()));

        assert_eq!(notes.recv().await, None);
        assert_eq!(handle.state(), SubscriptionState::Closed);
    }
}
