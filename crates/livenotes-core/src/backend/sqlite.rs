//! Persistent local backend on SQLite.
//!
//! Live queries re-run after writes made through this backend and poll
//! `PRAGMA data_version` to notice writes committed by other processes that
//! share the file.

use std::path::Path;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time::MissedTickBehavior;

use super::{
    claims_from_credential, exchange_local_token, NoteCollection, RawNoteRecord, Snapshot,
    SnapshotReceiver, SnapshotSender,
};
use crate::auth::{AuthResult, Credential, CredentialBackend, IdentityFanout, IdentityListener};
use crate::db::Database;
use crate::models::{Identity, IdentityId, NoteId};
use crate::util::unix_timestamp_millis;
use crate::{Error, Result};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

pub struct SqliteBackend {
    db: Arc<Mutex<Database>>,
    local_changes: watch::Sender<u64>,
    identities: IdentityFanout,
    current: StdMutex<Option<Identity>>,
    poll_interval: Duration,
}

impl SqliteBackend {
    /// Open (or create) the backend file and restore the persisted session.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_database(Database::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_database(Database::open_in_memory()?)
    }

    fn from_database(db: Database) -> Result<Self> {
        let current = load_session_identity(&db)?;
        if let Some(identity) = &current {
            tracing::info!("Restored session for {}", identity.id);
        }
        let (local_changes, _) = watch::channel(0);
        Ok(Self {
            db: Arc::new(Mutex::new(db)),
            local_changes,
            identities: IdentityFanout::new(),
            current: StdMutex::new(current),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    /// How often live queries check for writes from other processes.
    #[must_use]
    pub const fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Identity of the persisted session, if any.
    pub fn current_identity(&self) -> Option<Identity> {
        self.current.lock().ok().and_then(|current| current.clone())
    }

    fn set_current(&self, identity: Option<Identity>) {
        if let Ok(mut current) = self.current.lock() {
            current.clone_from(&identity);
        }
        self.identities.publish(&identity);
    }

    fn notify_local_change(&self) {
        self.local_changes.send_modify(|version| *version = version.wrapping_add(1));
    }
}

#[async_trait]
impl NoteCollection for SqliteBackend {
    async fn create(&self, owner: &IdentityId, text: &str) -> Result<NoteId> {
        let id = NoteId::generate();
        {
            let db = self.db.lock().await;
            let now = unix_timestamp_millis();
            db.connection().execute(
                "INSERT INTO notes (id, owner_id, text, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
                params![id.as_str(), owner.as_str(), text, now, now],
            )?;
        }
        self.notify_local_change();
        Ok(id)
    }

    async fn update(&self, owner: &IdentityId, id: &NoteId, text: &str) -> Result<()> {
        let rows = {
            let db = self.db.lock().await;
            db.connection().execute(
                "UPDATE notes SET text = ?, updated_at = ? WHERE id = ? AND owner_id = ?",
                params![text, unix_timestamp_millis(), id.as_str(), owner.as_str()],
            )?
        };
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.notify_local_change();
        Ok(())
    }

    async fn delete(&self, owner: &IdentityId, id: &NoteId) -> Result<()> {
        let rows = {
            let db = self.db.lock().await;
            db.connection().execute(
                "DELETE FROM notes WHERE id = ? AND owner_id = ?",
                params![id.as_str(), owner.as_str()],
            )?
        };
        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }
        self.notify_local_change();
        Ok(())
    }

    async fn live_query(&self, owner: &IdentityId) -> Result<SnapshotReceiver> {
        // Subscribe first so a write racing the initial query still wakes the task.
        let local_changes = self.local_changes.subscribe();
        let (tx, rx) = mpsc::unbounded_channel();
        let (initial, data_version) = {
            let db = self.db.lock().await;
            (query_snapshot(&db, owner)?, db.data_version()?)
        };
        let _ = tx.send(Ok(initial.clone()));

        let query = LiveQuery {
            db: Arc::clone(&self.db),
            owner: owner.clone(),
            tx,
            local_changes,
            poll_interval: self.poll_interval,
            last_snapshot: initial,
            last_data_version: data_version,
        };
        tokio::spawn(query.run());
        Ok(rx)
    }
}

#[async_trait]
impl CredentialBackend for SqliteBackend {
    async fn exchange_token(&self, id_token: &str) -> AuthResult<Credential> {
        exchange_local_token(id_token)
    }

    async fn authenticate_with_credential(&self, credential: Credential) -> AuthResult<Identity> {
        let claims = claims_from_credential(&credential)?;
        let identity = {
            let db = self.db.lock().await;
            let conn = db.connection();
            let id = claims.sub.trim();
            let now = unix_timestamp_millis();

            let created_at: Option<i64> = conn
                .query_row(
                    "SELECT created_at FROM accounts WHERE id = ?",
                    params![id],
                    |row| row.get(0),
                )
                .optional()
                .map_err(Error::from)?;
            let identity = claims.to_identity(created_at.unwrap_or(now));

            conn.execute(
                "INSERT INTO accounts (id, display_name, email, avatar_url, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT(id) DO UPDATE SET
                    display_name = excluded.display_name,
                    email = excluded.email,
                    avatar_url = excluded.avatar_url",
                params![
                    identity.id.as_str(),
                    identity.display_name,
                    identity.email,
                    identity.avatar_url,
                    created_at.unwrap_or(now),
                ],
            )
            .map_err(Error::from)?;
            conn.execute(
                "INSERT OR REPLACE INTO session (slot, account_id, signed_in_at) VALUES (1, ?, ?)",
                params![identity.id.as_str(), now],
            )
            .map_err(Error::from)?;
            identity
        };

        tracing::info!("Authenticated {}", identity.id);
        self.set_current(Some(identity.clone()));
        Ok(identity)
    }

    async fn invalidate_session(&self) -> AuthResult<()> {
        {
            let db = self.db.lock().await;
            db.connection()
                .execute("DELETE FROM session", [])
                .map_err(Error::from)?;
        }
        self.set_current(None);
        Ok(())
    }

    fn on_identity_changed(&self) -> IdentityListener {
        self.identities.register(self.current_identity())
    }
}

struct LiveQuery {
    db: Arc<Mutex<Database>>,
    owner: IdentityId,
    tx: SnapshotSender,
    local_changes: watch::Receiver<u64>,
    poll_interval: Duration,
    last_snapshot: Snapshot,
    last_data_version: i64,
}

impl LiveQuery {
    async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        ticker.tick().await;

        loop {
            let local_write = tokio::select! {
                () = self.tx.closed() => break,
                changed = self.local_changes.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    true
                }
                _ = ticker.tick() => false,
            };

            match self.refresh(local_write).await {
                Ok(Some(snapshot)) => {
                    if self.tx.send(Ok(snapshot)).is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(error) => {
                    tracing::error!("Live query for {} failed: {}", self.owner, error);
                    let _ = self.tx.send(Err(Error::Subscription(error.to_string())));
                    break;
                }
            }
        }
        tracing::debug!("Live query for {} closed", self.owner);
    }

    /// Re-run the query; `None` when nothing visible changed.
    ///
    /// Poll ticks skip the query unless another connection committed.
    async fn refresh(&mut self, local_write: bool) -> Result<Option<Snapshot>> {
        let db = self.db.lock().await;
        let data_version = db.data_version()?;
        if !local_write && data_version == self.last_data_version {
            return Ok(None);
        }
        self.last_data_version = data_version;
        let snapshot = query_snapshot(&db, &self.owner)?;
        drop(db);

        if snapshot == self.last_snapshot {
            return Ok(None);
        }
        self.last_snapshot.clone_from(&snapshot);
        Ok(Some(snapshot))
    }
}

fn query_snapshot(db: &Database, owner: &IdentityId) -> Result<Snapshot> {
    let mut stmt = db.connection().prepare(
        "SELECT id, text, created_at, updated_at
         FROM notes
         WHERE owner_id = ?
         ORDER BY created_at DESC, rowid DESC",
    )?;

    let records = stmt
        .query_map(params![owner.as_str()], |row| {
            Ok(RawNoteRecord {
                id: NoteId::new(row.get::<_, String>(0)?),
                text: row.get(1)?,
                created_at: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(records)
}

fn load_session_identity(db: &Database) -> Result<Option<Identity>> {
    let identity = db
        .connection()
        .query_row(
            "SELECT a.id, a.display_name, a.email, a.avatar_url, a.created_at
             FROM session s
             JOIN accounts a ON a.id = s.account_id
             WHERE s.slot = 1",
            [],
            |row| {
                Ok(Identity {
                    id: IdentityId::new(row.get::<_, String>(0)?),
                    display_name: row.get(1)?,
                    email: row.get(2)?,
                    avatar_url: row.get(3)?,
                    created_at: row.get(4)?,
                })
            },
        )
        .optional()?;
    Ok(identity)
}
