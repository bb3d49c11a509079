//! Wiring of the session manager and note channel for one CLI invocation.

use std::path::Path;
use std::sync::Arc;

use livenotes_core::auth::{CredentialBackend, IdentityProvider};
use livenotes_core::backend::{NoteCollection, SqliteBackend};
use livenotes_core::config::ClientConfig;
use livenotes_core::navigation::{resolve_route, Route, RouteDecision};
use livenotes_core::notify::{Notice, Notifier, TITLE_ERROR};
use livenotes_core::{Identity, NoteSyncChannel, SessionManager, SessionState};

use crate::error::CliError;
use crate::notifier::StderrNotifier;
use crate::provider::TerminalIdentityProvider;

pub struct App {
    pub session: SessionManager,
    pub notes: NoteSyncChannel,
    notifier: Arc<dyn Notifier>,
}

impl App {
    /// Open the local database at `db_path` and start the session.
    pub async fn open(config: &ClientConfig, db_path: &Path) -> Result<Self, CliError> {
        let backend = Arc::new(SqliteBackend::open(db_path)?);
        Self::with_parts(
            config,
            Arc::new(TerminalIdentityProvider::new()),
            backend,
            Arc::new(StderrNotifier),
        )
        .await
    }

    pub async fn with_parts<B>(
        config: &ClientConfig,
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<B>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self, CliError>
    where
        B: NoteCollection + CredentialBackend + 'static,
    {
        let session = SessionManager::start(
            &config.identity,
            provider,
            backend.clone(),
            Arc::clone(&notifier),
        )
        .await?;
        Ok(Self {
            session,
            notes: NoteSyncChannel::new(backend),
            notifier,
        })
    }

    /// Identity of the settled session, or `NotSignedIn`.
    pub async fn require_identity(&self) -> Result<Identity, CliError> {
        let state = self.session.wait_until_ready().await;
        match (resolve_route(&state, Route::Notes), state) {
            (RouteDecision::Stay, SessionState::Authenticated(identity)) => Ok(identity),
            _ => Err(CliError::NotSignedIn),
        }
    }

    /// Show `message` to the user as an error notice.
    pub fn report(&self, message: &str) {
        self.notifier.notify(Notice::error(TITLE_ERROR, message));
    }

    /// Tell the user about something that is not a failure.
    pub fn inform(&self, title: &str, message: &str) {
        self.notifier.notify(Notice::info(title, message));
    }
}
