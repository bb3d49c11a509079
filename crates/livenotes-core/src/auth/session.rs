//! Session Manager: the single owner of the current identity.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::{
    AuthError, AuthResult, CredentialBackend, IdentityListener, IdentityProvider, ProviderError,
};
use crate::config::IdentityProviderConfig;
use crate::models::Identity;
use crate::notify::{
    Notice, Notifier, MSG_PREREQUISITES_UNAVAILABLE, MSG_SIGN_IN_FAILED, MSG_SIGN_OUT_FAILED,
    TITLE_ERROR, TITLE_SIGN_IN_FAILED,
};

/// Session lifecycle.
///
/// Identity and loading flag are both derived from this one value, so
/// observers never see one updated without the other.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// No identity report from the backend yet
    #[default]
    Initializing,
    Unauthenticated,
    Authenticated(Identity),
}

impl SessionState {
    pub const fn identity(&self) -> Option<&Identity> {
        match self {
            Self::Authenticated(identity) => Some(identity),
            Self::Initializing | Self::Unauthenticated => None,
        }
    }

    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Initializing)
    }

    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }
}

impl From<Option<Identity>> for SessionState {
    fn from(identity: Option<Identity>) -> Self {
        identity.map_or(Self::Unauthenticated, Self::Authenticated)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => f.write_str("initializing"),
            Self::Unauthenticated => f.write_str("unauthenticated"),
            Self::Authenticated(identity) => write!(f, "authenticated({})", identity.id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInOutcome {
    SignedIn(Identity),
    Cancelled,
    AlreadyInProgress,
    PrerequisitesUnavailable,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignOutOutcome {
    SignedOut,
    Failed(String),
}

struct Inner {
    state: watch::Sender<SessionState>,
    provider: Arc<dyn IdentityProvider>,
    backend: Arc<dyn CredentialBackend>,
    notifier: Arc<dyn Notifier>,
    sign_in_in_flight: AtomicBool,
}

impl Inner {
    fn publish(&self, next: SessionState) {
        self.state.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            tracing::info!("Session state: {} -> {}", current, next);
            *current = next;
            true
        });
    }
}

/// Owns the current [`SessionState`] and mediates sign-in/sign-out.
///
/// One instance lives for the whole process. [`SessionManager::start`] is the
/// explicit initialization step; dropping the manager (or calling
/// [`SessionManager::shutdown`]) deregisters the identity listener.
pub struct SessionManager {
    inner: Arc<Inner>,
    listener_task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionManager {
    /// Configure the provider and register the persistent identity listener.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(
        config: &IdentityProviderConfig,
        provider: Arc<dyn IdentityProvider>,
        backend: Arc<dyn CredentialBackend>,
        notifier: Arc<dyn Notifier>,
    ) -> AuthResult<Self> {
        provider.configure(config).await?;

        let (state, _) = watch::channel(SessionState::Initializing);
        let inner = Arc::new(Inner {
            state,
            provider,
            backend,
            notifier,
            sign_in_in_flight: AtomicBool::new(false),
        });

        let listener = inner.backend.on_identity_changed();
        let listener_task = tokio::spawn(run_identity_listener(Arc::clone(&inner), listener));
        tracing::debug!("Session manager started");

        Ok(Self {
            inner,
            listener_task: Mutex::new(Some(listener_task)),
        })
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> SessionState {
        self.inner.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.inner.state.borrow().identity().cloned()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.state.borrow().is_loading()
    }

    /// Observe state transitions.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.inner.state.subscribe()
    }

    /// Wait for the first identity report and return the settled state.
    pub async fn wait_until_ready(&self) -> SessionState {
        let mut rx = self.inner.state.subscribe();
        // The sender lives in `self.inner`, so the channel cannot close here.
        let settled = rx
            .wait_for(|state| !state.is_loading())
            .await
            .map(|state| state.clone());
        settled.unwrap_or_else(|_| self.state())
    }

    /// Run the interactive sign-in flow and establish a backend session.
    ///
    /// Never returns an error: cancellations are logged, everything else the
    /// user should know about goes through the notifier. State only changes
    /// on success.
    pub async fn sign_in(&self) -> SignInOutcome {
        let Some(_guard) = InFlightGuard::acquire(&self.inner.sign_in_in_flight) else {
            tracing::info!("Sign-in already in progress");
            return SignInOutcome::AlreadyInProgress;
        };
        // A report still queued from before sign-in would overwrite its result.
        self.wait_until_ready().await;

        match self.run_sign_in().await {
            Ok(Some(identity)) => {
                self.inner
                    .publish(SessionState::Authenticated(identity.clone()));
                SignInOutcome::SignedIn(identity)
            }
            Ok(None) | Err(AuthError::Provider(ProviderError::Cancelled)) => {
                tracing::info!("Sign-in cancelled");
                SignInOutcome::Cancelled
            }
            Err(AuthError::Provider(ProviderError::InProgress)) => {
                tracing::info!("Sign-in already in progress");
                SignInOutcome::AlreadyInProgress
            }
            Err(AuthError::Provider(ProviderError::PrerequisitesUnavailable)) => {
                tracing::warn!("Sign-in prerequisites are unavailable");
                self.inner
                    .notifier
                    .notify(Notice::error(TITLE_ERROR, MSG_PREREQUISITES_UNAVAILABLE));
                SignInOutcome::PrerequisitesUnavailable
            }
            Err(error) => {
                tracing::error!("Sign-in error: {}", error);
                self.inner
                    .notifier
                    .notify(Notice::error(TITLE_SIGN_IN_FAILED, MSG_SIGN_IN_FAILED));
                SignInOutcome::Failed(error.to_string())
            }
        }
    }

    async fn run_sign_in(&self) -> AuthResult<Option<Identity>> {
        self.inner.provider.has_prerequisites().await?;

        let response = self.inner.provider.interactive_sign_in().await?;
        let Some(id_token) = response.id_token else {
            return Ok(None);
        };

        let credential = self.inner.backend.exchange_token(&id_token).await?;
        let identity = self
            .inner
            .backend
            .authenticate_with_credential(credential)
            .await?;
        Ok(Some(identity))
    }

    /// Sign out of the provider, then drop the backend session.
    ///
    /// On failure the state is unchanged and the call can be retried.
    pub async fn sign_out(&self) -> SignOutOutcome {
        match self.run_sign_out().await {
            Ok(()) => {
                self.inner.publish(SessionState::Unauthenticated);
                SignOutOutcome::SignedOut
            }
            Err(error) => {
                tracing::error!("Sign-out error: {}", error);
                self.inner
                    .notifier
                    .notify(Notice::error(TITLE_ERROR, MSG_SIGN_OUT_FAILED));
                SignOutOutcome::Failed(error.to_string())
            }
        }
    }

    async fn run_sign_out(&self) -> AuthResult<()> {
        self.inner.provider.sign_out().await?;
        self.inner.backend.invalidate_session().await
    }

    /// Deregister the identity listener. Later backend reports are ignored.
    pub fn shutdown(&self) {
        let task = self
            .listener_task
            .lock()
            .ok()
            .and_then(|mut listener_task| listener_task.take());
        if let Some(task) = task {
            task.abort();
            tracing::debug!("Session manager stopped");
        }
    }
}

impl Drop for SessionManager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn run_identity_listener(inner: Arc<Inner>, mut listener: IdentityListener) {
    while let Some(identity) = listener.changed().await {
        inner.publish(SessionState::from(identity));
    }
    tracing::debug!("Identity listener closed by backend");
}

struct InFlightGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        if flag.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Self { flag })
        }
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
