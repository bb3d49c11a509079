//! Authentication boundary and session state.
//!
//! Two external collaborators meet here: the interactive [`IdentityProvider`]
//! (issues an id token) and the [`CredentialBackend`] (turns that token into a
//! backend session and reports identity changes). [`SessionManager`] composes
//! them into the app-wide session state machine.

mod session;

use std::fmt;
use std::sync::Mutex;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::config::IdentityProviderConfig;
use crate::models::Identity;

pub use session::{SessionManager, SessionState, SignInOutcome, SignOutOutcome};

/// Failure conditions the identity provider distinguishes.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("sign-in was cancelled by the user")]
    Cancelled,
    #[error("a sign-in flow is already in progress")]
    InProgress,
    #[error("identity provider prerequisites are unavailable")]
    PrerequisitesUnavailable,
    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Identity provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("Invalid id token: {0}")]
    InvalidToken(String),
    #[error("Credential rejected: {0}")]
    CredentialRejected(String),
    #[error("Session storage error: {0}")]
    Storage(#[from] crate::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Result of the provider's interactive flow.
///
/// A flow that finishes without an id token did not produce anything the
/// backend can use and is treated like a cancellation.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct SignInResponse {
    pub id_token: Option<String>,
}

impl SignInResponse {
    pub fn with_id_token(id_token: impl Into<String>) -> Self {
        Self {
            id_token: Some(id_token.into()),
        }
    }
}

impl fmt::Debug for SignInResponse {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SignInResponse")
            .field("id_token", &self.id_token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Backend credential minted from a provider id token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    pub provider: String,
    pub token: String,
}

impl fmt::Debug for Credential {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Credential")
            .field("provider", &self.provider)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Interactive sign-in service (an OAuth-style identity provider).
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Apply client options once, before any sign-in.
    async fn configure(&self, _config: &IdentityProviderConfig) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Check that the platform services the flow depends on are present.
    async fn has_prerequisites(&self) -> Result<(), ProviderError>;

    async fn interactive_sign_in(&self) -> Result<SignInResponse, ProviderError>;

    async fn sign_out(&self) -> Result<(), ProviderError>;
}

/// Backend side of authentication.
#[async_trait]
pub trait CredentialBackend: Send + Sync {
    async fn exchange_token(&self, id_token: &str) -> AuthResult<Credential>;

    async fn authenticate_with_credential(&self, credential: Credential) -> AuthResult<Identity>;

    async fn invalidate_session(&self) -> AuthResult<()>;

    /// Register a persistent identity listener.
    ///
    /// The listener receives the current identity right away and every change
    /// after that. Dropping it deregisters it.
    fn on_identity_changed(&self) -> IdentityListener;
}

/// Receiving end of an identity-changed registration.
#[derive(Debug)]
pub struct IdentityListener {
    rx: mpsc::UnboundedReceiver<Option<Identity>>,
}

impl IdentityListener {
    /// Wait for the next report. `None` means the backend went away.
    pub async fn changed(&mut self) -> Option<Option<Identity>> {
        self.rx.recv().await
    }
}

/// Fan-out of identity changes to every registered listener.
///
/// Backends embed this to implement [`CredentialBackend::on_identity_changed`].
#[derive(Debug, Default)]
pub struct IdentityFanout {
    listeners: Mutex<Vec<mpsc::UnboundedSender<Option<Identity>>>>,
}

impl IdentityFanout {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener and immediately hand it `current`.
    pub fn register(&self, current: Option<Identity>) -> IdentityListener {
        let (tx, rx) = mpsc::unbounded_channel();
        // Receiver is alive right here, so this cannot fail.
        let _ = tx.send(current);
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.push(tx);
        }
        IdentityListener { rx }
    }

    /// Report a change to every live listener, pruning the ones that are gone.
    pub fn publish(&self, identity: &Option<Identity>) {
        if let Ok(mut listeners) = self.listeners.lock() {
            listeners.retain(|tx| tx.send(identity.clone()).is_ok());
        }
    }
}
