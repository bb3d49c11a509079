//! Backend document collection boundary.
//!
//! A [`NoteCollection`] is the managed document store holding one private
//! note collection per identity. It assigns ids and timestamps, orders live
//! query results, and pushes a fresh snapshot after every change.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::auth::{AuthError, AuthResult, Credential};
use crate::models::{Identity, IdentityId, NoteId};
use crate::Result;

pub use memory::MemoryBackend;
pub use sqlite::SqliteBackend;

/// Provider name stamped on credentials minted from local id tokens.
pub const LOCAL_PROVIDER: &str = "local";

const LOCAL_TOKEN_PREFIX: &str = "lnid:";

/// A note document exactly as the backend reports it.
///
/// Timestamps are `None` while a server-assigned value is still pending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNoteRecord {
    pub id: NoteId,
    pub text: String,
    pub created_at: Option<i64>,
    pub updated_at: Option<i64>,
}

/// Full result set of a live query, newest first.
pub type Snapshot = Vec<RawNoteRecord>;

/// Live query stream. Dropping it closes the query.
pub type SnapshotReceiver = mpsc::UnboundedReceiver<Result<Snapshot>>;
pub type SnapshotSender = mpsc::UnboundedSender<Result<Snapshot>>;

#[async_trait]
pub trait NoteCollection: Send + Sync {
    /// Store a new note; the backend assigns id, `created_at` and `updated_at`.
    async fn create(&self, owner: &IdentityId, text: &str) -> Result<NoteId>;

    /// Replace the text and refresh `updated_at`.
    async fn update(&self, owner: &IdentityId, id: &NoteId, text: &str) -> Result<()>;

    async fn delete(&self, owner: &IdentityId, id: &NoteId) -> Result<()>;

    /// Open a live query ordered by `created_at` descending.
    ///
    /// The first message is the current result set; each later message is
    /// the complete result set after a change. An `Err` ends the query.
    async fn live_query(&self, owner: &IdentityId) -> Result<SnapshotReceiver>;
}

/// Claims carried by the id tokens local backends understand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdTokenClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl IdTokenClaims {
    pub fn new(sub: impl Into<String>) -> Self {
        Self {
            sub: sub.into(),
            name: None,
            email: None,
            picture: None,
        }
    }

    /// Serialize into an unsigned local id token.
    pub fn encode(&self) -> AuthResult<String> {
        let payload = serde_json::to_string(self).map_err(crate::Error::from)?;
        Ok(format!("{LOCAL_TOKEN_PREFIX}{payload}"))
    }

    pub fn decode(token: &str) -> AuthResult<Self> {
        let payload = token
            .trim()
            .strip_prefix(LOCAL_TOKEN_PREFIX)
            .ok_or_else(|| AuthError::InvalidToken("unrecognized token format".to_string()))?;
        let claims: Self = serde_json::from_str(payload)
            .map_err(|error| AuthError::InvalidToken(error.to_string()))?;
        if claims.sub.trim().is_empty() {
            return Err(AuthError::InvalidToken("subject must not be empty".to_string()));
        }
        Ok(claims)
    }

    /// Identity for these claims on an account created at `created_at`.
    pub fn to_identity(&self, created_at: i64) -> Identity {
        Identity {
            id: IdentityId::new(self.sub.trim()),
            display_name: self.name.clone(),
            email: self.email.clone(),
            avatar_url: self.picture.clone(),
            created_at: Some(created_at),
        }
    }
}

/// Validate an id token and wrap it as a local credential.
pub(crate) fn exchange_local_token(id_token: &str) -> AuthResult<Credential> {
    IdTokenClaims::decode(id_token)?;
    Ok(Credential {
        provider: LOCAL_PROVIDER.to_string(),
        token: id_token.trim().to_string(),
    })
}

pub(crate) fn claims_from_credential(credential: &Credential) -> AuthResult<IdTokenClaims> {
    if credential.provider != LOCAL_PROVIDER {
        return Err(AuthError::CredentialRejected(format!(
            "unsupported provider '{}'",
            credential.provider
        )));
    }
    IdTokenClaims::decode(&credential.token)
}

/// Order records newest first; pending timestamps sort as newest.
pub(crate) fn sort_newest_first(records: &mut [RawNoteRecord]) {
    records.sort_by(|left, right| {
        let left_key = left.created_at.unwrap_or(i64::MAX);
        let right_key = right.created_at.unwrap_or(i64::MAX);
        right_key.cmp(&left_key)
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_token_decodes_what_it_encodes() {
        let mut claims = IdTokenClaims::new("ada");
        claims.email = Some("ada@example.com".to_string());
        let token = claims.encode().unwrap();
        assert_eq!(IdTokenClaims::decode(&token).unwrap(), claims);
    }

    #[test]
    fn decode_rejects_foreign_tokens() {
        assert!(matches!(
            IdTokenClaims::decode("eyJhbGciOi"),
            Err(AuthError::InvalidToken(_))
        ));
        assert!(matches!(
            IdTokenClaims::decode(r#"lnid:{"sub":"  "}"#),
            Err(AuthError::InvalidToken(_))
        ));
    }

    #[test]
    fn credential_from_other_provider_is_rejected() {
        let credential = Credential {
            provider: "google.com".to_string(),
            token: "lnid:{}".to_string(),
        };
        assert!(matches!(
            claims_from_credential(&credential),
            Err(AuthError::CredentialRejected(_))
        ));
    }

    #[test]
    fn pending_records_sort_first() {
        let record = |id: &str, created_at: Option<i64>| RawNoteRecord {
            id: NoteId::new(id),
            text: id.to_string(),
            created_at,
            updated_at: created_at,
        };
        let mut records = vec![record("old", Some(1)), record("pending", None), record("new", Some(5))];
        sort_newest_first(&mut records);
        let ids = records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["pending", "new", "old"]);
    }
}
