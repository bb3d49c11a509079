//! livenotes-core - Core library for livenotes
//!
//! Session state for a signed-in user and a live, ordered view of that
//! user's notes, on top of pluggable identity provider and backend
//! boundaries. Shared by every livenotes front end.

pub mod auth;
pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod sync;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;

pub use auth::{SessionManager, SessionState, SignInOutcome, SignOutOutcome};
pub use error::{Error, Result, WriteOp};
pub use models::{Identity, IdentityId, Note, NoteId};
pub use sync::{NoteSyncChannel, SubscriptionHandle};
