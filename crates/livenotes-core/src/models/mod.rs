//! Data models for livenotes

mod identity;
mod note;

pub use identity::{Identity, IdentityId};
pub use note::{note_count_label, Note, NoteId};
