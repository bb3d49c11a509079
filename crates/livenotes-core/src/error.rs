//! Error types for livenotes-core

use thiserror::Error;

/// Result type alias using livenotes-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Note mutation that reached the backend and failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOp {
    Add,
    Update,
    Delete,
}

impl std::fmt::Display for WriteOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        };
        f.write_str(label)
    }
}

/// Errors that can occur in livenotes-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// A note write was rejected or failed at the backend
    #[error("Failed to {op} note: {source}")]
    Write {
        op: WriteOp,
        #[source]
        source: Box<Error>,
    },

    /// Note not found
    #[error("Note not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Live query failed; the subscription is closed
    #[error("Subscription error: {0}")]
    Subscription(String),

    /// Backend storage error without a more specific cause
    #[error("Backend error: {0}")]
    Backend(String),

    /// SQLite error
    #[error("SQLite error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    pub(crate) fn write(op: WriteOp, source: Self) -> Self {
        Self::Write {
            op,
            source: Box::new(source),
        }
    }

    /// True when the error (or the failed write's cause) is a missing note.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Write { source, .. } => source.is_not_found(),
            _ => false,
        }
    }
}
