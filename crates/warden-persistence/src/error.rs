//! Error types for persistence operations.

use std::path::PathBuf;

use thiserror::Error;
use warden_models::{EventId, FilterError, LockKey};

/// Errors that can occur during persistence operations.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// Failed to read from file system.
    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to write to file system.
    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to serialize or parse a record.
    #[error("failed to serialize: {0}")]
    SerializeError(#[from] serde_json::Error),

    /// Failed to create directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Item not found.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Another running event holds the lock key.
    #[error("lock {key} is held by {}", holder_name(.holder))]
    Conflict {
        key: LockKey,
        holder: Option<EventId>,
    },

    /// Conditional completion found the event already completed.
    #[error("event {id} is not running")]
    NotRunning { id: EventId },

    /// The filter could not be evaluated.
    #[error("invalid filter: {0}")]
    Filter(#[from] FilterError),

    /// Invalid data.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Lock poisoned (thread panicked while holding lock).
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

fn holder_name(holder: &Option<EventId>) -> &str {
    holder
        .as_ref()
        .map(EventId::as_str)
        .unwrap_or("an event still being created")
}

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, PersistenceError>;
