//! Error types for event operations.

use thiserror::Error;
use warden_models::{EventId, FilterError, LockKey};
use warden_persistence::PersistenceError;

use crate::identity::IdentityError;

/// Errors that can occur during event operations.
#[derive(Error, Debug)]
pub enum EventError {
    /// No event matched the lookup.
    #[error("event not found: {0}")]
    NotFound(String),

    /// Another event of the same kind is running against the target.
    #[error("event locked: {key} is already running{}", holder_suffix(.holder))]
    LockConflict {
        key: LockKey,
        holder: Option<EventId>,
    },

    /// Creation options or filter are missing or malformed.
    #[error("validation error: {0}")]
    Validation(String),

    /// Event is in invalid state for operation.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The identity collaborator rejected the caller's token.
    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    /// Persistence error.
    #[error("store error: {0}")]
    Store(#[source] PersistenceError),
}

fn holder_suffix(holder: &Option<EventId>) -> String {
    holder
        .as_ref()
        .map(|id| format!(" as {id}"))
        .unwrap_or_default()
}

/// Discriminator for [`EventError`], for callers that branch on the class of
/// failure rather than its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    LockConflict,
    Validation,
    InvalidState,
    Identity,
    Store,
}

impl EventError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EventError::NotFound(_) => ErrorKind::NotFound,
            EventError::LockConflict { .. } => ErrorKind::LockConflict,
            EventError::Validation(_) => ErrorKind::Validation,
            EventError::InvalidState(_) => ErrorKind::InvalidState,
            EventError::Identity(_) => ErrorKind::Identity,
            EventError::Store(_) => ErrorKind::Store,
        }
    }
}

impl From<PersistenceError> for EventError {
    fn from(err: PersistenceError) -> Self {
        match err {
            PersistenceError::NotFound { id, .. } => EventError::NotFound(id),
            PersistenceError::Conflict { key, holder } => EventError::LockConflict { key, holder },
            PersistenceError::NotRunning { id } => {
                EventError::InvalidState(format!("event {id} is already done"))
            }
            PersistenceError::Filter(e) => EventError::Validation(e.to_string()),
            other => EventError::Store(other),
        }
    }
}

impl From<FilterError> for EventError {
    fn from(err: FilterError) -> Self {
        EventError::Validation(err.to_string())
    }
}

/// Result type alias for event operations.
pub type Result<T> = std::result::Result<T, EventError>;
