//! Caller identity resolution.
//!
//! Authentication lives outside this crate. The manager only needs a way to
//! turn a caller's token into the user name recorded as an event's owner.

use std::collections::HashMap;
use std::sync::{RwLock, RwLockWriteGuard};

use thiserror::Error;

/// Errors raised while resolving a token.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("unknown or expired token")]
    UnknownToken,

    #[error("identity provider failure: {0}")]
    Provider(String),
}

/// Resolves a caller token to the user name it was issued to.
pub trait IdentityResolver: Send + Sync {
    fn resolve(&self, token: &str) -> Result<String, IdentityError>;
}

/// In-memory token table.
#[derive(Debug, Default)]
pub struct TokenTable {
    tokens: RwLock<HashMap<String, String>>,
}

impl TokenTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<String, String>>, IdentityError> {
        self.tokens
            .write()
            .map_err(|e| IdentityError::Provider(e.to_string()))
    }

    /// Issues `token` to `user`, replacing any previous holder.
    pub fn insert(
        &self,
        token: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<(), IdentityError> {
        self.write()?.insert(token.into(), user.into());
        Ok(())
    }

    /// Revokes `token`. Returns true if it was known.
    pub fn revoke(&self, token: &str) -> Result<bool, IdentityError> {
        Ok(self.write()?.remove(token).is_some())
    }
}

impl IdentityResolver for TokenTable {
    fn resolve(&self, token: &str) -> Result<String, IdentityError> {
        let tokens = self
            .tokens
            .read()
            .map_err(|e| IdentityError::Provider(e.to_string()))?;
        tokens.get(token).cloned().ok_or(IdentityError::UnknownToken)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_token() {
        let table = TokenTable::new();
        table.insert("t0k3n", "me@me.com").unwrap();
        assert_eq!(table.resolve("t0k3n").unwrap(), "me@me.com");
    }

    #[test]
    fn test_revoked_token_is_unknown() {
        let table = TokenTable::new();
        table.insert("t0k3n", "me@me.com").unwrap();

        assert!(table.revoke("t0k3n").unwrap());
        assert!(!table.revoke("t0k3n").unwrap());
        assert_eq!(table.resolve("t0k3n"), Err(IdentityError::UnknownToken));
    }

    #[test]
    fn test_poisoned_table_reports_provider_error() {
        let table = std::sync::Arc::new(TokenTable::new());
        let poisoner = table.clone();
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.tokens.write().unwrap();
            panic!("poison the token table");
        })
        .join();

        assert!(matches!(table.insert("t0k3n", "me"), Err(IdentityError::Provider(_))));
        assert!(matches!(table.revoke("t0k3n"), Err(IdentityError::Provider(_))));
        assert!(matches!(table.resolve("t0k3n"), Err(IdentityError::Provider(_))));
    }
}
