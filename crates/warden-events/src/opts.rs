//! Options for opening an event.

use warden_models::Target;

use crate::error::{EventError, Result};

/// What a caller asks the manager to open.
///
/// For [`EventManager::new_event`](crate::EventManager::new_event), `kind` is
/// a permission name and `owner_token` is required. For
/// [`EventManager::new_internal`](crate::EventManager::new_internal), `kind`
/// names the system process and no token may be given.
#[derive(Debug, Clone)]
pub struct Opts {
    pub target: Target,
    pub kind: String,
    pub owner_token: Option<String>,
    pub custom_data: Option<serde_json::Value>,
}

impl Opts {
    pub fn new(target: Target, kind: impl Into<String>) -> Self {
        Self {
            target,
            kind: kind.into(),
            owner_token: None,
            custom_data: None,
        }
    }

    /// Sets the caller token the owner is resolved from.
    pub fn owner(mut self, token: impl Into<String>) -> Self {
        self.owner_token = Some(token.into());
        self
    }

    /// Attaches data recorded as the event's start custom data.
    pub fn custom_data(mut self, data: impl Into<serde_json::Value>) -> Self {
        self.custom_data = Some(data.into());
        self
    }

    /// Checks the fields every event needs.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.target.name.trim().is_empty() {
            return Err(EventError::Validation("event target is required".into()));
        }
        if self.kind.trim().is_empty() {
            return Err(EventError::Validation("event kind is required".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_sets_fields() {
        let opts = Opts::new(Target::new("app", "myapp"), "app.deploy")
            .owner("t0k3n")
            .custom_data(json!({"image": "v2"}));

        assert_eq!(opts.owner_token.as_deref(), Some("t0k3n"));
        assert_eq!(opts.custom_data, Some(json!({"image": "v2"})));
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_missing_target_or_kind() {
        let no_target = Opts::new(Target::new("", "myapp"), "app.deploy");
        assert!(matches!(no_target.validate(), Err(EventError::Validation(_))));

        let no_kind = Opts::new(Target::new("app", "myapp"), " ");
        assert!(matches!(no_kind.validate(), Err(EventError::Validation(_))));
    }
}
