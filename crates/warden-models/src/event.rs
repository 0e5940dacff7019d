//! Event records and the value types they reference.
//!
//! An event is the audit record of one mutating operation against a managed
//! resource. Field names in the serialized form are a stable contract read by
//! reporting tools; see the `serde` attributes on [`Event`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::EventId;

/// Identity of the resource an event concerns.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Target {
    /// Resource class, e.g. `app` or `node`.
    pub name: String,
    /// Resource instance within the class.
    pub value: String,
}

impl Target {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// A target naming only a resource class, used as a filter.
    pub fn class(name: impl Into<String>) -> Self {
        Self::new(name, "")
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.value)
    }
}

/// Where an event kind comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KindType {
    /// A permission from the kind catalog, e.g. `app.update.env.set`.
    Permission,
    /// A free-form system process name, e.g. `healer`.
    Internal,
}

/// Classification of the operation an event records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Kind {
    #[serde(rename = "type")]
    pub kind_type: KindType,
    pub name: String,
}

impl Kind {
    pub fn permission(name: impl Into<String>) -> Self {
        Self {
            kind_type: KindType::Permission,
            name: name.into(),
        }
    }

    pub fn internal(name: impl Into<String>) -> Self {
        Self {
            kind_type: KindType::Internal,
            name: name.into(),
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// Who started an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    User,
    Internal,
}

/// Actor that initiated an event. Internal owners carry an empty name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Owner {
    #[serde(rename = "type")]
    pub owner_type: OwnerType,
    pub name: String,
}

impl Owner {
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            owner_type: OwnerType::User,
            name: name.into(),
        }
    }

    pub fn internal() -> Self {
        Self {
            owner_type: OwnerType::Internal,
            name: String::new(),
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.owner_type {
            OwnerType::User => write!(f, "user:{}", self.name),
            OwnerType::Internal => f.write_str("internal"),
        }
    }
}

/// Key of the running lock: at most one running event exists per key.
///
/// Kind names are full catalog names or process names, so the kind type is
/// not part of the key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockKey {
    pub target: Target,
    pub kind_name: String,
}

impl LockKey {
    pub fn new(target: &Target, kind_name: &str) -> Self {
        Self {
            target: target.clone(),
            kind_name: kind_name.to_string(),
        }
    }
}

impl fmt::Display for LockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.target, self.kind_name)
    }
}

/// Fields written when an event completes.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub end_time: DateTime<Utc>,
    pub error: Option<String>,
    pub end_custom_data: Option<serde_json::Value>,
    pub log: String,
}

/// A persisted event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Creation-ordered unique identifier.
    #[serde(rename = "uniqueid")]
    pub unique_id: EventId,

    pub target: Target,

    pub kind: Kind,

    pub owner: Owner,

    #[serde(rename = "starttime")]
    pub start_time: DateTime<Utc>,

    /// Set exactly once, when the event completes.
    #[serde(rename = "endtime", default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,

    pub running: bool,

    /// Failure message; absent means the operation succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Set when the target resource has been deleted.
    #[serde(default)]
    pub removed: bool,

    #[serde(rename = "startcustomdata", default, skip_serializing_if = "Option::is_none")]
    pub start_custom_data: Option<serde_json::Value>,

    #[serde(rename = "endcustomdata", default, skip_serializing_if = "Option::is_none")]
    pub end_custom_data: Option<serde_json::Value>,

    /// Free-form progress log, persisted at completion.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub log: String,
}

impl Event {
    /// Creates a running event started now.
    pub fn started(target: Target, kind: Kind, owner: Owner) -> Self {
        Self {
            unique_id: EventId::new(),
            target,
            kind,
            owner,
            start_time: Utc::now(),
            end_time: None,
            running: true,
            error: None,
            removed: false,
            start_custom_data: None,
            end_custom_data: None,
            log: String::new(),
        }
    }

    /// Key of the running lock this event holds while running.
    pub fn lock_key(&self) -> LockKey {
        LockKey::new(&self.target, &self.kind.name)
    }

    /// Appends a line to the event log.
    pub fn log(&mut self, line: impl AsRef<str>) {
        self.log.push_str(line.as_ref());
        if !self.log.ends_with('\n') {
            self.log.push('\n');
        }
    }

    /// Applies completion fields, clearing the running flag.
    pub fn complete(&mut self, completion: &Completion) {
        self.running = false;
        self.end_time = Some(completion.end_time);
        self.error = completion.error.clone();
        self.end_custom_data = completion.end_custom_data.clone();
        self.log = completion.log.clone();
    }

    /// True if the event completed with an error.
    pub fn failed(&self) -> bool {
        self.error.is_some()
    }

    /// Elapsed time between start and end; `None` while running.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.end_time.map(|end| end - self.start_time)
    }
}
