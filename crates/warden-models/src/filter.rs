//! Event filtering, sorting and pagination.
//!
//! Every dimension of an [`EventFilter`] is optional and they are AND-combined.
//! Stores evaluate a filter with [`EventFilter::select`], which applies the
//! predicate, the sort order, and the `after`/`skip`/`limit` window in that
//! order.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::event::{Event, KindType, OwnerType, Target};
use crate::ids::EventId;

/// Errors raised by malformed filters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("unknown sort field: {0}")]
    UnknownSortField(String),

    #[error("cursor pagination requires sorting by unique id, got {0}")]
    CursorRequiresIdSort(String),

    #[error("target filter needs a target name")]
    EmptyTargetName,
}

/// Fields events can be sorted by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    UniqueId,
    StartTime,
    EndTime,
    TargetName,
    TargetValue,
    KindName,
    OwnerName,
    Running,
}

impl SortField {
    fn as_str(&self) -> &'static str {
        match self {
            SortField::UniqueId => "_id",
            SortField::StartTime => "starttime",
            SortField::EndTime => "endtime",
            SortField::TargetName => "target.name",
            SortField::TargetValue => "target.value",
            SortField::KindName => "kind.name",
            SortField::OwnerName => "owner.name",
            SortField::Running => "running",
        }
    }

    fn compare(&self, a: &Event, b: &Event) -> Ordering {
        match self {
            SortField::UniqueId => a.unique_id.cmp(&b.unique_id),
            SortField::StartTime => a.start_time.cmp(&b.start_time),
            SortField::EndTime => a.end_time.cmp(&b.end_time),
            SortField::TargetName => a.target.name.cmp(&b.target.name),
            SortField::TargetValue => a.target.value.cmp(&b.target.value),
            SortField::KindName => a.kind.name.cmp(&b.kind.name),
            SortField::OwnerName => a.owner.name.cmp(&b.owner.name),
            SortField::Running => a.running.cmp(&b.running),
        }
    }
}

/// Parsed sort order: a field and a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub field: SortField,
    pub descending: bool,
}

impl Default for Sort {
    fn default() -> Self {
        Self {
            field: SortField::UniqueId,
            descending: false,
        }
    }
}

impl FromStr for Sort {
    type Err = FilterError;

    /// Parses `field` or `-field`. `_id` and `uniqueid` both name the id.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (descending, name) = match s.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, s),
        };
        let field = match name {
            "_id" | "uniqueid" => SortField::UniqueId,
            "starttime" => SortField::StartTime,
            "endtime" => SortField::EndTime,
            "target.name" => SortField::TargetName,
            "target.value" => SortField::TargetValue,
            "kind.name" => SortField::KindName,
            "owner.name" => SortField::OwnerName,
            "running" => SortField::Running,
            _ => return Err(FilterError::UnknownSortField(s.to_string())),
        };
        Ok(Self { field, descending })
    }
}

impl fmt::Display for Sort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.descending {
            f.write_str("-")?;
        }
        f.write_str(self.field.as_str())
    }
}

impl Sort {
    /// Total order: the sort field, then ascending unique id.
    pub fn compare(&self, a: &Event, b: &Event) -> Ordering {
        let primary = self.field.compare(a, b);
        let primary = if self.descending {
            primary.reverse()
        } else {
            primary
        };
        primary.then_with(|| a.unique_id.cmp(&b.unique_id))
    }
}

/// Filter criteria for querying events.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Target class; an empty `value` matches every instance of the class.
    pub target: Option<Target>,
    pub kind_type: Option<KindType>,
    pub kind_name: Option<String>,
    pub owner_type: Option<OwnerType>,
    pub owner_name: Option<String>,
    /// `Some(true)` only running, `Some(false)` only completed.
    pub running: Option<bool>,
    /// Only completed events that recorded an error.
    pub error_only: bool,
    /// Inclusive lower bound on start time.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on start time.
    pub until: Option<DateTime<Utc>>,
    pub include_removed: bool,
    /// `field` or `-field`; defaults to ascending unique id.
    pub sort: Option<String>,
    /// Only events past this id in the sort direction.
    pub after: Option<EventId>,
    pub skip: usize,
    /// Zero means unbounded.
    pub limit: usize,
}

impl EventFilter {
    /// Creates a new empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Matches a target class and, if `target.value` is non-empty, the instance.
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = Some(target);
        self
    }

    /// Sets the kind type filter.
    pub fn with_kind_type(mut self, kind_type: KindType) -> Self {
        self.kind_type = Some(kind_type);
        self
    }

    /// Sets the kind name filter.
    pub fn with_kind_name(mut self, name: impl Into<String>) -> Self {
        self.kind_name = Some(name.into());
        self
    }

    /// Sets the owner type filter.
    pub fn with_owner_type(mut self, owner_type: OwnerType) -> Self {
        self.owner_type = Some(owner_type);
        self
    }

    /// Sets the owner name filter.
    pub fn with_owner_name(mut self, name: impl Into<String>) -> Self {
        self.owner_name = Some(name.into());
        self
    }

    /// Sets the running state filter.
    pub fn with_running(mut self, running: bool) -> Self {
        self.running = Some(running);
        self
    }

    /// Only matches completed events that recorded an error.
    pub fn errors_only(mut self) -> Self {
        self.error_only = true;
        self
    }

    /// Sets the inclusive start time lower bound.
    pub fn with_since(mut self, since: DateTime<Utc>) -> Self {
        self.since = Some(since);
        self
    }

    /// Sets the exclusive start time upper bound.
    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    /// Includes events of removed targets.
    pub fn including_removed(mut self) -> Self {
        self.include_removed = true;
        self
    }

    /// Sets the sort order, `field` or `-field`.
    pub fn with_sort(mut self, sort: impl Into<String>) -> Self {
        self.sort = Some(sort.into());
        self
    }

    /// Sets the pagination cursor. Requires sorting by unique id.
    pub fn with_after(mut self, cursor: EventId) -> Self {
        self.after = Some(cursor);
        self
    }

    /// Sets how many matching events to skip.
    pub fn with_skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    /// Sets the maximum number of events returned.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Parses the sort order and checks the filter is coherent.
    pub fn validate(&self) -> Result<Sort, FilterError> {
        let sort = match self.sort.as_deref() {
            None | Some("") => Sort::default(),
            Some(s) => s.parse()?,
        };
        if self.after.is_some() && sort.field != SortField::UniqueId {
            return Err(FilterError::CursorRequiresIdSort(sort.to_string()));
        }
        if self
            .target
            .as_ref()
            .is_some_and(|t| t.name.trim().is_empty())
        {
            return Err(FilterError::EmptyTargetName);
        }
        Ok(sort)
    }

    /// Returns true if the event matches every predicate of this filter.
    ///
    /// Pagination (`after`, `skip`, `limit`) is not a predicate and is only
    /// applied by [`EventFilter::select`].
    pub fn matches(&self, event: &Event) -> bool {
        if event.removed && !self.include_removed {
            return false;
        }

        if let Some(ref target) = self.target {
            if event.target.name != target.name {
                return false;
            }
            if !target.value.is_empty() && event.target.value != target.value {
                return false;
            }
        }

        if let Some(kind_type) = self.kind_type {
            if event.kind.kind_type != kind_type {
                return false;
            }
        }

        if let Some(ref name) = self.kind_name {
            if event.kind.name != *name {
                return false;
            }
        }

        if let Some(owner_type) = self.owner_type {
            if event.owner.owner_type != owner_type {
                return false;
            }
        }

        if let Some(ref name) = self.owner_name {
            if event.owner.name != *name {
                return false;
            }
        }

        if let Some(running) = self.running {
            if event.running != running {
                return false;
            }
        }

        if self.error_only && (event.running || event.error.is_none()) {
            return false;
        }

        if let Some(since) = self.since {
            if event.start_time < since {
                return false;
            }
        }

        if let Some(until) = self.until {
            if event.start_time >= until {
                return false;
            }
        }

        true
    }

    /// Runs the filter over a set of events and returns the requested window.
    pub fn select<'a>(
        &self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> Result<Vec<Event>, FilterError> {
        let sort = self.validate()?;

        let mut selected: Vec<&Event> = events
            .into_iter()
            .filter(|e| self.matches(e))
            .filter(|e| match self.after {
                Some(ref cursor) if sort.descending => e.unique_id < *cursor,
                Some(ref cursor) => e.unique_id > *cursor,
                None => true,
            })
            .collect();

        selected.sort_by(|a, b| sort.compare(a, b));

        let window = selected.into_iter().skip(self.skip);
        let result = if self.limit > 0 {
            window.take(self.limit).cloned().collect()
        } else {
            window.cloned().collect()
        };
        Ok(result)
    }
}
