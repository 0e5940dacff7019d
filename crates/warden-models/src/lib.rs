//! Core data models for Warden.
//!
//! This crate provides the event record persisted for every mutating
//! operation, the value types it references (target, kind, owner), ordered
//! event ids, and the filter used to query stored events.

pub mod event;
pub mod filter;
pub mod ids;

pub use event::{Completion, Event, Kind, KindType, LockKey, Owner, OwnerType, Target};
pub use filter::{EventFilter, FilterError, Sort, SortField};
pub use ids::EventId;
