//! The contract every event store fulfils.

use warden_models::{Completion, Event, EventFilter, EventId, LockKey, Target};

use crate::error::Result;

/// Storage for event records.
///
/// Implementations must make [`EventStore::insert_running`] a single
/// conditional write: two callers racing to insert events with the same
/// [`LockKey`] must see exactly one success. Every other operation only
/// needs the store's ordinary read/write consistency.
pub trait EventStore: Send + Sync {
    /// Inserts a running event unless another running event holds its lock key.
    ///
    /// Fails with [`PersistenceError::Conflict`](crate::PersistenceError::Conflict)
    /// and writes nothing if the key is held.
    fn insert_running(&self, event: &Event) -> Result<()>;

    /// Completes a running event and releases its lock key.
    ///
    /// Fails with `NotFound` if no such event exists and with `NotRunning` if
    /// it has already been completed. Returns the stored record as updated.
    fn complete(&self, id: &EventId, completion: &Completion) -> Result<Event>;

    /// Fetches an event by id, removed or not.
    fn get(&self, id: &EventId) -> Result<Option<Event>>;

    /// Fetches the event currently holding `key`, if any.
    fn running(&self, key: &LockKey) -> Result<Option<Event>>;

    /// Returns the events selected by `filter`, sorted and paginated.
    fn find(&self, filter: &EventFilter) -> Result<Vec<Event>>;

    /// Flags every event of `target` as removed.
    ///
    /// Returns how many events changed; already removed ones are not counted.
    fn mark_removed(&self, target: &Target) -> Result<usize>;
}
