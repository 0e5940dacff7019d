//! Event queries and lookup by id.

use tracing::debug;
use warden_models::{Event, EventFilter, EventId};

use crate::error::{EventError, Result};
use crate::manager::EventManager;

impl EventManager {
    /// Lists events matching `filter`, sorted and paginated.
    ///
    /// Removed events are skipped unless the filter includes them. A malformed
    /// sort or cursor fails with `Validation` before the store is touched.
    pub fn list(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let sort = filter.validate()?;
        let events = self.store.find(filter)?;
        debug!(sort = %sort, count = events.len(), "listed events");
        Ok(events)
    }

    /// Fetches one event by id. Removed events are returned too.
    pub fn get_by_id(&self, id: &EventId) -> Result<Event> {
        self.store
            .get(id)?
            .ok_or_else(|| EventError::NotFound(id.to_string()))
    }
}
