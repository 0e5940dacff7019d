//! In-memory event store.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use warden_models::{Completion, Event, EventFilter, EventId, LockKey, Target};

use crate::error::{PersistenceError, Result};
use crate::store::EventStore;

/// Records and the running-lock index, always updated together.
#[derive(Default)]
struct MemoryState {
    /// Events ordered by id, i.e. by creation.
    events: BTreeMap<EventId, Event>,
    /// Lock key to the id of the running event holding it.
    running: HashMap<LockKey, EventId>,
}

/// Event store held in process memory.
///
/// Check-and-insert happens under one write lock, so the running index and
/// the records cannot disagree. Suitable for tests and single-process
/// deployments that do not need history across restarts.
#[derive(Default)]
pub struct MemoryEventStore {
    state: RwLock<MemoryState>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored events, removed ones included.
    pub fn len(&self) -> Result<usize> {
        Ok(self.read()?.events.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read()?.events.is_empty())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, MemoryState>> {
        self.state
            .read()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, MemoryState>> {
        self.state
            .write()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }
}

impl EventStore for MemoryEventStore {
    fn insert_running(&self, event: &Event) -> Result<()> {
        if !event.running {
            return Err(PersistenceError::InvalidData(format!(
                "event {} is not running",
                event.unique_id
            )));
        }

        let mut state = self.write()?;
        let key = event.lock_key();

        if let Some(holder) = state.running.get(&key) {
            return Err(PersistenceError::Conflict {
                key: key.clone(),
                holder: Some(holder.clone()),
            });
        }
        if state.events.contains_key(&event.unique_id) {
            return Err(PersistenceError::InvalidData(format!(
                "duplicate event id {}",
                event.unique_id
            )));
        }

        state.running.insert(key, event.unique_id.clone());
        state.events.insert(event.unique_id.clone(), event.clone());
        Ok(())
    }

    fn complete(&self, id: &EventId, completion: &Completion) -> Result<Event> {
        let mut state = self.write()?;

        let event = state
            .events
            .get_mut(id)
            .ok_or_else(|| PersistenceError::NotFound {
                kind: "event".to_string(),
                id: id.to_string(),
            })?;
        if !event.running {
            return Err(PersistenceError::NotRunning { id: id.clone() });
        }

        event.complete(completion);
        let updated = event.clone();

        let key = updated.lock_key();
        if state.running.get(&key) == Some(id) {
            state.running.remove(&key);
        }
        Ok(updated)
    }

    fn get(&self, id: &EventId) -> Result<Option<Event>> {
        Ok(self.read()?.events.get(id).cloned())
    }

    fn running(&self, key: &LockKey) -> Result<Option<Event>> {
        let state = self.read()?;
        Ok(state
            .running
            .get(key)
            .and_then(|id| state.events.get(id))
            .cloned())
    }

    fn find(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let state = self.read()?;
        Ok(filter.select(state.events.values())?)
    }

    fn mark_removed(&self, target: &Target) -> Result<usize> {
        let mut state = self.write()?;
        let mut changed = 0;
        for event in state.events.values_mut() {
            if event.target == *target && !event.removed {
                event.removed = true;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
