//! File-backed event store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tracing::{debug, info, warn};
use uuid::Uuid;
use warden_models::{Completion, Event, EventFilter, EventId, LockKey, Target};

use crate::atomic::{
    atomic_write_json, create_exclusive, ensure_dir, link_exclusive, read_json_optional,
    read_optional, remove_if_exists, rename_if_exists,
};
use crate::error::{PersistenceError, Result};
use crate::store::EventStore;

/// Event store keeping one JSON file per event.
///
/// ```text
/// base_path/
/// ├── events/
/// │   ├── 0000018f0a1b2c3d00112233.json
/// │   └── 0000018f0a1b2c3e00112233.json
/// └── locks/
///     └── {uuid-v5 of lock key}.lock   # holds the running event's id
/// ```
///
/// A lock file is created with `create_new` before the event record is
/// written and removed after the completed record is written. The lock file
/// is the conditional write: of two racing inserts, across processes too,
/// only one creates it.
///
/// Read-modify-write updates (completion, removal marking) are serialized
/// within the process by `write_guard`.
pub struct FileEventStore {
    base_path: PathBuf,
    write_guard: Mutex<()>,
}

impl FileEventStore {
    /// Opens a store rooted at `base_path`, creating its directories.
    pub fn open(base_path: impl Into<PathBuf>) -> Result<Self> {
        let store = Self {
            base_path: base_path.into(),
            write_guard: Mutex::new(()),
        };
        ensure_dir(&store.events_dir())?;
        ensure_dir(&store.locks_dir())?;
        info!(path = %store.base_path.display(), "opened file event store");
        Ok(store)
    }

    /// Root directory of the store.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    fn events_dir(&self) -> PathBuf {
        self.base_path.join("events")
    }

    fn locks_dir(&self) -> PathBuf {
        self.base_path.join("locks")
    }

    fn event_path(&self, id: &EventId) -> PathBuf {
        self.events_dir().join(format!("{}.json", id))
    }

    /// Lock file name derived from the key, so any target value is a safe name.
    fn lock_path(&self, key: &LockKey) -> PathBuf {
        let material = format!(
            "{}\u{0}{}\u{0}{}",
            key.target.name, key.target.value, key.kind_name
        );
        let name = Uuid::new_v5(&Uuid::NAMESPACE_OID, material.as_bytes());
        self.locks_dir().join(format!("{}.lock", name))
    }

    fn guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.write_guard
            .lock()
            .map_err(|e| PersistenceError::LockPoisoned(e.to_string()))
    }

    /// Id recorded in a lock file; `None` if the file is gone or still empty.
    fn read_holder(&self, lock: &Path) -> Result<Option<EventId>> {
        Ok(read_optional(lock)?
            .map(|data| data.trim().to_string())
            .filter(|data| !data.is_empty())
            .map(EventId::from))
    }

    fn load(&self, id: &EventId) -> Result<Option<Event>> {
        if !id.is_well_formed() {
            return Ok(None);
        }
        read_json_optional(&self.event_path(id))
    }

    /// True if `holder` has a stored record that is no longer running.
    ///
    /// That only happens when a process died between writing the completed
    /// record and removing the lock file. A holder whose record does not
    /// exist yet is still being inserted and is not stale.
    fn is_stale(&self, holder: &EventId) -> Result<bool> {
        Ok(self.load(holder)?.is_some_and(|e| !e.running))
    }

    /// Creates the lock file for `key`, reclaiming it once if it is stale.
    fn acquire(&self, key: &LockKey, id: &EventId) -> Result<PathBuf> {
        let lock = self.lock_path(key);
        for attempt in 0..2 {
            if create_exclusive(&lock, id.as_str().as_bytes())? {
                return Ok(lock);
            }

            let holder = self.read_holder(&lock)?;
            if attempt == 0 {
                if let Some(ref stale) = holder {
                    if self.is_stale(stale)? {
                        self.reclaim(&lock, stale)?;
                        continue;
                    }
                }
            }
            return Err(PersistenceError::Conflict {
                key: key.clone(),
                holder,
            });
        }
        Err(PersistenceError::Conflict {
            key: key.clone(),
            holder: self.read_holder(&lock)?,
        })
    }

    /// Removes a lock file whose holder completed without releasing it.
    ///
    /// The lock is first renamed aside, so of several reclaimers only one
    /// takes it. If the file taken turns out to name a different holder, a
    /// new lock was created after `stale` was read and it is linked back.
    fn reclaim(&self, lock: &Path, stale: &EventId) -> Result<()> {
        let _guard = self.guard()?;
        if self.read_holder(lock)?.as_ref() != Some(stale) {
            return Ok(());
        }

        let aside = lock.with_extension(format!("stale-{}", Uuid::new_v4().simple()));
        if !rename_if_exists(lock, &aside)? {
            return Ok(());
        }

        let taken = self.read_holder(&aside)?;
        if taken.as_ref() == Some(stale) {
            warn!(lock = %lock.display(), holder = %stale, "reclaimed stale lock file");
        } else if !link_exclusive(&aside, lock)? {
            warn!(
                lock = %lock.display(),
                holder = ?taken,
                "lost a live lock while reclaiming, another insert took its place"
            );
        }
        remove_if_exists(&aside)
    }

    /// Removes the lock file for `key` if `id` still holds it.
    ///
    /// Failure is logged and not returned: the completed record is already
    /// written, and a lock left behind by a completed holder is reclaimed by
    /// the next insert.
    fn release(&self, key: &LockKey, id: &EventId) {
        let lock = self.lock_path(key);
        let released = self.read_holder(&lock).and_then(|holder| {
            if holder.as_ref() == Some(id) {
                remove_if_exists(&lock)
            } else {
                Ok(())
            }
        });
        if let Err(e) = released {
            warn!(lock = %lock.display(), event_id = %id, error = %e, "failed to release lock of completed event");
        }
    }

    /// Every readable record; unreadable ones are skipped with a warning.
    fn scan(&self) -> Result<Vec<Event>> {
        let dir = self.events_dir();
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(PersistenceError::ReadError { path: dir, source }),
        };

        let mut events = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::ReadError {
                path: dir.clone(),
                source,
            })?;

            let path = entry.path();
            if !path.extension().is_some_and(|ext| ext == "json") {
                continue;
            }
            match read_json_optional::<Event>(&path) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable event record"),
            }
        }
        Ok(events)
    }
}

impl EventStore for FileEventStore {
    fn insert_running(&self, event: &Event) -> Result<()> {
        if !event.running {
            return Err(PersistenceError::InvalidData(format!(
                "event {} is not running",
                event.unique_id
            )));
        }
        if !event.unique_id.is_well_formed() {
            return Err(PersistenceError::InvalidData(format!(
                "malformed event id {}",
                event.unique_id
            )));
        }

        let key = event.lock_key();
        let lock = self.acquire(&key, &event.unique_id)?;

        if let Err(e) = atomic_write_json(&self.event_path(&event.unique_id), event) {
            if let Err(release) = remove_if_exists(&lock) {
                warn!(lock = %lock.display(), error = %release, "failed to release lock after write failure");
            }
            return Err(e);
        }

        debug!(event_id = %event.unique_id, lock = %key, "inserted running event");
        Ok(())
    }

    fn complete(&self, id: &EventId, completion: &Completion) -> Result<Event> {
        let _guard = self.guard()?;

        let mut event = self.load(id)?.ok_or_else(|| PersistenceError::NotFound {
            kind: "event".to_string(),
            id: id.to_string(),
        })?;
        if !event.running {
            return Err(PersistenceError::NotRunning { id: id.clone() });
        }

        event.complete(completion);
        atomic_write_json(&self.event_path(id), &event)?;

        self.release(&event.lock_key(), id);
        Ok(event)
    }

    fn get(&self, id: &EventId) -> Result<Option<Event>> {
        self.load(id)
    }

    fn running(&self, key: &LockKey) -> Result<Option<Event>> {
        let Some(holder) = self.read_holder(&self.lock_path(key))? else {
            return Ok(None);
        };
        Ok(self.load(&holder)?.filter(|e| e.running))
    }

    fn find(&self, filter: &EventFilter) -> Result<Vec<Event>> {
        let events = self.scan()?;
        Ok(filter.select(&events)?)
    }

    fn mark_removed(&self, target: &Target) -> Result<usize> {
        let _guard = self.guard()?;
        let mut changed = 0;
        for mut event in self.scan()? {
            if event.target == *target && !event.removed {
                event.removed = true;
                atomic_write_json(&self.event_path(&event.unique_id), &event)?;
                changed += 1;
            }
        }
        Ok(changed)
    }
}
