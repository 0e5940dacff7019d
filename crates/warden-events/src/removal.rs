//! Marking the history of deleted resources.

use tracing::debug;
use warden_models::Target;

use crate::error::{EventError, Result};
use crate::manager::EventManager;

impl EventManager {
    /// Flags every event of `target` as removed, whatever its kind, owner or
    /// running state. Records are kept; default listings stop showing them.
    ///
    /// Returns how many events changed, so a repeated call returns zero.
    pub fn mark_as_removed(&self, target: &Target) -> Result<usize> {
        if target.name.trim().is_empty() {
            return Err(EventError::Validation("target name is required".into()));
        }
        let changed = self.store.mark_removed(target)?;
        debug!(target = %target, changed, "marked events as removed");
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::TokenTable;
    use crate::opts::Opts;
    use std::sync::Arc;
    use warden_models::EventFilter;
    use warden_persistence::MemoryEventStore;

    fn make_manager() -> EventManager {
        EventManager::new(Arc::new(MemoryEventStore::new()), Arc::new(TokenTable::new()))
    }

    #[test]
    fn test_mark_as_removed_hides_from_list() {
        let manager = make_manager();
        let target = Target::new("app", "gone");
        let mut first = manager
            .new_internal(Opts::new(target.clone(), "healer"))
            .unwrap();
        manager.done(&mut first, None).unwrap();
        manager
            .new_internal(Opts::new(target.clone(), "healer"))
            .unwrap();
        manager
            .new_internal(Opts::new(Target::new("app", "kept"), "healer"))
            .unwrap();

        assert_eq!(manager.mark_as_removed(&target).unwrap(), 2);

        let visible = manager.list(&EventFilter::new()).unwrap();
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].target.value, "kept");

        let all = manager
            .list(&EventFilter::new().including_removed())
            .unwrap();
        assert_eq!(all.len(), 3);
    }

    #[test]
    fn test_mark_as_removed_is_idempotent() {
        let manager = make_manager();
        let target = Target::new("app", "gone");
        manager
            .new_internal(Opts::new(target.clone(), "healer"))
            .unwrap();

        assert_eq!(manager.mark_as_removed(&target).unwrap(), 1);
        let once = manager
            .list(&EventFilter::new().including_removed())
            .unwrap();

        assert_eq!(manager.mark_as_removed(&target).unwrap(), 0);
        let twice = manager
            .list(&EventFilter::new().including_removed())
            .unwrap();
        assert_eq!(once, twice);
    }

    #[test]
    fn test_removed_running_event_still_holds_lock() {
        let manager = make_manager();
        let target = Target::new("app", "gone");
        manager
            .new_internal(Opts::new(target.clone(), "healer"))
            .unwrap();
        manager.mark_as_removed(&target).unwrap();

        let err = manager
            .new_internal(Opts::new(target.clone(), "healer"))
            .unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::LockConflict);
        assert!(manager.get_running(&target, "healer").unwrap().removed);
    }

    #[test]
    fn test_empty_target_rejected() {
        let manager = make_manager();
        assert!(manager.mark_as_removed(&Target::class("")).is_err());
    }
}
