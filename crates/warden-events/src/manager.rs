//! EventManager - event lifecycle and running locks.
//!
//! Opening an event is admission control: while an event is running, no
//! other event with the same target and kind name can be opened. The manager
//! holds no lock of its own. It relies on the store's conditional insert, so
//! several managers sharing one store still exclude each other.

use std::error::Error as StdError;
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, warn};
use warden_models::{Completion, Event, Kind, LockKey, Owner, Target};
use warden_persistence::EventStore;

use crate::catalog::KindCatalog;
use crate::error::{EventError, Result};
use crate::identity::IdentityResolver;
use crate::opts::Opts;

/// Creates, completes and looks up events.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use warden_events::{EventManager, Opts, TokenTable};
/// use warden_models::Target;
/// use warden_persistence::MemoryEventStore;
///
/// let tokens = Arc::new(TokenTable::new());
/// tokens.insert("t0k3n", "me@example.com").unwrap();
/// let manager = EventManager::new(Arc::new(MemoryEventStore::new()), tokens);
///
/// let opts = Opts::new(Target::new("app", "myapp"), "app.update.env.set").owner("t0k3n");
/// let mut event = manager.new_event(opts).unwrap();
/// // ... perform the operation ...
/// manager.done(&mut event, None).unwrap();
/// ```
pub struct EventManager {
    pub(crate) store: Arc<dyn EventStore>,
    identity: Arc<dyn IdentityResolver>,
    catalog: Option<Arc<dyn KindCatalog>>,
}

impl EventManager {
    /// Creates a manager over `store`, resolving owners with `identity`.
    pub fn new(store: Arc<dyn EventStore>, identity: Arc<dyn IdentityResolver>) -> Self {
        Self {
            store,
            identity,
            catalog: None,
        }
    }

    /// Rejects permission kinds missing from `catalog`.
    pub fn with_catalog(mut self, catalog: Arc<dyn KindCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Opens an event for a user-initiated operation.
    ///
    /// Fails with `LockConflict` if an event of the same kind is already
    /// running against the target. Nothing is stored in that case.
    pub fn new_event(&self, opts: Opts) -> Result<Event> {
        opts.validate()?;
        let token = opts
            .owner_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or_else(|| EventError::Validation("event owner is required".into()))?;

        if let Some(ref catalog) = self.catalog {
            if !catalog.contains(&opts.kind) {
                return Err(EventError::Validation(format!(
                    "unknown permission kind: {}",
                    opts.kind
                )));
            }
        }

        let user = self.identity.resolve(token)?;
        let mut event = Event::started(opts.target, Kind::permission(opts.kind), Owner::user(user));
        event.start_custom_data = opts.custom_data;
        self.insert(event)
    }

    /// Opens an event for a system-initiated operation such as a healer run.
    ///
    /// The owner is internal and the kind is the process name. Same conflict
    /// rules as [`EventManager::new_event`].
    pub fn new_internal(&self, opts: Opts) -> Result<Event> {
        opts.validate()?;
        if opts.owner_token.is_some() {
            return Err(EventError::Validation(
                "internal events cannot have an owner token".into(),
            ));
        }

        let mut event = Event::started(opts.target, Kind::internal(opts.kind), Owner::internal());
        event.start_custom_data = opts.custom_data;
        self.insert(event)
    }

    fn insert(&self, event: Event) -> Result<Event> {
        match self.store.insert_running(&event) {
            Ok(()) => {
                debug!(
                    event_id = %event.unique_id,
                    target = %event.target,
                    kind = %event.kind,
                    owner = %event.owner,
                    "event opened"
                );
                Ok(event)
            }
            Err(e) => {
                let err = EventError::from(e);
                if let EventError::LockConflict { ref key, ref holder } = err {
                    warn!(lock = %key, holder = ?holder, "event lock conflict");
                }
                Err(err)
            }
        }
    }

    /// Returns the running event for `target` and the kind's full name.
    pub fn get_running(&self, target: &Target, kind_name: &str) -> Result<Event> {
        let key = LockKey::new(target, kind_name);
        self.store
            .running(&key)?
            .ok_or_else(|| EventError::NotFound(format!("no running event for {key}")))
    }

    /// Completes a running event, recording `err` as its failure if given.
    ///
    /// `event` is updated to the stored record. Completing an event twice
    /// fails with `InvalidState`, including when the other completion went
    /// through a different copy of the event.
    pub fn done(&self, event: &mut Event, err: Option<&dyn StdError>) -> Result<()> {
        self.finish(event, err, None)
    }

    /// Like [`EventManager::done`], also recording end custom data.
    pub fn done_with_data(
        &self,
        event: &mut Event,
        err: Option<&dyn StdError>,
        data: impl Into<serde_json::Value>,
    ) -> Result<()> {
        self.finish(event, err, Some(data.into()))
    }

    fn finish(
        &self,
        event: &mut Event,
        err: Option<&dyn StdError>,
        end_custom_data: Option<serde_json::Value>,
    ) -> Result<()> {
        if !event.running {
            return Err(EventError::InvalidState(format!(
                "event {} is already done",
                event.unique_id
            )));
        }

        let completion = Completion {
            end_time: Utc::now(),
            error: err.map(|e| e.to_string()),
            end_custom_data,
            log: event.log.clone(),
        };
        *event = self.store.complete(&event.unique_id, &completion)?;

        debug!(
            event_id = %event.unique_id,
            target = %event.target,
            kind = %event.kind,
            error = event.error.as_deref().unwrap_or(""),
            "event done"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::StaticCatalog;
    use crate::error::ErrorKind;
    use crate::identity::TokenTable;
    use serde_json::json;
    use std::io;
    use std::thread;
    use warden_models::{KindType, OwnerType};
    use warden_persistence::{MemoryEventStore, PersistenceError};

    const TOKEN: &str = "t0k3n";
    const ENV_SET: &str = "app.update.env.set";

    fn make_manager() -> EventManager {
        let tokens = TokenTable::new();
        tokens.insert(TOKEN, "me@me.com").unwrap();
        EventManager::new(Arc::new(MemoryEventStore::new()), Arc::new(tokens))
    }

    fn app(value: &str) -> Target {
        Target::new("app", value)
    }

    #[test]
    fn test_new_event_sets_fields() {
        let manager = make_manager();
        let event = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();

        assert!(event.running);
        assert!(!event.removed);
        assert!(event.end_time.is_none());
        assert_eq!(event.kind.kind_type, KindType::Permission);
        assert_eq!(event.kind.name, ENV_SET);
        assert_eq!(event.owner.owner_type, OwnerType::User);
        assert_eq!(event.owner.name, "me@me.com");
    }

    #[test]
    fn test_new_internal_sets_internal_owner() {
        let manager = make_manager();
        let event = manager
            .new_internal(Opts::new(Target::new("node", "10.0.1.1"), "healer"))
            .unwrap();

        assert_eq!(event.kind, Kind::internal("healer"));
        assert_eq!(event.owner, Owner::internal());
    }

    #[test]
    fn test_new_event_requires_owner() {
        let manager = make_manager();
        let err = manager.new_event(Opts::new(app("myapp"), ENV_SET)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_new_internal_rejects_token() {
        let manager = make_manager();
        let err = manager
            .new_internal(Opts::new(app("myapp"), "healer").owner(TOKEN))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_unknown_token_is_identity_error() {
        let manager = make_manager();
        let err = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner("nope"))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Identity);
    }

    #[test]
    fn test_catalog_rejects_unknown_kind() {
        let manager = make_manager().with_catalog(Arc::new(StaticCatalog::new([ENV_SET])));

        manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();
        let err = manager
            .new_event(Opts::new(app("myapp"), "app.made.up").owner(TOKEN))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Internal kinds are not catalogued.
        manager
            .new_internal(Opts::new(app("myapp"), "healer"))
            .unwrap();
    }

    #[test]
    fn test_conflict_same_kind_same_target() {
        let manager = make_manager();
        let first = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();

        let err = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap_err();
        match err {
            EventError::LockConflict { holder, .. } => assert_eq!(holder, Some(first.unique_id)),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_other_kind_or_target_does_not_conflict() {
        let manager = make_manager();
        manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();

        manager
            .new_event(Opts::new(app("myapp"), "app.deploy").owner(TOKEN))
            .unwrap();
        manager
            .new_event(Opts::new(app("myapp2"), ENV_SET).owner(TOKEN))
            .unwrap();
    }

    #[test]
    fn test_done_releases_lock() {
        let manager = make_manager();
        let mut event = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();

        manager.done(&mut event, None).unwrap();

        assert!(!event.running);
        assert!(event.end_time.is_some());
        assert!(event.error.is_none());
        manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();
    }

    #[test]
    fn test_done_records_error() {
        let manager = make_manager();
        let mut event = manager
            .new_internal(Opts::new(app("myapp"), "healer"))
            .unwrap();

        let failure = io::Error::new(io::ErrorKind::Other, "unit did not start");
        manager.done(&mut event, Some(&failure)).unwrap();

        assert_eq!(event.error.as_deref(), Some("unit did not start"));
    }

    #[test]
    fn test_done_twice_is_invalid_state() {
        let manager = make_manager();
        let mut event = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();
        let mut stale_copy = event.clone();

        manager.done(&mut event, None).unwrap();

        let err = manager.done(&mut event, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
        let err = manager.done(&mut stale_copy, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);
    }

    #[test]
    fn test_custom_data_and_log_persisted() {
        let manager = make_manager();
        let mut event = manager
            .new_event(
                Opts::new(app("myapp"), "app.deploy")
                    .owner(TOKEN)
                    .custom_data(json!({"image": "v2"})),
            )
            .unwrap();

        event.log("building image");
        manager
            .done_with_data(&mut event, None, json!({"units": 3}))
            .unwrap();

        let stored = manager.get_by_id(&event.unique_id).unwrap();
        assert_eq!(stored.start_custom_data, Some(json!({"image": "v2"})));
        assert_eq!(stored.end_custom_data, Some(json!({"units": 3})));
        assert_eq!(stored.log, "building image\n");
    }

    #[test]
    fn test_get_running_until_done() {
        let manager = make_manager();
        let mut event = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();

        let running = manager.get_running(&app("myapp"), ENV_SET).unwrap();
        assert_eq!(running, event);

        manager.done(&mut event, None).unwrap();
        let err = manager.get_running(&app("myapp"), ENV_SET).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    /// Memory store whose completions always fail with an I/O error.
    struct FailingComplete(MemoryEventStore);

    impl EventStore for FailingComplete {
        fn insert_running(&self, event: &Event) -> warden_persistence::Result<()> {
            self.0.insert_running(event)
        }

        fn complete(
            &self,
            _id: &warden_models::EventId,
            _completion: &Completion,
        ) -> warden_persistence::Result<Event> {
            Err(PersistenceError::WriteError {
                path: "events/x.json".into(),
                source: io::Error::new(io::ErrorKind::Other, "disk full"),
            })
        }

        fn get(&self, id: &warden_models::EventId) -> warden_persistence::Result<Option<Event>> {
            self.0.get(id)
        }

        fn running(&self, key: &LockKey) -> warden_persistence::Result<Option<Event>> {
            self.0.running(key)
        }

        fn find(&self, filter: &warden_models::EventFilter) -> warden_persistence::Result<Vec<Event>> {
            self.0.find(filter)
        }

        fn mark_removed(&self, target: &Target) -> warden_persistence::Result<usize> {
            self.0.mark_removed(target)
        }
    }

    #[test]
    fn test_done_store_failure_propagates() {
        let tokens = TokenTable::new();
        tokens.insert(TOKEN, "me@me.com").unwrap();
        let manager = EventManager::new(
            Arc::new(FailingComplete(MemoryEventStore::new())),
            Arc::new(tokens),
        );
        let mut event = manager
            .new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN))
            .unwrap();

        let err = manager.done(&mut event, None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Store);
        assert!(err.to_string().contains("disk full"));
        assert!(event.running);
        assert!(event.end_time.is_none());
        assert_eq!(manager.get_running(&app("myapp"), ENV_SET).unwrap(), event);
    }

    #[test]
    fn test_concurrent_new_single_winner() {
        let manager = Arc::new(make_manager());
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let m = manager.clone();
                thread::spawn(move || m.new_event(Opts::new(app("myapp"), ENV_SET).owner(TOKEN)))
            })
            .collect();

        let mut wins = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => wins += 1,
                Err(e) => assert_eq!(e.kind(), ErrorKind::LockConflict),
            }
        }
        assert_eq!(wins, 1);
    }
}
