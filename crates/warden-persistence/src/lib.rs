//! Persistence layer for Warden.
//!
//! This crate defines the [`EventStore`] contract and two implementations:
//!
//! - [`MemoryEventStore`]: records held in process memory behind a `RwLock`.
//! - [`FileEventStore`]: one JSON file per record, written atomically, with
//!   `create_new` lock files as the conditional insert.
//!
//! # Example
//!
//! ```no_run
//! use warden_models::{Event, EventFilter, Kind, Owner, Target};
//! use warden_persistence::{EventStore, FileEventStore};
//!
//! let store = FileEventStore::open("/var/lib/warden/events").unwrap();
//!
//! let event = Event::started(
//!     Target::new("app", "myapp"),
//!     Kind::permission("app.update.env.set"),
//!     Owner::user("me@example.com"),
//! );
//! store.insert_running(&event).unwrap();
//!
//! let running = store.find(&EventFilter::new().with_running(true)).unwrap();
//! ```

pub mod atomic;
pub mod error;
pub mod file;
pub mod memory;
pub mod store;

pub use error::{PersistenceError, Result};
pub use file::FileEventStore;
pub use memory::MemoryEventStore;
pub use store::EventStore;
