//! Event lifecycle, running locks and queries for Warden.
//!
//! Every mutating operation against a managed resource is recorded as an
//! event. This crate provides the `EventManager`, which:
//! - opens events, allowing at most one running event per target and kind
//! - completes them with an optional error
//! - marks the history of deleted resources as removed
//! - lists events through an `EventFilter` and fetches them by id
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use warden_events::{EventManager, Opts, StoreConfig, TokenTable};
//! use warden_models::{EventFilter, KindType, Target};
//!
//! let store = StoreConfig::from_env().unwrap().open().unwrap();
//! let tokens = Arc::new(TokenTable::new());
//! tokens.insert("t0k3n", "me@example.com").unwrap();
//! let manager = EventManager::new(store, tokens);
//!
//! // A healer replacing a node
//! let mut event = manager
//!     .new_internal(Opts::new(Target::new("node", "10.0.1.1"), "healer"))
//!     .unwrap();
//! manager.done(&mut event, None).unwrap();
//!
//! // Everything the healer did
//! let filter = EventFilter::new()
//!     .with_kind_type(KindType::Internal)
//!     .with_kind_name("healer")
//!     .with_sort("-_id");
//! let events = manager.list(&filter).unwrap();
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod manager;
pub mod opts;
pub mod query;
pub mod removal;

pub use catalog::{KindCatalog, StaticCatalog};
pub use config::{StoreBackend, StoreConfig};
pub use error::{ErrorKind, EventError, Result};
pub use identity::{IdentityError, IdentityResolver, TokenTable};
pub use manager::EventManager;
pub use opts::Opts;
