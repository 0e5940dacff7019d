//! Store configuration.
//!
//! # Environment Variables
//!
//! - `WARDEN_DATA_DIR`: directory of the file store, `~` is expanded
//!   (default `~/.warden/events`)
//! - `WARDEN_STORE`: `file` or `memory` (default `file`)

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use tracing::info;
use warden_persistence::{EventStore, FileEventStore, MemoryEventStore};

use crate::error::{EventError, Result};

/// Environment variable for the file store directory.
pub const DATA_DIR_ENV: &str = "WARDEN_DATA_DIR";

/// Environment variable selecting the store backend.
pub const STORE_ENV: &str = "WARDEN_STORE";

/// Default state directory name under home.
const DEFAULT_STATE_DIR: &str = ".warden";

const EVENTS_SUBDIR: &str = "events";

/// Which store implementation to open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    File,
    Memory,
}

impl FromStr for StoreBackend {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(StoreBackend::File),
            "memory" => Ok(StoreBackend::Memory),
            other => Err(EventError::Validation(format!(
                "unknown store backend: {other}"
            ))),
        }
    }
}

/// Configuration for the event store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    /// Root of the file store; unused by the memory backend.
    pub data_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::default(),
            data_dir: default_data_dir(),
        }
    }
}

/// `~/.warden/events`, or `.warden/events` when there is no home directory.
fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(DEFAULT_STATE_DIR))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR))
        .join(EVENTS_SUBDIR)
}

impl StoreConfig {
    /// Creates a new config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads `WARDEN_DATA_DIR` and `WARDEN_STORE`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            config.data_dir = PathBuf::from(shellexpand::tilde(&dir).into_owned());
        }
        if let Some(backend) = lookup(STORE_ENV).filter(|b| !b.is_empty()) {
            config.backend = backend.parse()?;
        }
        Ok(config)
    }

    /// Sets the backend.
    pub fn with_backend(mut self, backend: StoreBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Sets the file store directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Opens the configured store.
    pub fn open(&self) -> Result<Arc<dyn EventStore>> {
        let store: Arc<dyn EventStore> = match self.backend {
            StoreBackend::File => Arc::new(FileEventStore::open(&self.data_dir)?),
            StoreBackend::Memory => {
                info!("using in-memory event store");
                Arc::new(MemoryEventStore::new())
            }
        };
        Ok(store)
    }
}
