//! Permission kind catalog.

use std::collections::HashSet;

/// Read-only set of known permission kind names, e.g. `app.update.env.set`.
pub trait KindCatalog: Send + Sync {
    fn contains(&self, full_name: &str) -> bool;
}

/// Catalog backed by a fixed set of names.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    names: HashSet<String>,
}

impl StaticCatalog {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl KindCatalog for StaticCatalog {
    fn contains(&self, full_name: &str) -> bool {
        self.names.contains(full_name)
    }
}
