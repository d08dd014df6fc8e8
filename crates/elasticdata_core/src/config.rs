//! Manager configuration.

use crate::bulk::DEFAULT_CHUNK_SIZE;

/// Configuration for an [`EntityManager`](crate::EntityManager).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerConfig {
    /// Index every read and write goes to.
    pub index: String,

    /// Statements per bulk request.
    pub chunk_size: usize,

    /// Whether records leave the registry after a successful delete.
    ///
    /// When false, a deleted record moves back to `PendingUpdate` like any
    /// other flushed record.
    pub evict_deleted: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            index: "default".to_owned(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            evict_deleted: false,
        }
    }
}

impl ManagerConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the index.
    #[must_use]
    pub fn index(mut self, index: impl Into<String>) -> Self {
        self.index = index.into();
        self
    }

    /// Sets the bulk chunk size.
    #[must_use]
    pub const fn chunk_size(mut self, size: usize) -> Self {
        self.chunk_size = size;
        self
    }

    /// Sets whether deleted records are evicted after flush.
    #[must_use]
    pub const fn evict_deleted(mut self, value: bool) -> Self {
        self.evict_deleted = value;
        self
    }
}
