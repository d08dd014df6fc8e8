//! Shared entity handle.

use crate::entity::{Entity, EntityToken};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::fmt;
use std::sync::Arc;

/// A shared, lockable handle to an entity.
///
/// The caller and the unit of work hold clones of the same handle, so
/// mutations made by application code between flushes are what the change
/// tracker diffs against its baseline. The token is fixed at construction
/// and shared by every clone.
///
/// `EntityRef<E>` is the typed form returned by the read path;
/// `EntityRef` (that is, `EntityRef<dyn Entity>`) is the erased form the
/// registry stores.
pub struct EntityRef<E: ?Sized = dyn Entity> {
    token: EntityToken,
    inner: Arc<RwLock<E>>,
}

impl<E: Entity> EntityRef<E> {
    /// Wraps an entity and issues a fresh token for it.
    pub fn new(entity: E) -> Self {
        Self {
            token: EntityToken::new(),
            inner: Arc::new(RwLock::new(entity)),
        }
    }

    /// Returns the type-erased handle sharing this entity and token.
    #[must_use]
    pub fn erase(&self) -> EntityRef {
        let inner: Arc<RwLock<dyn Entity>> = self.inner.clone();
        EntityRef {
            token: self.token,
            inner,
        }
    }
}

impl<E: ?Sized> EntityRef<E> {
    /// Returns the tracking token.
    #[must_use]
    pub fn token(&self) -> EntityToken {
        self.token
    }

    /// Locks the entity for reading.
    pub fn read(&self) -> RwLockReadGuard<'_, E> {
        self.inner.read()
    }

    /// Locks the entity for writing.
    pub fn write(&self) -> RwLockWriteGuard<'_, E> {
        self.inner.write()
    }

    /// Returns true if both handles point to the same entity instance.
    #[must_use]
    pub fn same_instance<F: ?Sized>(&self, other: &EntityRef<F>) -> bool {
        self.token == other.token
    }
}

impl<E: ?Sized> Clone for EntityRef<E> {
    fn clone(&self) -> Self {
        Self {
            token: self.token,
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<E: ?Sized> fmt::Debug for EntityRef<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRef")
            .field("token", &self.token)
            .finish_non_exhaustive()
    }
}
