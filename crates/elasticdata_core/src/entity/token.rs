//! Per-instance tracking token.

use std::fmt;
use uuid::Uuid;

/// Opaque identity of one in-memory entity instance.
///
/// Tokens are issued when an [`EntityRef`](super::EntityRef) is created and
/// are shared by every clone of that handle. They are:
/// - Unique per instance, never derived from the storage id
/// - Stable for the lifetime of the handle
/// - Never reused
///
/// The unit of work keys its registry by token because freshly created
/// entities have no storage id until their first flush.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityToken(Uuid);

impl EntityToken {
    /// Issues a new random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a token from a UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the UUID backing this token.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EntityToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EntityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityToken({})", self.0)
    }
}

impl fmt::Display for EntityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for EntityToken {
    fn from(uuid: Uuid) -> Self {
        Self::from_uuid(uuid)
    }
}
