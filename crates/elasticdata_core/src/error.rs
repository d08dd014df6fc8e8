//! Error types for elasticdata.

use crate::statement::Operation;
use crate::entity::EntityToken;
use thiserror::Error;

/// Result type for store client operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type for repository (manager, unit of work, read path) operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Errors raised by a [`DocumentStore`](crate::store::DocumentStore) implementation.
///
/// These are transport-level failures. The repository layer never lets them
/// escape unwrapped: lookups translate them into
/// [`RepositoryError::EntityNotFound`], everything else is chained into
/// [`RepositoryError::Store`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The index, type or document does not exist.
    #[error("not found: {resource}")]
    NotFound {
        /// What was looked up.
        resource: String,
    },

    /// Network or HTTP-level failure.
    #[error("transport error{}: {message}", .status.map(|s| format!(" (status {s})")).unwrap_or_default())]
    Transport {
        /// Error message.
        message: String,
        /// HTTP status, when the store answered at all.
        status: Option<u16>,
    },

    /// The store answered with something that could not be understood.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The client is closed or was never connected.
    #[error("not connected to store")]
    NotConnected,
}

impl StoreError {
    /// Creates a not-found error.
    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    /// Creates a transport error without a status code.
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: None,
        }
    }

    /// Creates a transport error carrying the HTTP status the store answered with.
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Returns true if this error signals a missing resource.
    ///
    /// A bare 404 transport status counts as well.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::NotFound { .. }
                | StoreError::Transport {
                    status: Some(404),
                    ..
                }
        )
    }
}

/// A single bulk item the store refused during a flush.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemFailure {
    /// Token of the tracked entity whose statement failed.
    pub token: EntityToken,
    /// Operation that was attempted.
    pub op: Operation,
    /// Target document id, if any.
    pub id: Option<String>,
    /// Status reported for the item.
    pub status: u16,
    /// Reason reported by the store.
    pub reason: String,
}

/// Errors raised by the repository layer.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// One or more documents could not be found.
    #[error("Entities: \"{doc_type}\" with ids: {} not found.", .ids.join(", "))]
    EntityNotFound {
        /// Document type that was searched.
        doc_type: String,
        /// Every id that could not be resolved.
        ids: Vec<String>,
        /// Underlying store error, when the miss was signalled by the transport.
        #[source]
        source: Option<StoreError>,
    },

    /// A store call failed.
    #[error("{context}, caused by {source}")]
    Store {
        /// What the repository was doing.
        context: String,
        /// The store failure.
        #[source]
        source: StoreError,
    },

    /// `query_one` received zero or several hits.
    #[error("Expected one result, found {found}")]
    UnexpectedHitCount {
        /// Number of hits returned.
        found: usize,
    },

    /// The bulk endpoint returned a different number of outcomes than statements sent.
    #[error("bulk response carries {returned} outcomes for {submitted} statements")]
    OutcomeMismatch {
        /// Statements submitted in the chunk.
        submitted: usize,
        /// Outcomes received.
        returned: usize,
    },

    /// Some statements of a flush were refused by the store.
    #[error("{} of {attempted} bulk items failed", .failures.len())]
    PartialFailure {
        /// Statements submitted in the flush.
        attempted: usize,
        /// The refused items.
        failures: Vec<ItemFailure>,
    },
}

impl RepositoryError {
    /// Creates an entity-not-found error without an underlying cause.
    pub fn not_found(doc_type: impl Into<String>, ids: Vec<String>) -> Self {
        Self::EntityNotFound {
            doc_type: doc_type.into(),
            ids,
            source: None,
        }
    }

    /// Wraps a store failure with context.
    pub fn store(context: impl Into<String>, source: StoreError) -> Self {
        Self::Store {
            context: context.into(),
            source,
        }
    }

    /// Returns true for [`RepositoryError::EntityNotFound`].
    ///
    /// Every other variant is still a repository error; this is the check
    /// callers use to tell a miss from a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, RepositoryError::EntityNotFound { .. })
    }
}

/// A field or document failed schema validation.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    /// Creates a validation error.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn not_found_message_lists_ids() {
        let err = RepositoryError::not_found("note", vec!["a".into(), "b".into()]);
        assert_eq!(
            err.to_string(),
            "Entities: \"note\" with ids: a, b not found."
        );
        assert!(err.is_not_found());
    }

    #[test]
    fn store_error_is_chained() {
        let err = RepositoryError::store(
            "Transport returned error",
            StoreError::status(500, "boom"),
        );
        assert!(!err.is_not_found());
        assert!(err.to_string().contains("caused by"));
        let source = err.source().expect("cause");
        assert_eq!(source.to_string(), "transport error (status 500): boom");
    }

    #[test]
    fn store_not_found_detection() {
        assert!(StoreError::not_found("x").is_not_found());
        assert!(StoreError::status(404, "missing").is_not_found());
        assert!(!StoreError::status(503, "down").is_not_found());
        assert!(!StoreError::NotConnected.is_not_found());
    }

    #[test]
    fn hit_count_display() {
        let err = RepositoryError::UnexpectedHitCount { found: 2 };
        assert_eq!(err.to_string(), "Expected one result, found 2");
    }
}
