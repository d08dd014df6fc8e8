//! Write statements and bulk outcomes.

use crate::entity::Source;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A bulk write operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Create a new document; fails if the id already exists.
    Create,
    /// Apply a partial document to an existing one.
    Update,
    /// Delete a document.
    Delete,
}

impl Operation {
    /// Returns the bulk action name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single write destined for the bulk endpoint.
///
/// Wire shape: `{op, index, type, id?, parent?, body?}`. `body` is the full
/// document for a create and the diff for an update, where `null` means
/// "remove this field". Deletes carry no body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteStatement {
    /// Operation to run.
    pub op: Operation,
    /// Target index.
    pub index: String,
    /// Target document type.
    #[serde(rename = "type")]
    pub doc_type: String,
    /// Target id. Absent on a create lets the store generate one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Parent reference for routing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
    /// Document or partial document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Source>,
}

impl WriteStatement {
    /// Creates a create statement.
    pub fn create(index: impl Into<String>, doc_type: impl Into<String>, body: Source) -> Self {
        Self {
            op: Operation::Create,
            index: index.into(),
            doc_type: doc_type.into(),
            id: None,
            parent: None,
            body: Some(body),
        }
    }

    /// Creates an update statement carrying a partial document.
    pub fn update(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
        diff: Source,
    ) -> Self {
        Self {
            op: Operation::Update,
            index: index.into(),
            doc_type: doc_type.into(),
            id: Some(id.into()),
            parent: None,
            body: Some(diff),
        }
    }

    /// Creates a delete statement.
    pub fn delete(
        index: impl Into<String>,
        doc_type: impl Into<String>,
        id: impl Into<String>,
    ) -> Self {
        Self {
            op: Operation::Delete,
            index: index.into(),
            doc_type: doc_type.into(),
            id: Some(id.into()),
            parent: None,
            body: None,
        }
    }

    /// Sets the target id.
    #[must_use]
    pub fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }

    /// Sets the parent reference.
    #[must_use]
    pub fn with_parent(mut self, parent: Option<String>) -> Self {
        self.parent = parent;
        self
    }
}

/// The store's verdict on one bulk item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    /// Operation the outcome belongs to.
    pub op: Operation,
    /// Document id, including ids generated for creates.
    #[serde(default)]
    pub id: Option<String>,
    /// HTTP-like status for the item.
    pub status: u16,
    /// Error reported for the item.
    #[serde(default)]
    pub error: Option<String>,
}

impl BulkOutcome {
    /// Creates a successful outcome.
    pub fn ok(op: Operation, id: impl Into<String>, status: u16) -> Self {
        Self {
            op,
            id: Some(id.into()),
            status,
            error: None,
        }
    }

    /// Creates a failed outcome.
    pub fn failed(
        op: Operation,
        id: Option<String>,
        status: u16,
        error: impl Into<String>,
    ) -> Self {
        Self {
            op,
            id,
            status,
            error: Some(error.into()),
        }
    }

    /// Returns true unless the store reported an error for the item.
    ///
    /// A delete of a missing document answers 404 without an error object
    /// and counts as a success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Returns the id generated by a successful create.
    #[must_use]
    pub fn created_id(&self) -> Option<&str> {
        match (self.op, self.is_success()) {
            (Operation::Create, true) => self.id.as_deref(),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_skips_absent_parts() {
        let stmt = WriteStatement::delete("default", "note", "1");
        let value = serde_json::to_value(&stmt).unwrap();
        assert_eq!(
            value,
            json!({"op": "delete", "index": "default", "type": "note", "id": "1"})
        );
    }

    #[test]
    fn wire_shape_with_parent_and_body() {
        let mut body = Source::new();
        body.insert("foo".into(), json!("bar"));
        let stmt = WriteStatement::create("default", "note", body).with_parent(Some("2".into()));
        let value = serde_json::to_value(&stmt).unwrap();
        assert_eq!(
            value,
            json!({
                "op": "create",
                "index": "default",
                "type": "note",
                "parent": "2",
                "body": {"foo": "bar"}
            })
        );
    }

    #[test]
    fn created_id_only_for_successful_creates() {
        assert_eq!(
            BulkOutcome::ok(Operation::Create, "x", 201).created_id(),
            Some("x")
        );
        assert_eq!(BulkOutcome::ok(Operation::Update, "x", 200).created_id(), None);
        let failed = BulkOutcome::failed(Operation::Create, Some("x".into()), 409, "conflict");
        assert!(!failed.is_success());
        assert_eq!(failed.created_id(), None);
    }

    #[test]
    fn missing_delete_is_not_a_failure() {
        let outcome = BulkOutcome {
            op: Operation::Delete,
            id: Some("gone".into()),
            status: 404,
            error: None,
        };
        assert!(outcome.is_success());
    }
}
