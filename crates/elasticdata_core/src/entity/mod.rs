//! Entity capabilities and handles.
//!
//! The change tracker only needs a small capability set from an entity: a
//! type name, a storage snapshot and keyed field access. Anything that
//! implements [`Entity`] can be tracked; [`Hydrate`] adds what the read path
//! needs to build entities from fetched documents.

mod handle;
mod token;

pub use handle::EntityRef;
pub use token::EntityToken;

use crate::unit_of_work::UnitOfWork;
use serde_json::Value;

/// A storage snapshot: field name to JSON value.
pub type Source = serde_json::Map<String, Value>;

/// Reserved field carrying the storage id.
pub const ID_FIELD: &str = "id";
/// Parent reference used for routing. Written as statement metadata, never diffed.
pub const PARENT_FIELD: &str = "_parent";
/// Relevance score attached to entities built from search hits.
pub const SCORE_FIELD: &str = "_score";
/// Score explanation attached to entities built from search hits.
pub const EXPLANATION_FIELD: &str = "_explanation";
/// Creation timestamp maintained for timestamped types.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Modification timestamp maintained for timestamped types.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Lifecycle hooks run by the unit of work around a flush.
///
/// Every hook defaults to a no-op. Hooks receive the unit of work so they
/// can track further entities; those are picked up by the next flush.
///
/// PRE hooks run before statements are built, so field mutations made in a
/// PRE hook end up in the written body or diff.
#[allow(unused_variables)]
pub trait Lifecycle {
    /// Runs before a create statement is built.
    fn pre_create(&mut self, uow: &mut UnitOfWork) {}

    /// Runs before an update statement is built.
    fn pre_update(&mut self, uow: &mut UnitOfWork) {}

    /// Runs before a delete statement is built.
    fn pre_delete(&mut self, uow: &mut UnitOfWork) {}

    /// Runs after a successful create.
    fn post_create(&mut self, uow: &mut UnitOfWork) {}

    /// Runs after a successful update.
    fn post_update(&mut self, uow: &mut UnitOfWork) {}

    /// Runs after a successful delete.
    fn post_delete(&mut self, uow: &mut UnitOfWork) {}
}

/// The capability set required to track an entity.
pub trait Entity: Lifecycle + Send + Sync + 'static {
    /// Document type name used when writing.
    fn entity_type(&self) -> &str;

    /// Produces the storage snapshot.
    ///
    /// The snapshot is owned; the change tracker keeps it as baseline and
    /// relies on it not aliasing live entity data.
    fn to_storage(&self) -> Source;

    /// Reads a raw field.
    fn field(&self, name: &str) -> Option<&Value>;

    /// Writes a raw field.
    fn set_field(&mut self, name: &str, value: Value);

    /// Removes a raw field, returning its previous value.
    fn remove_field(&mut self, name: &str) -> Option<Value>;

    /// Whether `created_at` / `updated_at` are maintained on write.
    fn timestamps(&self) -> bool {
        false
    }

    /// Returns the storage id, if the entity has been persisted.
    fn id(&self) -> Option<String> {
        self.field(ID_FIELD)
            .filter(|value| !value.is_null())
            .map(id_to_string)
    }

    /// Returns the parent reference, if any.
    fn parent(&self) -> Option<String> {
        self.field(PARENT_FIELD)
            .filter(|value| !value.is_null())
            .map(id_to_string)
    }
}

/// Entities the read path can build from fetched documents.
pub trait Hydrate: Entity + Sized {
    /// Document type name used when reading.
    fn doc_type() -> &'static str;

    /// Fields to fetch for a scope; `None` fetches the whole document.
    fn scope_fields(scope: &str) -> Option<Vec<String>>;

    /// Builds an entity from a fetched source.
    ///
    /// The source already carries `id` and, for search hits, `_score` and
    /// `_explanation` when present.
    fn hydrate(source: Source, scope: Option<&str>, highlight: Option<Value>) -> Self;
}

/// Renders an id value as the string the store addresses documents by.
pub fn id_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
