//! Test fixtures and manager helpers.
//!
//! Provides fixture schemas mirroring the shapes the manager tests use, and
//! managers over an in-memory store.

use elasticdata_core::{
    Document, EntityManager, EntityRef, InMemoryStore, ManagerConfig, Schema, Scope, Source,
    UnitOfWork,
};
use serde_json::Value;
use std::sync::{Arc, Once};
use tracing_subscriber::EnvFilter;

/// Index used by every fixture manager.
pub const TEST_INDEX: &str = "test_index";

/// Plain schema with two scopes: `all` (`foo`, `bar`) and `small` (`foo`).
pub struct NoteSchema;

impl Schema for NoteSchema {
    const TYPE_NAME: &'static str = "manager_test_type";

    fn scopes() -> &'static [Scope] {
        &[("all", &["foo", "bar"]), ("small", &["foo"])]
    }
}

/// Document of [`NoteSchema`].
pub type Note = Document<NoteSchema>;

/// Schema with automatic timestamps.
pub struct TimestampedSchema;

impl Schema for TimestampedSchema {
    const TYPE_NAME: &'static str = "timestamped_type";
    const TIMESTAMPS: bool = true;
}

/// Document of [`TimestampedSchema`].
pub type TimestampedNote = Document<TimestampedSchema>;

/// Schema whose lifecycle hooks leave traces on the document.
///
/// PRE hooks copy `foo` into a stored field named after the hook. POST hooks
/// and `pre_delete` set a private marker (`_post_create`, ...), which is
/// visible on the instance but never stored.
pub struct CallbackSchema;

impl CallbackSchema {
    fn mark(doc: &mut Document<Self>, hook: &str) {
        let count = doc
            .get(hook)
            .and_then(Value::as_u64)
            .map_or(1, |n| n + 1);
        doc.set(hook, count);
    }
}

impl Schema for CallbackSchema {
    const TYPE_NAME: &'static str = "manager_callbacks_test_type";

    fn pre_create(doc: &mut Document<Self>, _uow: &mut UnitOfWork) {
        let foo = doc.get("foo").cloned().unwrap_or(Value::Null);
        doc.set("pre_create", foo);
    }

    fn pre_update(doc: &mut Document<Self>, _uow: &mut UnitOfWork) {
        let foo = doc.get("foo").cloned().unwrap_or(Value::Null);
        doc.set("pre_update", foo);
    }

    fn pre_delete(doc: &mut Document<Self>, _uow: &mut UnitOfWork) {
        Self::mark(doc, "_pre_delete");
    }

    fn post_create(doc: &mut Document<Self>, _uow: &mut UnitOfWork) {
        Self::mark(doc, "_post_create");
    }

    fn post_update(doc: &mut Document<Self>, _uow: &mut UnitOfWork) {
        Self::mark(doc, "_post_update");
    }

    fn post_delete(doc: &mut Document<Self>, _uow: &mut UnitOfWork) {
        Self::mark(doc, "_post_delete");
    }
}

/// Document of [`CallbackSchema`].
pub type CallbackNote = Document<CallbackSchema>;

/// Converts a JSON object literal into a [`Source`].
///
/// # Panics
///
/// Panics if `value` is not an object.
pub fn source(value: Value) -> Source {
    match value {
        Value::Object(map) => map,
        other => panic!("expected a JSON object, got {other}"),
    }
}

/// Wraps a JSON object into a tracked-ready document handle.
pub fn doc<S: Schema>(value: Value) -> EntityRef<Document<S>> {
    EntityRef::new(Document::new(source(value)))
}

/// Shorthand for `doc::<NoteSchema>`.
pub fn note(value: Value) -> EntityRef<Note> {
    doc::<NoteSchema>(value)
}

/// Configuration used by the fixture managers.
pub fn test_config() -> ManagerConfig {
    ManagerConfig::new().index(TEST_INDEX)
}

/// A manager over a fresh in-memory store.
pub fn fresh_manager() -> EntityManager<InMemoryStore> {
    init_tracing();
    EntityManager::new(InMemoryStore::new(), test_config())
}

/// Two managers over the same store.
///
/// Writing through one and reading through the other is how tests check
/// what actually reached the store.
pub fn shared_managers() -> (EntityManager<InMemoryStore>, EntityManager<InMemoryStore>) {
    init_tracing();
    let store = Arc::new(InMemoryStore::new());
    (
        EntityManager::with_shared_store(Arc::clone(&store), test_config()),
        EntityManager::with_shared_store(store, test_config()),
    )
}

/// Installs a log subscriber for test runs, once per process.
///
/// The filter comes from `RUST_LOG` and defaults to `warn`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}
