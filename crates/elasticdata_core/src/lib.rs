//! # elasticdata core
//!
//! Object-document mapping over a document search engine.
//!
//! This crate provides:
//! - Change tracking: a unit of work that diffs entities against their
//!   last-persisted snapshot
//! - Bulk writes with per-item outcome handling
//! - Typed read paths (get, multi-get, search) that track what they return
//! - Typed documents with scopes, field hooks and validation
//! - An in-memory store for tests and tools
//!
//! ## Architecture
//!
//! Entities are shared through [`EntityRef`] handles. The [`UnitOfWork`]
//! keeps one [`ChangeRecord`] per handle, keyed by the handle's
//! [`EntityToken`], and turns pending changes into [`WriteStatement`]s on
//! flush. The [`BulkDriver`] hands them to a [`DocumentStore`] and the
//! outcomes flow back into the records.
//!
//! ## Key Invariants
//!
//! - A baseline is a deep copy; it never aliases live entity data
//! - Outcomes pair with statements by position, one each
//! - Only successfully written records are re-baselined
//! - An update writes the diff, never the whole document

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bulk;
mod config;
mod document;
mod entity;
mod error;
mod manager;
mod repository;
mod statement;
mod store;
mod unit_of_work;

pub use bulk::{BulkDriver, BulkRun, DEFAULT_CHUNK_SIZE};
pub use config::ManagerConfig;
pub use document::{Document, Schema, Scope, GENERAL_ERROR_KEY};
pub use entity::{
    id_to_string, Entity, EntityRef, EntityToken, Hydrate, Lifecycle, Source, CREATED_AT_FIELD,
    EXPLANATION_FIELD, ID_FIELD, PARENT_FIELD, SCORE_FIELD, UPDATED_AT_FIELD,
};
pub use error::{
    ItemFailure, RepositoryError, RepositoryResult, StoreError, StoreResult, ValidationError,
};
pub use manager::{EntityManager, QueryResult, ReadOptions};
pub use repository::Repository;
pub use statement::{BulkOutcome, Operation, WriteStatement};
pub use store::{
    DocumentStore, GetRequest, GetResponse, InMemoryStore, MultiGetRequest, MultiGetResponse,
    Params, SearchHit, SearchHits, SearchRequest, SearchResponse,
};
pub use unit_of_work::{ChangeRecord, Diff, FieldChange, FlushReport, RecordState, UnitOfWork};
