//! Document store abstraction.
//!
//! The repository layer talks to the search engine through
//! [`DocumentStore`]: fetch by id, multi-fetch, search and bulk write. The
//! request and response types follow the engine's REST payloads so a wire
//! client can deserialize straight into them.

mod memory;
mod query;

pub use memory::InMemoryStore;

use crate::entity::Source;
use crate::error::StoreResult;
use crate::statement::{BulkOutcome, WriteStatement};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Extra request parameters passed through to the store verbatim
/// (`routing`, `preference`, `refresh`, ...).
pub type Params = BTreeMap<String, String>;

/// A document store client.
///
/// Implementations report transport-level problems as
/// [`StoreError`](crate::error::StoreError). Item-level bulk failures are
/// not errors: they come back as failed [`BulkOutcome`]s.
pub trait DocumentStore: Send + Sync {
    /// Fetches one document.
    fn get(&self, request: &GetRequest) -> StoreResult<GetResponse>;

    /// Fetches several documents. The response holds one entry per
    /// requested id, found or not.
    fn multi_get(&self, request: &MultiGetRequest) -> StoreResult<MultiGetResponse>;

    /// Runs a search.
    fn search(&self, request: &SearchRequest) -> StoreResult<SearchResponse>;

    /// Executes write statements, returning one outcome per statement in
    /// submission order.
    fn bulk(&self, statements: &[WriteStatement]) -> StoreResult<Vec<BulkOutcome>>;
}

/// Fetch one document by id.
#[derive(Debug, Clone, PartialEq)]
pub struct GetRequest {
    /// Index to read from.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Document id.
    pub id: String,
    /// Fields to return; `None` returns the whole source.
    pub source_fields: Option<Vec<String>>,
    /// Pass-through parameters.
    pub params: Params,
}

/// Fetch several documents by id.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiGetRequest {
    /// Index to read from.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Document ids.
    pub ids: Vec<String>,
    /// Fields to return; `None` returns the whole source.
    pub source_fields: Option<Vec<String>>,
    /// Pass-through parameters.
    pub params: Params,
}

/// Run a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchRequest {
    /// Index to search.
    pub index: String,
    /// Document type.
    pub doc_type: String,
    /// Query body, passed to the store untouched.
    pub body: Value,
    /// Fields to return; `None` returns the whole source.
    pub source_fields: Option<Vec<String>>,
    /// Pass-through parameters.
    pub params: Params,
}

/// A fetched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetResponse {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Whether the document exists.
    #[serde(default)]
    pub found: bool,
    /// Document body.
    #[serde(rename = "_source", default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Source>,
}

impl GetResponse {
    /// A hit.
    pub fn found(id: impl Into<String>, source: Source) -> Self {
        Self {
            id: id.into(),
            found: true,
            source: Some(source),
        }
    }

    /// A miss.
    pub fn missing(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            found: false,
            source: None,
        }
    }
}

/// Multi-get answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiGetResponse {
    /// One entry per requested id.
    pub docs: Vec<GetResponse>,
}

/// Search answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// The hits section.
    pub hits: SearchHits,
    /// Everything else the store returned (`took`, `timed_out`,
    /// `aggregations`, ...).
    #[serde(flatten)]
    pub metadata: Source,
}

impl SearchResponse {
    /// Splits the response into its hits and the caller-facing metadata.
    ///
    /// The metadata drops the `hits` section and promotes `max_score` and
    /// `total` to the top level.
    pub fn into_parts(self) -> (Vec<SearchHit>, Source) {
        let SearchResponse { hits, mut metadata } = self;
        metadata.insert(
            "max_score".into(),
            hits.max_score.map_or(Value::Null, Value::from),
        );
        metadata.insert("total".into(), hits.total);
        (hits.hits, metadata)
    }
}

/// The hits section of a search answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHits {
    /// Total hit count, a number or `{value, relation}` depending on the
    /// engine version.
    #[serde(default)]
    pub total: Value,
    /// Best score.
    #[serde(default)]
    pub max_score: Option<f64>,
    /// The page of hits.
    #[serde(default)]
    pub hits: Vec<SearchHit>,
}

/// One search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Relevance score.
    #[serde(rename = "_score", default)]
    pub score: Option<f64>,
    /// Document body.
    #[serde(rename = "_source", default)]
    pub source: Option<Source>,
    /// Highlight fragments by field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub highlight: Option<Value>,
    /// Score explanation, when requested.
    #[serde(rename = "_explanation", default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Value>,
}
