//! In-process document store.

use crate::entity::Source;
use crate::error::{StoreError, StoreResult};
use crate::statement::{BulkOutcome, Operation, WriteStatement};
use crate::store::query::{self, Match};
use crate::store::{
    DocumentStore, GetRequest, GetResponse, MultiGetRequest, MultiGetResponse, Params,
    SearchHit, SearchHits, SearchRequest, SearchResponse,
};
use parking_lot::{Mutex, RwLock};
use serde_json::{json, Value};
use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use uuid::Uuid;

type ItemRejector = Box<dyn Fn(&WriteStatement) -> Option<(u16, String)> + Send + Sync>;

const DEFAULT_SIZE: usize = 10;

/// A [`DocumentStore`] that keeps documents in memory.
///
/// It answers like the search engine does for the operations the repository
/// layer uses:
///
/// - generated ids are simple-form UUIDs
/// - a create for an existing id fails with 409
/// - an update of a missing document fails with 404
/// - a delete of a missing document answers 404 without an error
/// - reads and searches on an index that was never written fail with a
///   not-found error
///
/// For tests it can also drop its connection, fail the next call, reject
/// selected bulk items and replay the bulk requests it received.
pub struct InMemoryStore {
    data: RwLock<Data>,
    connected: AtomicBool,
    fail_next: Mutex<Option<StoreError>>,
    rejector: RwLock<Option<ItemRejector>>,
    history: Mutex<Vec<Vec<WriteStatement>>>,
}

#[derive(Default)]
struct Data {
    indices: BTreeSet<String>,
    docs: HashMap<(String, String), HashMap<String, StoredDocument>>,
    next_seq: u64,
}

#[derive(Debug, Clone)]
struct StoredDocument {
    seq: u64,
    source: Source,
    parent: Option<String>,
}

impl Data {
    fn bucket(&self, index: &str, doc_type: &str) -> Option<&HashMap<String, StoredDocument>> {
        self.docs.get(&(index.to_owned(), doc_type.to_owned()))
    }

    fn bucket_mut(&mut self, index: &str, doc_type: &str) -> &mut HashMap<String, StoredDocument> {
        self.indices.insert(index.to_owned());
        self.docs
            .entry((index.to_owned(), doc_type.to_owned()))
            .or_default()
    }

    fn require_index(&self, index: &str) -> StoreResult<()> {
        if self.indices.contains(index) {
            Ok(())
        } else {
            Err(StoreError::not_found(format!("index_not_found_exception: [{index}]")))
        }
    }

    fn next_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

impl InMemoryStore {
    /// Creates an empty, connected store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(Data::default()),
            connected: AtomicBool::new(true),
            fail_next: Mutex::new(None),
            rejector: RwLock::new(None),
            history: Mutex::new(Vec::new()),
        }
    }

    /// Creates an index without documents.
    pub fn create_index(&self, index: impl Into<String>) {
        self.data.write().indices.insert(index.into());
    }

    /// Stores a document directly, bypassing bulk.
    pub fn insert(&self, index: &str, doc_type: &str, id: &str, source: Source) {
        let mut data = self.data.write();
        let seq = data.next_seq();
        data.bucket_mut(index, doc_type).insert(
            id.to_owned(),
            StoredDocument {
                seq,
                source,
                parent: None,
            },
        );
    }

    /// Returns a stored document.
    pub fn document(&self, index: &str, doc_type: &str, id: &str) -> Option<Source> {
        self.data
            .read()
            .bucket(index, doc_type)
            .and_then(|bucket| bucket.get(id))
            .map(|doc| doc.source.clone())
    }

    /// Returns the parent a document was routed with.
    pub fn parent_of(&self, index: &str, doc_type: &str, id: &str) -> Option<String> {
        self.data
            .read()
            .bucket(index, doc_type)
            .and_then(|bucket| bucket.get(id))
            .and_then(|doc| doc.parent.clone())
    }

    /// Returns the number of documents of a type.
    pub fn count(&self, index: &str, doc_type: &str) -> usize {
        self.data
            .read()
            .bucket(index, doc_type)
            .map_or(0, HashMap::len)
    }

    /// Sets the connected state. A disconnected store fails every call.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Makes the next call fail with `error`.
    pub fn fail_next(&self, error: StoreError) {
        *self.fail_next.lock() = Some(error);
    }

    /// Rejects every bulk item for which `rejector` returns a status and reason.
    pub fn reject_items<F>(&self, rejector: F)
    where
        F: Fn(&WriteStatement) -> Option<(u16, String)> + Send + Sync + 'static,
    {
        *self.rejector.write() = Some(Box::new(rejector));
    }

    /// Stops rejecting bulk items.
    pub fn accept_all_items(&self) {
        *self.rejector.write() = None;
    }

    /// Returns every bulk request received, oldest first.
    pub fn bulk_history(&self) -> Vec<Vec<WriteStatement>> {
        self.history.lock().clone()
    }

    fn check(&self) -> StoreResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(StoreError::NotConnected);
        }
        match self.fail_next.lock().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn apply(&self, data: &mut Data, stmt: &WriteStatement) -> BulkOutcome {
        if let Some((status, reason)) = self.rejector.read().as_ref().and_then(|f| f(stmt)) {
            return BulkOutcome::failed(stmt.op, stmt.id.clone(), status, reason);
        }

        match stmt.op {
            Operation::Create => {
                let id = stmt
                    .id
                    .clone()
                    .unwrap_or_else(|| Uuid::new_v4().simple().to_string());
                let seq = data.next_seq();
                let bucket = data.bucket_mut(&stmt.index, &stmt.doc_type);
                if bucket.contains_key(&id) {
                    let reason = format!(
                        "version_conflict_engine_exception: [{}][{id}]: document already exists",
                        stmt.doc_type
                    );
                    return BulkOutcome::failed(Operation::Create, Some(id), 409, reason);
                }
                bucket.insert(
                    id.clone(),
                    StoredDocument {
                        seq,
                        source: stmt.body.clone().unwrap_or_default(),
                        parent: stmt.parent.clone(),
                    },
                );
                BulkOutcome::ok(Operation::Create, id, 201)
            }
            Operation::Update => {
                let Some(id) = stmt.id.clone() else {
                    return BulkOutcome::failed(
                        Operation::Update,
                        None,
                        400,
                        "action_request_validation_exception: id is missing",
                    );
                };
                let bucket = data.bucket_mut(&stmt.index, &stmt.doc_type);
                let Some(doc) = bucket.get_mut(&id) else {
                    let reason = format!(
                        "document_missing_exception: [{}][{id}]: document missing",
                        stmt.doc_type
                    );
                    return BulkOutcome::failed(Operation::Update, Some(id), 404, reason);
                };
                if let Some(body) = &stmt.body {
                    for (field, value) in body {
                        doc.source.insert(field.clone(), value.clone());
                    }
                }
                BulkOutcome::ok(Operation::Update, id, 200)
            }
            Operation::Delete => {
                let id = stmt.id.clone().unwrap_or_default();
                let bucket = data.bucket_mut(&stmt.index, &stmt.doc_type);
                match bucket.remove(&id) {
                    Some(_) => BulkOutcome::ok(Operation::Delete, id, 200),
                    None => BulkOutcome {
                        op: Operation::Delete,
                        id: Some(id),
                        status: 404,
                        error: None,
                    },
                }
            }
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read();
        f.debug_struct("InMemoryStore")
            .field("indices", &data.indices)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl DocumentStore for InMemoryStore {
    fn get(&self, request: &GetRequest) -> StoreResult<GetResponse> {
        self.check()?;
        let data = self.data.read();
        data.require_index(&request.index)?;

        let doc = data
            .bucket(&request.index, &request.doc_type)
            .and_then(|bucket| bucket.get(&request.id));
        Ok(match doc {
            Some(doc) => GetResponse::found(
                request.id.clone(),
                projected(&doc.source, request.source_fields.as_deref()),
            ),
            None => GetResponse::missing(request.id.clone()),
        })
    }

    fn multi_get(&self, request: &MultiGetRequest) -> StoreResult<MultiGetResponse> {
        self.check()?;
        let data = self.data.read();
        data.require_index(&request.index)?;

        let bucket = data.bucket(&request.index, &request.doc_type);
        let docs = request
            .ids
            .iter()
            .map(|id| match bucket.and_then(|b| b.get(id)) {
                Some(doc) => GetResponse::found(
                    id.clone(),
                    projected(&doc.source, request.source_fields.as_deref()),
                ),
                None => GetResponse::missing(id.clone()),
            })
            .collect();
        Ok(MultiGetResponse { docs })
    }

    fn search(&self, request: &SearchRequest) -> StoreResult<SearchResponse> {
        self.check()?;
        let data = self.data.read();
        data.require_index(&request.index)?;

        let match_all = json!({"match_all": {}});
        let query = request.body.get("query").unwrap_or(&match_all);
        let explain = request.body.get("explain").and_then(Value::as_bool) == Some(true);
        let highlight_request = request.body.get("highlight").and_then(Value::as_object);
        let from = window(&request.body, &request.params, "from").unwrap_or(0);
        let size = window(&request.body, &request.params, "size").unwrap_or(DEFAULT_SIZE);

        let mut matched: Vec<(&String, &StoredDocument, Match)> = Vec::new();
        if let Some(bucket) = data.bucket(&request.index, &request.doc_type) {
            for (id, doc) in bucket {
                if let Some(found) = query::evaluate(query, id, &doc.source)? {
                    matched.push((id, doc, found));
                }
            }
        }
        matched.sort_by(|a, b| {
            b.2.score
                .total_cmp(&a.2.score)
                .then_with(|| a.1.seq.cmp(&b.1.seq))
        });

        let total = matched.len();
        let max_score = matched.iter().map(|m| m.2.score).reduce(f64::max);
        let hits = matched
            .into_iter()
            .skip(from)
            .take(size)
            .map(|(id, doc, found)| SearchHit {
                id: id.clone(),
                score: Some(found.score),
                source: Some(projected(&doc.source, request.source_fields.as_deref())),
                highlight: highlight_request
                    .and_then(|h| query::highlight(&doc.source, &found, h)),
                explanation: explain.then(|| {
                    json!({
                        "value": found.score,
                        "description": "in-memory relevance",
                        "details": []
                    })
                }),
            })
            .collect();

        let mut metadata = Source::new();
        metadata.insert("took".into(), json!(0));
        metadata.insert("timed_out".into(), json!(false));
        Ok(SearchResponse {
            hits: SearchHits {
                total: json!(total),
                max_score,
                hits,
            },
            metadata,
        })
    }

    fn bulk(&self, statements: &[WriteStatement]) -> StoreResult<Vec<BulkOutcome>> {
        self.check()?;
        self.history.lock().push(statements.to_vec());

        let mut data = self.data.write();
        Ok(statements
            .iter()
            .map(|stmt| self.apply(&mut data, stmt))
            .collect())
    }
}

fn projected(source: &Source, fields: Option<&[String]>) -> Source {
    match fields {
        Some(fields) => query::project(source, fields),
        None => source.clone(),
    }
}

fn window(body: &Value, params: &Params, key: &str) -> Option<usize> {
    params
        .get(key)
        .and_then(|v| v.parse().ok())
        .or_else(|| body.get(key).and_then(Value::as_u64).map(|v| v as usize))
}
