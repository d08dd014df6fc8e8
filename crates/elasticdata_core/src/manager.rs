//! Entity manager: the unit of work bound to a store, plus the read path.

use crate::bulk::BulkDriver;
use crate::config::ManagerConfig;
use crate::entity::{Entity, EntityRef, Hydrate, Source, EXPLANATION_FIELD, ID_FIELD, SCORE_FIELD};
use crate::error::{RepositoryError, RepositoryResult, StoreError};
use crate::repository::Repository;
use crate::store::{DocumentStore, GetRequest, MultiGetRequest, Params, SearchRequest};
use crate::unit_of_work::{Diff, FlushReport, UnitOfWork};
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

/// Options shared by every read operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadOptions {
    /// Scope to read with. Only the scope's fields are fetched.
    pub scope: Option<String>,
    /// Parameters passed through to the store.
    pub params: Params,
}

impl ReadOptions {
    /// Creates empty options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads with a scope.
    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Adds a pass-through parameter.
    #[must_use]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    fn source_fields<E: Hydrate>(&self) -> Option<Vec<String>> {
        self.scope.as_deref().and_then(E::scope_fields)
    }
}

/// Entities returned by a search, with the response metadata.
#[derive(Debug, Clone)]
pub struct QueryResult<E> {
    /// Hydrated, tracked entities in hit order.
    pub entities: Vec<EntityRef<E>>,
    /// Everything the store returned besides the hits, with `max_score` and
    /// `total` at the top level.
    pub meta: Source,
}

impl<E> QueryResult<E> {
    /// Returns the number of entities.
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if nothing matched.
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns the total hit count reported by the store.
    pub fn total(&self) -> Option<u64> {
        match self.meta.get("total") {
            Some(Value::Object(total)) => total.get("value").and_then(Value::as_u64),
            Some(total) => total.as_u64(),
            None => None,
        }
    }

    /// Returns the best score.
    pub fn max_score(&self) -> Option<f64> {
        self.meta.get("max_score").and_then(Value::as_f64)
    }
}

/// A unit of work bound to a document store.
///
/// Writes are collected with [`persist`](Self::persist) and
/// [`remove`](Self::remove) and sent by [`flush`](Self::flush). Every entity
/// returned by a read is tracked as clean, so mutating it and flushing
/// writes exactly the changed fields.
///
/// # Example
///
/// ```rust
/// use elasticdata_core::{Document, EntityManager, EntityRef, InMemoryStore, ManagerConfig, Schema};
/// use serde_json::json;
///
/// struct Note;
///
/// impl Schema for Note {
///     const TYPE_NAME: &'static str = "note";
/// }
///
/// let mut manager = EntityManager::new(InMemoryStore::new(), ManagerConfig::default());
///
/// let note = EntityRef::new(Document::<Note>::from_value(json!({"text": "hi"})).unwrap());
/// manager.persist(&note);
/// manager.flush().unwrap();
///
/// let id = note.read().get("id").cloned().unwrap();
/// let fetched = manager.get::<Document<Note>>(id.as_str().unwrap()).unwrap();
/// assert_eq!(fetched.read().get("text"), Some(&json!("hi")));
/// ```
pub struct EntityManager<S: DocumentStore> {
    store: Arc<S>,
    config: ManagerConfig,
    uow: UnitOfWork,
}

impl<S: DocumentStore> EntityManager<S> {
    /// Creates a manager owning its store.
    pub fn new(store: S, config: ManagerConfig) -> Self {
        Self::with_shared_store(Arc::new(store), config)
    }

    /// Creates a manager over a store shared with other managers.
    pub fn with_shared_store(store: Arc<S>, config: ManagerConfig) -> Self {
        let uow = UnitOfWork::new(config.index.clone()).with_evict_deleted(config.evict_deleted);
        Self { store, config, uow }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Returns the underlying store client.
    pub fn client(&self) -> &S {
        &self.store
    }

    /// Returns a shared handle to the store client.
    pub fn shared_client(&self) -> Arc<S> {
        Arc::clone(&self.store)
    }

    /// Returns the unit of work.
    pub fn unit_of_work(&self) -> &UnitOfWork {
        &self.uow
    }

    /// Returns the unit of work, mutably.
    pub fn unit_of_work_mut(&mut self) -> &mut UnitOfWork {
        &mut self.uow
    }

    /// Builds a repository bound to this manager.
    pub fn repository<'m, R: Repository<'m, S>>(&'m mut self) -> R {
        R::from_manager(self)
    }

    /// Schedules an entity for creation.
    ///
    /// An entity that is already tracked is switched to creation as well.
    pub fn persist<E: Entity>(&mut self, entity: &EntityRef<E>) {
        self.uow.persist(entity);
    }

    /// Schedules an entity for deletion.
    pub fn remove<E: Entity>(&mut self, entity: &EntityRef<E>) {
        self.uow.remove(entity);
    }

    /// Writes every pending change.
    ///
    /// Items the store refused are listed in the report; call
    /// [`FlushReport::into_result`] to treat them as an error. A failed bulk
    /// request returns its error after the chunks sent before it have been
    /// applied.
    pub fn flush(&mut self) -> RepositoryResult<FlushReport> {
        let driver = BulkDriver::new(&*self.store).with_chunk_size(self.config.chunk_size);
        self.uow.flush(&driver)
    }

    /// Forgets every tracked entity without writing.
    pub fn clear(&mut self) {
        self.uow.untrack_all();
    }

    /// Returns the pending diff of a tracked entity.
    pub fn diff_of<E: Entity>(&mut self, entity: &EntityRef<E>) -> Option<Diff> {
        self.uow
            .record_mut(entity.token())
            .and_then(|record| record.diff().cloned())
    }

    /// Fetches one entity by id.
    pub fn get<E: Hydrate>(&mut self, id: &str) -> RepositoryResult<EntityRef<E>> {
        self.get_with(id, &ReadOptions::default())
    }

    /// Fetches one entity by id with options.
    ///
    /// A missing document, whether the store says so with a 404 or with
    /// `found: false`, is [`RepositoryError::EntityNotFound`].
    pub fn get_with<E: Hydrate>(
        &mut self,
        id: &str,
        options: &ReadOptions,
    ) -> RepositoryResult<EntityRef<E>> {
        let request = GetRequest {
            index: self.config.index.clone(),
            doc_type: E::doc_type().to_owned(),
            id: id.to_owned(),
            source_fields: options.source_fields::<E>(),
            params: options.params.clone(),
        };
        debug!(doc_type = E::doc_type(), id, "get");

        let response = self
            .store
            .get(&request)
            .map_err(|e| lookup_error(E::doc_type(), vec![id.to_owned()], e))?;

        match response.source {
            Some(source) if response.found => {
                Ok(self.track_fetched(source, &response.id, options.scope.as_deref(), None))
            }
            _ => Err(RepositoryError::not_found(E::doc_type(), vec![id.to_owned()])),
        }
    }

    /// Fetches several entities by id.
    ///
    /// With `require_all`, any missing id fails the call, naming every
    /// missing id. Otherwise missing ids are skipped.
    pub fn get_many<E, I>(&mut self, ids: I, require_all: bool) -> RepositoryResult<Vec<EntityRef<E>>>
    where
        E: Hydrate,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        self.get_many_with(ids, require_all, &ReadOptions::default())
    }

    /// Fetches several entities by id with options.
    pub fn get_many_with<E, I>(
        &mut self,
        ids: I,
        require_all: bool,
        options: &ReadOptions,
    ) -> RepositoryResult<Vec<EntityRef<E>>>
    where
        E: Hydrate,
        I: IntoIterator,
        I::Item: Into<String>,
    {
        let ids: Vec<String> = ids.into_iter().map(Into::into).collect();
        debug!(doc_type = E::doc_type(), ids = ids.len(), require_all, "get_many");

        let request = MultiGetRequest {
            index: self.config.index.clone(),
            doc_type: E::doc_type().to_owned(),
            ids,
            source_fields: options.source_fields::<E>(),
            params: options.params.clone(),
        };
        let response = self
            .store
            .multi_get(&request)
            .map_err(|e| lookup_error(E::doc_type(), request.ids.clone(), e))?;

        if require_all {
            let missing: Vec<String> = response
                .docs
                .iter()
                .filter(|doc| !doc.found)
                .map(|doc| doc.id.clone())
                .collect();
            if !missing.is_empty() {
                return Err(RepositoryError::not_found(E::doc_type(), missing));
            }
        }

        let scope = options.scope.as_deref();
        let mut entities = Vec::with_capacity(response.docs.len());
        for doc in response.docs {
            if let (true, Some(source)) = (doc.found, doc.source) {
                entities.push(self.track_fetched(source, &doc.id, scope, None));
            }
        }
        Ok(entities)
    }

    /// Runs a search.
    pub fn query<E: Hydrate>(&mut self, body: Value) -> RepositoryResult<QueryResult<E>> {
        self.query_with(body, &ReadOptions::default())
    }

    /// Runs a search with options.
    ///
    /// Each hit becomes an entity carrying `_score`, `_explanation` when the
    /// store returned one, and the hit's highlight.
    pub fn query_with<E: Hydrate>(
        &mut self,
        body: Value,
        options: &ReadOptions,
    ) -> RepositoryResult<QueryResult<E>> {
        let request = SearchRequest {
            index: self.config.index.clone(),
            doc_type: E::doc_type().to_owned(),
            body,
            source_fields: options.source_fields::<E>(),
            params: options.params.clone(),
        };
        debug!(doc_type = E::doc_type(), "query");

        let response = self
            .store
            .search(&request)
            .map_err(|e| RepositoryError::store("Transport returned error", e))?;

        let (hits, meta) = response.into_parts();
        let scope = options.scope.as_deref();
        let mut entities = Vec::with_capacity(hits.len());
        for hit in hits {
            let mut source = hit.source.unwrap_or_default();
            source.insert(
                SCORE_FIELD.to_owned(),
                hit.score.map_or(Value::Null, Value::from),
            );
            if let Some(explanation) = hit.explanation {
                source.insert(EXPLANATION_FIELD.to_owned(), explanation);
            }
            entities.push(self.track_fetched(source, &hit.id, scope, hit.highlight));
        }
        debug!(doc_type = E::doc_type(), hits = entities.len(), "query answered");

        Ok(QueryResult { entities, meta })
    }

    /// Runs a search that must match exactly one document.
    pub fn query_one<E: Hydrate>(&mut self, body: Value) -> RepositoryResult<EntityRef<E>> {
        self.query_one_with(body, &ReadOptions::default())
    }

    /// Runs a search that must match exactly one document, with options.
    ///
    /// Zero hits and several hits both fail with
    /// [`RepositoryError::UnexpectedHitCount`].
    pub fn query_one_with<E: Hydrate>(
        &mut self,
        body: Value,
        options: &ReadOptions,
    ) -> RepositoryResult<EntityRef<E>> {
        let mut result = self.query_with::<E>(body, options)?;
        if result.entities.len() == 1 {
            if let Some(entity) = result.entities.pop() {
                return Ok(entity);
            }
        }
        Err(RepositoryError::UnexpectedHitCount {
            found: result.entities.len(),
        })
    }

    fn track_fetched<E: Hydrate>(
        &mut self,
        mut source: Source,
        id: &str,
        scope: Option<&str>,
        highlight: Option<Value>,
    ) -> EntityRef<E> {
        source.insert(ID_FIELD.to_owned(), Value::String(id.to_owned()));
        let entity = EntityRef::new(E::hydrate(source, scope, highlight));
        self.uow.attach(&entity);
        entity
    }
}

impl<S: DocumentStore> std::fmt::Debug for EntityManager<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityManager")
            .field("config", &self.config)
            .field("tracked", &self.uow.len())
            .finish_non_exhaustive()
    }
}

/// Translates a failed lookup: misses become `EntityNotFound`, anything else
/// stays a store error.
fn lookup_error(doc_type: &str, ids: Vec<String>, error: StoreError) -> RepositoryError {
    if error.is_not_found() {
        RepositoryError::EntityNotFound {
            doc_type: doc_type.to_owned(),
            ids,
            source: Some(error),
        }
    } else {
        RepositoryError::store(format!("Lookup of \"{doc_type}\" failed"), error)
    }
}
