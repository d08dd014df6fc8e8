//! [`DocumentStore`] over the engine's REST protocol.

use crate::bulk;
use crate::client::{HttpClient, HttpRequest, HttpResponse, NDJSON};
use crate::config::HttpStoreConfig;
use elasticdata_core::{
    BulkOutcome, DocumentStore, GetRequest, GetResponse, MultiGetRequest, MultiGetResponse, Params,
    SearchRequest, SearchResponse, StoreError, StoreResult, WriteStatement,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, warn};

/// A document store speaking HTTP to a search engine node.
pub struct HttpStore<C: HttpClient> {
    config: HttpStoreConfig,
    client: C,
    connected: AtomicBool,
}

impl<C: HttpClient> HttpStore<C> {
    /// Creates a store over `client`.
    pub fn new(config: HttpStoreConfig, client: C) -> Self {
        Self {
            config,
            client,
            connected: AtomicBool::new(true),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &HttpStoreConfig {
        &self.config
    }

    /// Returns the HTTP client.
    pub fn client(&self) -> &C {
        &self.client
    }

    /// Returns true if the store is open and the client is healthy.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst) && self.client.is_healthy()
    }

    /// Closes the store. Every later call fails with [`StoreError::NotConnected`].
    pub fn close(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    fn call(&self, request: HttpRequest) -> StoreResult<HttpResponse> {
        if !self.is_connected() {
            return Err(StoreError::NotConnected);
        }
        let url = self.config.url(&request.path);
        let response = self
            .client
            .send(&url, &request)
            .map_err(StoreError::transport)?;
        debug!(
            method = request.method.as_str(),
            path = %request.path,
            status = response.status,
            "store call"
        );
        Ok(response)
    }

    fn call_ok(&self, request: HttpRequest) -> StoreResult<HttpResponse> {
        let response = self.call(request)?;
        if response.is_success() {
            Ok(response)
        } else {
            Err(status_error(&response))
        }
    }
}

/// Joins path segments, percent-encoding each one.
fn doc_path(segments: &[&str]) -> String {
    segments.iter().fold(String::new(), |mut path, segment| {
        path.push('/');
        path.push_str(&urlencoding::encode(segment));
        path
    })
}

#[cfg(feature = "reqwest")]
impl HttpStore<crate::client::ReqwestClient> {
    /// Connects to a node with a blocking `reqwest` client.
    pub fn connect(config: HttpStoreConfig) -> StoreResult<Self> {
        let client = crate::client::ReqwestClient::new(&config)?;
        Ok(Self::new(config, client))
    }
}

impl<C: HttpClient> DocumentStore for HttpStore<C> {
    fn get(&self, request: &GetRequest) -> StoreResult<GetResponse> {
        let path = doc_path(&[
            request.index.as_str(),
            request.doc_type.as_str(),
            request.id.as_str(),
        ]);
        let http = HttpRequest::get(path)
            .with_query(query_pairs(request.source_fields.as_deref(), &request.params));
        let response = self.call(http)?;

        if response.status == 404 {
            // A missing document answers 404 with `found: false`; a missing
            // index answers 404 with an error object.
            return match decode::<GetResponse>(&response.body) {
                Ok(doc) if !doc.found => Ok(GetResponse::missing(&request.id)),
                _ => Err(StoreError::not_found(format!(
                    "{}/{}/{}",
                    request.index, request.doc_type, request.id
                ))),
            };
        }
        if !response.is_success() {
            return Err(status_error(&response));
        }
        decode(&response.body)
    }

    fn multi_get(&self, request: &MultiGetRequest) -> StoreResult<MultiGetResponse> {
        let path = doc_path(&[request.index.as_str(), request.doc_type.as_str(), "_mget"]);
        let http = HttpRequest::post(path, json!({ "ids": request.ids }).to_string())
            .with_query(query_pairs(request.source_fields.as_deref(), &request.params));
        let response = self.call_ok(http)?;
        decode(&response.body)
    }

    fn search(&self, request: &SearchRequest) -> StoreResult<SearchResponse> {
        let path = doc_path(&[request.index.as_str(), request.doc_type.as_str(), "_search"]);
        let http = HttpRequest::post(path, request.body.to_string())
            .with_query(query_pairs(request.source_fields.as_deref(), &request.params));
        let response = self.call_ok(http)?;
        decode(&response.body)
    }

    fn bulk(&self, statements: &[WriteStatement]) -> StoreResult<Vec<BulkOutcome>> {
        if statements.is_empty() {
            return Ok(Vec::new());
        }
        let body = bulk::encode(statements)?;
        let http = HttpRequest::post("/_bulk", body).with_content_type(NDJSON);
        let response = self.call_ok(http)?;
        let outcomes = bulk::decode(&response.body)?;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            warn!(failed, total = outcomes.len(), "bulk request had item failures");
        }
        Ok(outcomes)
    }
}

impl<C: HttpClient> std::fmt::Debug for HttpStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpStore")
            .field("base_url", &self.config.base_url)
            .field("connected", &self.connected.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

fn query_pairs(source_fields: Option<&[String]>, params: &Params) -> Vec<(String, String)> {
    let mut pairs = Vec::with_capacity(params.len() + 1);
    if let Some(fields) = source_fields {
        pairs.push(("_source".to_owned(), fields.join(",")));
    }
    pairs.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    pairs
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(body)
        .map_err(|e| StoreError::Protocol(format!("Failed to decode response: {e}")))
}

fn status_error(response: &HttpResponse) -> StoreError {
    let message = match serde_json::from_slice::<Value>(&response.body) {
        Ok(body) => match body.get("error") {
            Some(error) => bulk::describe_error(error),
            None => body.to_string(),
        },
        Err(_) => String::from_utf8_lossy(&response.body).into_owned(),
    };
    StoreError::status(response.status, message)
}
