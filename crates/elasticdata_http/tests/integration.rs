//! Integration tests for the HTTP store against an in-memory node.

use elasticdata_core::{
    DocumentStore, EntityManager, GetRequest, InMemoryStore, MultiGetRequest, Operation, Params,
    ReadOptions, RecordState, RepositoryError, SearchRequest, Source, StoreError, WriteStatement,
};
use elasticdata_http::{HttpClient, HttpRequest, HttpResponse, HttpStore, HttpStoreConfig, Method};
use elasticdata_testkit::prelude::*;
use serde_json::{json, Value};
use std::sync::Arc;

const BASE_URL: &str = "http://node:9200";

/// An HTTP client that serves requests from an in-memory store, speaking
/// the same REST dialect as a real node.
struct LoopbackClient {
    node: Arc<InMemoryStore>,
}

impl LoopbackClient {
    fn handle(&self, path: &str, request: &HttpRequest) -> Result<(u16, Value), StoreError> {
        let segments = path
            .trim_start_matches('/')
            .split('/')
            .map(urlencoding::decode)
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::Protocol(e.to_string()))?;
        let segments: Vec<&str> = segments.iter().map(AsRef::as_ref).collect();
        let (source_fields, params) = split_query(&request.query);
        let body = || -> Result<Value, StoreError> {
            serde_json::from_str(request.body.as_deref().unwrap_or("{}"))
                .map_err(|e| StoreError::Protocol(e.to_string()))
        };

        match (request.method, segments.as_slice()) {
            (Method::Post, ["_bulk"]) => {
                let statements = parse_bulk(request.body.as_deref().unwrap_or_default())?;
                let outcomes = self.node.bulk(&statements)?;
                let items: Vec<Value> = outcomes
                    .iter()
                    .map(|o| {
                        let mut item = json!({"_id": o.id, "status": o.status});
                        if let Some(error) = &o.error {
                            item["error"] = json!({"type": error});
                        }
                        json!({ o.op.as_str(): item })
                    })
                    .collect();
                let errors = outcomes.iter().any(|o| !o.is_success());
                Ok((200, json!({"errors": errors, "items": items})))
            }
            (Method::Post, [index, doc_type, "_mget"]) => {
                let ids = body()?["ids"]
                    .as_array()
                    .map(|ids| ids.iter().filter_map(Value::as_str).map(str::to_owned).collect())
                    .unwrap_or_default();
                let response = self.node.multi_get(&MultiGetRequest {
                    index: (*index).to_owned(),
                    doc_type: (*doc_type).to_owned(),
                    ids,
                    source_fields,
                    params,
                })?;
                Ok((200, to_json(&response)))
            }
            (Method::Post, [index, doc_type, "_search"]) => {
                let response = self.node.search(&SearchRequest {
                    index: (*index).to_owned(),
                    doc_type: (*doc_type).to_owned(),
                    body: body()?,
                    source_fields,
                    params,
                })?;
                Ok((200, to_json(&response)))
            }
            (Method::Get, [index, doc_type, id]) => {
                let response = self.node.get(&GetRequest {
                    index: (*index).to_owned(),
                    doc_type: (*doc_type).to_owned(),
                    id: (*id).to_owned(),
                    source_fields,
                    params,
                })?;
                let status = if response.found { 200 } else { 404 };
                Ok((status, to_json(&response)))
            }
            _ => Ok((400, json!({"error": {"type": "illegal_argument_exception"}}))),
        }
    }
}

impl HttpClient for LoopbackClient {
    fn send(&self, url: &str, request: &HttpRequest) -> Result<HttpResponse, String> {
        let path = url.strip_prefix(BASE_URL).unwrap_or(url);
        let (status, body) = match self.handle(path, request) {
            Ok(answer) => answer,
            Err(StoreError::NotFound { resource }) => (
                404,
                json!({"error": {"type": "index_not_found_exception", "reason": resource}}),
            ),
            Err(StoreError::NotConnected) => return Err("connection refused".into()),
            Err(other) => (500, json!({"error": {"type": "exception", "reason": other.to_string()}})),
        };
        Ok(HttpResponse {
            status,
            body: body.to_string().into_bytes(),
        })
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Value {
    serde_json::to_value(value).unwrap()
}

fn split_query(query: &[(String, String)]) -> (Option<Vec<String>>, Params) {
    let mut source_fields = None;
    let mut params = Params::new();
    for (key, value) in query {
        if key == "_source" {
            source_fields = Some(value.split(',').map(str::to_owned).collect());
        } else {
            params.insert(key.clone(), value.clone());
        }
    }
    (source_fields, params)
}

fn parse_bulk(body: &str) -> Result<Vec<WriteStatement>, StoreError> {
    let protocol = |msg: &str| StoreError::Protocol(msg.to_owned());
    let mut lines = body.lines().map(serde_json::from_str::<Value>);
    let mut statements = Vec::new();

    while let Some(action) = lines.next() {
        let action = action.map_err(|e| protocol(&e.to_string()))?;
        let (op, meta) = action
            .as_object()
            .and_then(|m| m.iter().next())
            .ok_or_else(|| protocol("empty action"))?;
        let op: Operation =
            serde_json::from_value(Value::from(op.as_str())).map_err(|e| protocol(&e.to_string()))?;
        let text = |key: &str| meta.get(key).and_then(Value::as_str).map(str::to_owned);

        let body = match op {
            Operation::Delete => None,
            Operation::Create | Operation::Update => {
                let line = lines
                    .next()
                    .ok_or_else(|| protocol("missing source line"))?
                    .map_err(|e| protocol(&e.to_string()))?;
                let line = if op == Operation::Update { line["doc"].clone() } else { line };
                line.as_object().cloned()
            }
        };
        statements.push(WriteStatement {
            op,
            index: text("_index").unwrap_or_default(),
            doc_type: text("_type").unwrap_or_default(),
            id: text("_id"),
            parent: text("_parent"),
            body,
        });
    }
    Ok(statements)
}

fn node() -> Arc<InMemoryStore> {
    init_tracing();
    Arc::new(InMemoryStore::new())
}

fn manager(node: &Arc<InMemoryStore>) -> EntityManager<HttpStore<LoopbackClient>> {
    let client = LoopbackClient {
        node: Arc::clone(node),
    };
    EntityManager::new(HttpStore::new(HttpStoreConfig::new(BASE_URL), client), test_config())
}

fn stored(node: &InMemoryStore, id: &str) -> Option<Source> {
    node.document(TEST_INDEX, "manager_test_type", id)
}

#[test]
fn create_update_delete_over_http() {
    let node = node();
    let mut em = manager(&node);

    let e = note(json!({"foo": "bar", "bar": "x"}));
    em.persist(&e);
    assert_eq!(em.flush().unwrap().created, 1);
    let id = e.read().get("id").and_then(Value::as_str).unwrap().to_owned();
    assert_eq!(stored(&node, &id), Some(source(json!({"foo": "bar", "bar": "x"}))));

    e.write().set("bar", "baz");
    e.write().unset("foo");
    assert_eq!(em.flush().unwrap().updated, 1);
    let batch = node.bulk_history().pop().unwrap();
    assert_eq!(batch[0].body, Some(source(json!({"bar": "baz", "foo": null}))));
    assert_eq!(stored(&node, &id), Some(source(json!({"foo": null, "bar": "baz"}))));

    em.remove(&e);
    assert_eq!(em.flush().unwrap().deleted, 1);
    assert!(stored(&node, &id).is_none());
}

#[test]
fn reads_over_http_are_tracked() {
    let node = node();
    let mut writer = manager(&node);
    let a = note(json!({"foo": "bar foo", "bar": "one"}));
    let b = note(json!({"foo": "other", "bar": "two"}));
    writer.persist(&a);
    writer.persist(&b);
    writer.flush().unwrap();
    let id_a = a.read().get("id").and_then(Value::as_str).unwrap().to_owned();
    let id_b = b.read().get("id").and_then(Value::as_str).unwrap().to_owned();

    let mut reader = manager(&node);
    let fetched = reader.get::<Note>(&id_a).unwrap();
    assert_eq!(fetched.read().to_representation(), a.read().to_representation());

    let many = reader
        .get_many_with::<Note, _>([&id_a, &id_b], true, &ReadOptions::new().scope("small"))
        .unwrap();
    assert_eq!(many.len(), 2);
    assert!(!many[1].read().contains("bar"));

    let result = reader
        .query::<Note>(json!({
            "query": {"match": {"foo": "bar"}},
            "highlight": {"fields": {"foo": {}}}
        }))
        .unwrap();
    assert_eq!(result.len(), 1);
    assert_eq!(
        result.entities[0].read().highlight(),
        Some(&json!({"foo": ["<em>bar</em> foo"]}))
    );
    assert_eq!(result.total(), Some(1));
    assert!(reader.unit_of_work().contains(result.entities[0].token()));
}

#[test]
fn ids_with_reserved_characters_round_trip() {
    let node = node();
    node.insert(
        TEST_INDEX,
        "manager_test_type",
        "2024/05?draft#1",
        source(json!({"foo": "slashed"})),
    );
    let mut em = manager(&node);

    let fetched = em.get::<Note>("2024/05?draft#1").unwrap();
    assert_eq!(fetched.read().get("foo"), Some(&json!("slashed")));
    assert_eq!(
        fetched.read().get("id").and_then(Value::as_str),
        Some("2024/05?draft#1")
    );
}

#[test]
fn misses_over_http() {
    let node = node();
    let mut em = manager(&node);

    let err = em.get::<Note>("nope").unwrap_err();
    assert!(err.is_not_found());

    em.persist(&note(json!({"foo": "bar"})));
    em.flush().unwrap();
    let err = em.get::<Note>("nope").unwrap_err();
    assert!(err.is_not_found());

    let err = em.get_many::<Note, _>(["nope", "gone"], true).unwrap_err();
    match err {
        RepositoryError::EntityNotFound { ids, .. } => assert_eq!(ids, vec!["nope", "gone"]),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn refused_items_come_back_as_failures() {
    let node = node();
    let mut em = manager(&node);
    let e = note(json!({"foo": "bar"}));
    em.persist(&e);

    node.reject_items(|_| Some((429, "es_rejected_execution_exception".to_owned())));
    let report = em.flush().unwrap();
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].status, 429);
    assert_eq!(report.failures[0].reason, "es_rejected_execution_exception");
    assert_eq!(
        em.unit_of_work().record(e.token()).map(|r| r.state()),
        Some(RecordState::PendingCreate)
    );

    node.accept_all_items();
    assert_eq!(em.flush().unwrap().created, 1);
}

#[test]
fn parent_travels_in_action_metadata() {
    let node = node();
    let mut em = manager(&node);
    let e = note(json!({"foo": "child", "_parent": "p-7"}));
    em.persist(&e);
    em.flush().unwrap();

    let id = e.read().get("id").and_then(Value::as_str).unwrap().to_owned();
    assert_eq!(
        node.parent_of(TEST_INDEX, "manager_test_type", &id),
        Some("p-7".to_owned())
    );
}

#[test]
fn unreachable_node_fails_the_flush() {
    let node = node();
    let mut em = manager(&node);
    let e = note(json!({"foo": "bar"}));
    em.persist(&e);

    node.set_connected(false);
    let err = em.flush().unwrap_err();
    assert!(matches!(err, RepositoryError::Store { .. }));
    assert!(e.read().get("id").is_none());
}
