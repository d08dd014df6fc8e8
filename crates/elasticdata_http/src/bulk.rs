//! Bulk endpoint wire format.
//!
//! A bulk request is NDJSON: one action line per statement, followed by a
//! source line for `create` (the document) and `update` (`{"doc": diff}`).
//! Deletes have no source line. The response carries one item per action,
//! in order.

use elasticdata_core::{BulkOutcome, Operation, StoreError, StoreResult, WriteStatement};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

/// Encodes statements as a bulk request body.
pub fn encode(statements: &[WriteStatement]) -> StoreResult<String> {
    let mut out = String::new();
    for stmt in statements {
        let mut meta = Map::new();
        meta.insert("_index".into(), Value::from(stmt.index.as_str()));
        meta.insert("_type".into(), Value::from(stmt.doc_type.as_str()));
        if let Some(id) = &stmt.id {
            meta.insert("_id".into(), Value::from(id.as_str()));
        }
        if let Some(parent) = &stmt.parent {
            meta.insert("_parent".into(), Value::from(parent.as_str()));
        }
        push_line(&mut out, &json!({ stmt.op.as_str(): meta }))?;

        match (stmt.op, &stmt.body) {
            (Operation::Create, Some(body)) => push_line(&mut out, body)?,
            (Operation::Update, Some(body)) => push_line(&mut out, &json!({ "doc": body }))?,
            (Operation::Delete, _) => {}
            (op, None) => {
                return Err(StoreError::Protocol(format!("{op} statement without a body")));
            }
        }
    }
    Ok(out)
}

fn push_line<T: serde::Serialize + ?Sized>(out: &mut String, value: &T) -> StoreResult<()> {
    let line = serde_json::to_string(value)
        .map_err(|e| StoreError::Protocol(format!("Failed to encode bulk line: {e}")))?;
    out.push_str(&line);
    out.push('\n');
    Ok(())
}

#[derive(Deserialize)]
struct BulkResponse {
    items: Vec<BTreeMap<String, BulkItem>>,
}

#[derive(Deserialize)]
struct BulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Decodes a bulk response body into outcomes, in item order.
pub fn decode(body: &[u8]) -> StoreResult<Vec<BulkOutcome>> {
    let response: BulkResponse = serde_json::from_slice(body)
        .map_err(|e| StoreError::Protocol(format!("Failed to decode bulk response: {e}")))?;

    response
        .items
        .into_iter()
        .map(|item| {
            let (op, item) = item
                .into_iter()
                .next()
                .ok_or_else(|| StoreError::Protocol("empty bulk item".into()))?;
            let op = match op.as_str() {
                "create" | "index" => Operation::Create,
                "update" => Operation::Update,
                "delete" => Operation::Delete,
                other => {
                    return Err(StoreError::Protocol(format!("unknown bulk action: {other}")));
                }
            };
            Ok(BulkOutcome {
                op,
                id: item.id,
                status: item.status,
                error: item.error.as_ref().map(describe_error),
            })
        })
        .collect()
}

/// Renders an engine error object as `type: reason`.
pub(crate) fn describe_error(error: &Value) -> String {
    let kind = error.get("type").and_then(Value::as_str);
    let reason = error.get("reason").and_then(Value::as_str);
    match (kind, reason) {
        (Some(kind), Some(reason)) => format!("{kind}: {reason}"),
        (Some(text), None) | (None, Some(text)) => text.to_owned(),
        (None, None) => match error {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        },
    }
}
