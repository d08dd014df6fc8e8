//! Query interpretation for the in-memory store.
//!
//! Covers the subset of the query DSL that tests and small tools need:
//! `match_all`, `term`, `terms`, `match`, `ids` and `bool` with `must`,
//! `filter`, `should` and `must_not`. Anything else is rejected the way the
//! engine rejects an unknown query, with a 400.

use crate::entity::Source;
use crate::error::{StoreError, StoreResult};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Result of matching one document.
#[derive(Debug, Default)]
pub(crate) struct Match {
    /// Relevance score.
    pub score: f64,
    /// Query terms that matched, by field. Used for highlighting.
    pub terms: BTreeMap<String, BTreeSet<String>>,
}

/// Matches a document against a query clause.
pub(crate) fn evaluate(query: &Value, id: &str, source: &Source) -> StoreResult<Option<Match>> {
    let mut found = Match::default();
    if matches(query, id, source, &mut found)? {
        if found.score == 0.0 {
            found.score = 1.0;
        }
        Ok(Some(found))
    } else {
        Ok(None)
    }
}

fn matches(clause: &Value, id: &str, source: &Source, acc: &mut Match) -> StoreResult<bool> {
    let (kind, args) = single_entry(clause)?;
    match kind {
        "match_all" => Ok(true),
        "ids" => {
            let values = args.get("values").and_then(Value::as_array);
            Ok(values.is_some_and(|values| values.iter().any(|v| v.as_str() == Some(id))))
        }
        "term" => {
            let (field, args) = single_entry(args)?;
            let expected = args.get("value").unwrap_or(args);
            Ok(field_values(source, field).any(|v| v == expected))
        }
        "terms" => {
            let (field, expected) = single_entry(args)?;
            let expected = expected
                .as_array()
                .ok_or_else(|| parse_error(format!("[terms] query for [{field}] needs an array")))?;
            Ok(field_values(source, field).any(|v| expected.contains(v)))
        }
        "match" => {
            let (field, args) = single_entry(args)?;
            let text = match args.get("query").unwrap_or(args) {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            let wanted: BTreeSet<String> = tokenize(&text).collect();
            let present: BTreeSet<String> = field_values(source, field)
                .filter_map(text_of)
                .flat_map(|t| tokenize(&t).collect::<Vec<_>>())
                .collect();
            let hit: BTreeSet<String> = wanted.intersection(&present).cloned().collect();
            if hit.is_empty() {
                return Ok(false);
            }
            acc.score += hit.len() as f64;
            acc.terms.entry(field.to_owned()).or_default().extend(hit);
            Ok(true)
        }
        "bool" => matches_bool(args, id, source, acc),
        other => Err(parse_error(format!("no [query] registered for [{other}]"))),
    }
}

fn matches_bool(args: &Value, id: &str, source: &Source, acc: &mut Match) -> StoreResult<bool> {
    let must = clauses(args, "must");
    let filter = clauses(args, "filter");
    let should = clauses(args, "should");
    let must_not = clauses(args, "must_not");

    for clause in must.iter().chain(filter.iter()) {
        if !matches(clause, id, source, acc)? {
            return Ok(false);
        }
    }

    for clause in &must_not {
        if matches(clause, id, source, &mut Match::default())? {
            return Ok(false);
        }
    }

    let mut any_should = false;
    for clause in &should {
        any_should |= matches(clause, id, source, acc)?;
    }

    Ok(any_should || should.is_empty() || !(must.is_empty() && filter.is_empty()))
}

/// Builds the `highlight` section of a hit.
///
/// Only fields listed under `highlight.fields` that matched a `match`
/// clause produce fragments.
pub(crate) fn highlight(source: &Source, found: &Match, request: &Map<String, Value>) -> Option<Value> {
    let fields = request.get("fields")?.as_object()?;
    let mut out = Map::new();

    for field in fields.keys() {
        let Some(terms) = found.terms.get(field) else {
            continue;
        };
        let fragments: Vec<Value> = field_values(source, field)
            .filter_map(text_of)
            .filter_map(|text| emphasize(&text, terms))
            .map(Value::String)
            .collect();
        if !fragments.is_empty() {
            out.insert(field.clone(), Value::Array(fragments));
        }
    }

    if out.is_empty() {
        None
    } else {
        Some(Value::Object(out))
    }
}

/// Keeps only the listed top-level fields.
pub(crate) fn project(source: &Source, fields: &[String]) -> Source {
    source
        .iter()
        .filter(|(key, _)| fields.iter().any(|f| f == *key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

fn emphasize(text: &str, terms: &BTreeSet<String>) -> Option<String> {
    let mut out = String::with_capacity(text.len() + 16);
    let mut word = String::new();
    let mut touched = false;

    let mut flush = |word: &mut String, out: &mut String| {
        if word.is_empty() {
            return;
        }
        if terms.contains(&word.to_lowercase()) {
            out.push_str("<em>");
            out.push_str(word);
            out.push_str("</em>");
            touched = true;
        } else {
            out.push_str(word);
        }
        word.clear();
    };

    for c in text.chars() {
        if c.is_alphanumeric() {
            word.push(c);
        } else {
            flush(&mut word, &mut out);
            out.push(c);
        }
    }
    flush(&mut word, &mut out);

    touched.then_some(out)
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
}

fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Values of a (possibly dotted) field, flattening arrays.
fn field_values<'a>(source: &'a Source, path: &str) -> impl Iterator<Item = &'a Value> {
    let mut parts = path.split('.');
    let first = parts.next().and_then(|p| source.get(p));
    let value = parts.fold(first, |value, part| value.and_then(|v| v.get(part)));

    let items: Vec<&Value> = match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(value) => vec![value],
    };
    items.into_iter()
}

fn clauses<'a>(args: &'a Value, key: &str) -> Vec<&'a Value> {
    match args.get(key) {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(item @ Value::Object(_)) => vec![item],
        _ => Vec::new(),
    }
}

fn single_entry(value: &Value) -> StoreResult<(&str, &Value)> {
    let object = value
        .as_object()
        .ok_or_else(|| parse_error(format!("expected an object, found {value}")))?;
    let mut entries = object.iter();
    match (entries.next(), entries.next()) {
        (Some((key, inner)), None) => Ok((key.as_str(), inner)),
        _ => Err(parse_error(format!(
            "expected exactly one key, found {}",
            object.len()
        ))),
    }
}

fn parse_error(message: String) -> StoreError {
    StoreError::status(400, format!("parsing_exception: {message}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Source {
        value.as_object().cloned().unwrap()
    }

    fn hit(query: Value, source: &Source) -> bool {
        evaluate(&query, "id-1", source).unwrap().is_some()
    }

    #[test]
    fn term_and_terms() {
        let source = doc(json!({"tag": "a", "list": ["x", "y"], "n": 3}));
        assert!(hit(json!({"term": {"tag": "a"}}), &source));
        assert!(hit(json!({"term": {"tag": {"value": "a"}}}), &source));
        assert!(hit(json!({"term": {"list": "y"}}), &source));
        assert!(hit(json!({"term": {"n": 3}}), &source));
        assert!(!hit(json!({"term": {"tag": "b"}}), &source));
        assert!(hit(json!({"terms": {"tag": ["b", "a"]}}), &source));
    }

    #[test]
    fn match_is_token_based_and_case_insensitive() {
        let source = doc(json!({"title": "The Quick brown fox"}));
        let found = evaluate(&json!({"match": {"title": "quick dog"}}), "1", &source)
            .unwrap()
            .unwrap();
        assert_eq!(found.score, 1.0);
        assert!(found.terms["title"].contains("quick"));
        assert!(!hit(json!({"match": {"title": {"query": "cat"}}}), &source));
    }

    #[test]
    fn ids_query() {
        let source = Source::new();
        assert!(hit(json!({"ids": {"values": ["id-1", "id-2"]}}), &source));
        assert!(!hit(json!({"ids": {"values": ["id-2"]}}), &source));
    }

    #[test]
    fn bool_combinations() {
        let source = doc(json!({"a": 1, "b": "x"}));
        assert!(hit(
            json!({"bool": {"must": [{"term": {"a": 1}}, {"term": {"b": "x"}}]}}),
            &source
        ));
        assert!(!hit(
            json!({"bool": {"must": {"term": {"a": 1}}, "must_not": {"term": {"b": "x"}}}}),
            &source
        ));
        assert!(hit(
            json!({"bool": {"should": [{"term": {"a": 2}}, {"term": {"a": 1}}]}}),
            &source
        ));
        assert!(!hit(json!({"bool": {"should": [{"term": {"a": 2}}]}}), &source));
    }

    #[test]
    fn dotted_paths() {
        let source = doc(json!({"author": {"name": "ann"}}));
        assert!(hit(json!({"term": {"author.name": "ann"}}), &source));
    }

    #[test]
    fn unknown_query_is_rejected() {
        let err = evaluate(&json!({"fuzzy": {"a": "b"}}), "1", &Source::new()).unwrap_err();
        assert!(matches!(err, StoreError::Transport { status: Some(400), .. }));
    }

    #[test]
    fn highlight_wraps_matched_words() {
        let source = doc(json!({"title": "Hello, hello world"}));
        let found = evaluate(&json!({"match": {"title": "hello"}}), "1", &source)
            .unwrap()
            .unwrap();
        let request = doc(json!({"fields": {"title": {}}}));
        assert_eq!(
            highlight(&source, &found, &request),
            Some(json!({"title": ["<em>Hello</em>, <em>hello</em> world"]}))
        );
    }

    #[test]
    fn projection_keeps_listed_fields() {
        let source = doc(json!({"a": 1, "b": 2, "c": 3}));
        let fields = vec!["a".to_owned(), "c".to_owned(), "z".to_owned()];
        assert_eq!(project(&source, &fields), doc(json!({"a": 1, "c": 3})));
    }
}
