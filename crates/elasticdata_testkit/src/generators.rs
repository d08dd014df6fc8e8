//! Property-based test generators using proptest.
//!
//! Provides strategies for documents and field edits. Generated field names
//! never start with `_` and never collide with the reserved fields, so
//! every generated document is fully storable.

use elasticdata_core::{Source, CREATED_AT_FIELD, ID_FIELD, UPDATED_AT_FIELD};
use proptest::prelude::*;
use serde_json::Value;

/// Strategy for generating storable field names.
pub fn field_name_strategy() -> impl Strategy<Value = String> {
    prop::string::string_regex("[a-z][a-z0-9_]{0,11}")
        .expect("Invalid regex")
        .prop_filter("Reserved field names are excluded", |s| {
            s != ID_FIELD && s != CREATED_AT_FIELD && s != UPDATED_AT_FIELD
        })
}

/// Strategy for generating scalar JSON values.
pub fn scalar_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        prop::string::string_regex("[a-zA-Z0-9 ]{0,16}")
            .expect("Invalid regex")
            .prop_map(Value::from),
    ]
}

/// Strategy for generating JSON values up to two levels deep.
pub fn value_strategy() -> impl Strategy<Value = Value> {
    scalar_value_strategy().prop_recursive(2, 16, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z]{1,6}", inner, 0..4)
                .prop_map(|m| Value::Object(m.into_iter().collect())),
        ]
    })
}

/// Strategy for generating documents (without an id).
pub fn source_strategy() -> impl Strategy<Value = Source> {
    prop::collection::btree_map(field_name_strategy(), value_strategy(), 0..8)
        .prop_map(|m| m.into_iter().collect())
}

/// A single edit applied to a document between flushes.
#[derive(Debug, Clone)]
pub enum FieldEdit {
    /// Set a field to a value.
    Set(String, Value),
    /// Remove a field.
    Remove(String),
}

impl FieldEdit {
    /// Applies the edit to a source map.
    pub fn apply(&self, source: &mut Source) {
        match self {
            FieldEdit::Set(field, value) => {
                source.insert(field.clone(), value.clone());
            }
            FieldEdit::Remove(field) => {
                source.remove(field);
            }
        }
    }
}

/// Strategy for generating a sequence of edits.
pub fn edits_strategy() -> impl Strategy<Value = Vec<FieldEdit>> {
    let edit = prop_oneof![
        3 => (field_name_strategy(), value_strategy()).prop_map(|(f, v)| FieldEdit::Set(f, v)),
        1 => field_name_strategy().prop_map(FieldEdit::Remove),
    ];
    prop::collection::vec(edit, 0..8)
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn generated_field_names_are_storable(name in field_name_strategy()) {
            prop_assert!(!name.starts_with('_'));
            prop_assert!(name != ID_FIELD);
        }

        #[test]
        fn generated_sources_have_no_id(source in source_strategy()) {
            prop_assert!(!source.contains_key(ID_FIELD));
        }
    }
}
