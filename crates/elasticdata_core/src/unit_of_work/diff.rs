//! Field-level diff between a baseline and the current snapshot.

use crate::entity::Source;
use serde_json::Value;
use std::collections::BTreeMap;

/// What happened to a single field since the baseline.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldChange {
    /// The field is new or holds a different value.
    Set(Value),
    /// The field existed in the baseline and is gone now.
    Removed,
}

/// The set of fields that changed since the baseline.
///
/// A field absent from the diff is unchanged. A removed field is kept as
/// [`FieldChange::Removed`] and renders as an explicit `null` in the update
/// body, which the store reads as "clear this field".
///
/// A `Diff` is never empty: [`Diff::compute`] returns `None` instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Diff {
    changes: BTreeMap<String, FieldChange>,
}

impl Diff {
    /// Compares two snapshots.
    ///
    /// Values are compared by equality. Returns `None` when nothing changed.
    pub fn compute(baseline: &Source, current: &Source) -> Option<Self> {
        let mut changes = BTreeMap::new();

        for (field, value) in current {
            if baseline.get(field) != Some(value) {
                changes.insert(field.clone(), FieldChange::Set(value.clone()));
            }
        }

        for field in baseline.keys() {
            if !current.contains_key(field) {
                changes.insert(field.clone(), FieldChange::Removed);
            }
        }

        if changes.is_empty() {
            None
        } else {
            Some(Self { changes })
        }
    }

    /// Returns the change recorded for a field.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&FieldChange> {
        self.changes.get(field)
    }

    /// Returns true if the field changed.
    #[must_use]
    pub fn contains(&self, field: &str) -> bool {
        self.changes.contains_key(field)
    }

    /// Returns the number of changed fields.
    #[must_use]
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    /// Always false; kept for API symmetry with collections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Iterates changes in field order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldChange)> {
        self.changes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renders the partial document written by an update.
    ///
    /// Removed fields become `null`.
    #[must_use]
    pub fn to_body(&self) -> Source {
        self.changes
            .iter()
            .map(|(field, change)| {
                let value = match change {
                    FieldChange::Set(value) => value.clone(),
                    FieldChange::Removed => Value::Null,
                };
                (field.clone(), value)
            })
            .collect()
    }
}
