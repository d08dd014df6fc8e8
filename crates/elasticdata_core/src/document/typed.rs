//! Typed document implementation.

use crate::document::schema::{scope_of, Schema};
use crate::entity::{Entity, Hydrate, Lifecycle, Source};
use crate::error::ValidationError;
use crate::unit_of_work::UnitOfWork;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;

/// Error key for document-level validation failures.
pub const GENERAL_ERROR_KEY: &str = "_general";

/// A keyed document of schema `S`.
///
/// `Document<S>` is the standard [`Entity`]: a JSON object plus the
/// read-time scope and highlight. Keys starting with `_` are private. They
/// are kept on the document but never stored or represented, unless a scope
/// lists them.
///
/// # Example
///
/// ```rust
/// use elasticdata_core::{Document, Entity, Schema};
/// use serde_json::json;
///
/// struct Article;
///
/// impl Schema for Article {
///     const TYPE_NAME: &'static str = "article";
/// }
///
/// let mut doc = Document::<Article>::default();
/// doc.set("title", "Hello");
/// doc.set("_draft", true);
///
/// assert_eq!(doc.to_storage().get("title"), Some(&json!("Hello")));
/// assert!(doc.to_storage().get("_draft").is_none());
/// ```
pub struct Document<S: Schema> {
    data: Source,
    scope: Option<String>,
    highlight: Option<Value>,
    errors: BTreeMap<String, ValidationError>,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> Document<S> {
    /// Creates a document from its fields.
    pub fn new(data: Source) -> Self {
        Self {
            data,
            scope: None,
            highlight: None,
            errors: BTreeMap::new(),
            _schema: PhantomData,
        }
    }

    /// Creates a document from a JSON object.
    pub fn from_value(value: Value) -> Result<Self, ValidationError> {
        match value {
            Value::Object(data) => Ok(Self::new(data)),
            other => Err(ValidationError::new(format!(
                "{} expects a JSON object, got {other}",
                S::TYPE_NAME
            ))),
        }
    }

    /// Sets the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    /// Sets the highlight fragments.
    #[must_use]
    pub fn with_highlight(mut self, highlight: Value) -> Self {
        self.highlight = Some(highlight);
        self
    }

    /// Returns the document type name.
    pub fn type_name() -> &'static str {
        S::TYPE_NAME
    }

    /// Returns the fields a scope fetches, without `id`.
    ///
    /// `None` for an unknown scope, which fetches the whole document.
    pub fn scope_fields(scope: &str) -> Option<Vec<String>> {
        scope_of::<S>(scope).map(|fields| {
            fields
                .iter()
                .filter(|f| **f != crate::entity::ID_FIELD)
                .map(|f| (*f).to_owned())
                .collect()
        })
    }

    /// Returns a field.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.data.get(field)
    }

    /// Sets a field.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.data.insert(field.into(), value.into());
    }

    /// Removes a field.
    pub fn unset(&mut self, field: &str) -> Option<Value> {
        self.data.remove(field)
    }

    /// Returns true if the field is set.
    pub fn contains(&self, field: &str) -> bool {
        self.data.contains_key(field)
    }

    /// Returns the number of fields, private ones included.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the document has no fields.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Iterates field names.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Returns the raw fields.
    pub fn data(&self) -> &Source {
        &self.data
    }

    /// Returns the scope the document was read with.
    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    /// Returns the fields of the current scope, if it is a known one.
    pub fn fields(&self) -> Option<&'static [&'static str]> {
        self.scope.as_deref().and_then(scope_of::<S>)
    }

    /// Returns the highlight fragments of a search hit.
    pub fn highlight(&self) -> Option<&Value> {
        self.highlight.as_ref()
    }

    /// Produces the storage snapshot, passing `ctx` to the field hooks.
    pub fn to_storage_with(&self, ctx: Option<&Value>) -> Source {
        self.project(|field, value| S::to_storage_field(self, field, value, ctx))
    }

    /// Produces the presentation form.
    pub fn to_representation(&self) -> Source {
        self.to_representation_with(None)
    }

    /// Produces the presentation form, passing `ctx` to the field hooks.
    pub fn to_representation_with(&self, ctx: Option<&Value>) -> Source {
        self.project(|field, value| S::to_representation_field(self, field, value, ctx))
    }

    /// Runs the validators.
    pub fn is_valid(&mut self) -> bool {
        self.is_valid_with(None)
    }

    /// Runs the validators with a context.
    ///
    /// Field validators run first, then the document validator. Previous
    /// errors are discarded.
    pub fn is_valid_with(&mut self, ctx: Option<&Value>) -> bool {
        let mut errors = BTreeMap::new();

        for field in self.selected_keys() {
            let value = self.data.get(&field).cloned().unwrap_or(Value::Null);
            if let Err(e) = S::validate_field(self, &field, &value, ctx) {
                errors.insert(field, e);
            }
        }
        if let Err(e) = S::validate(self, &self.data, ctx) {
            errors.insert(GENERAL_ERROR_KEY.to_owned(), e);
        }

        self.errors = errors;
        self.errors.is_empty()
    }

    /// Returns the errors of the last validation run.
    pub fn errors(&self) -> &BTreeMap<String, ValidationError> {
        &self.errors
    }

    fn selected_keys(&self) -> Vec<String> {
        match self.fields() {
            Some(fields) => fields.iter().map(|f| (*f).to_owned()).collect(),
            None => self
                .data
                .keys()
                .filter(|k| !k.starts_with('_'))
                .cloned()
                .collect(),
        }
    }

    fn project(&self, mut transform: impl FnMut(&str, Value) -> Value) -> Source {
        self.selected_keys()
            .into_iter()
            .map(|field| {
                let value = self.data.get(&field).cloned().unwrap_or(Value::Null);
                let value = transform(&field, value);
                (field, value)
            })
            .collect()
    }
}

impl<S: Schema> Default for Document<S> {
    fn default() -> Self {
        Self::new(Source::new())
    }
}

impl<S: Schema> Clone for Document<S> {
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            scope: self.scope.clone(),
            highlight: self.highlight.clone(),
            errors: self.errors.clone(),
            _schema: PhantomData,
        }
    }
}

impl<S: Schema> fmt::Debug for Document<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("type", &S::TYPE_NAME)
            .field("data", &self.data)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl<S: Schema> Lifecycle for Document<S> {
    fn pre_create(&mut self, uow: &mut UnitOfWork) {
        S::pre_create(self, uow);
    }

    fn pre_update(&mut self, uow: &mut UnitOfWork) {
        S::pre_update(self, uow);
    }

    fn pre_delete(&mut self, uow: &mut UnitOfWork) {
        S::pre_delete(self, uow);
    }

    fn post_create(&mut self, uow: &mut UnitOfWork) {
        S::post_create(self, uow);
    }

    fn post_update(&mut self, uow: &mut UnitOfWork) {
        S::post_update(self, uow);
    }

    fn post_delete(&mut self, uow: &mut UnitOfWork) {
        S::post_delete(self, uow);
    }
}

impl<S: Schema> Entity for Document<S> {
    fn entity_type(&self) -> &str {
        S::TYPE_NAME
    }

    fn to_storage(&self) -> Source {
        self.to_storage_with(None)
    }

    fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    fn set_field(&mut self, name: &str, value: Value) {
        self.data.insert(name.to_owned(), value);
    }

    fn remove_field(&mut self, name: &str) -> Option<Value> {
        self.data.remove(name)
    }

    fn timestamps(&self) -> bool {
        S::TIMESTAMPS
    }
}

impl<S: Schema> Hydrate for Document<S> {
    fn doc_type() -> &'static str {
        S::TYPE_NAME
    }

    fn scope_fields(scope: &str) -> Option<Vec<String>> {
        Document::<S>::scope_fields(scope)
    }

    fn hydrate(source: Source, scope: Option<&str>, highlight: Option<Value>) -> Self {
        Self {
            data: source,
            scope: scope.map(str::to_owned),
            highlight,
            errors: BTreeMap::new(),
            _schema: PhantomData,
        }
    }
}
