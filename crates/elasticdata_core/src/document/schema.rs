//! Schema trait for typed documents.

use crate::document::Document;
use crate::entity::Source;
use crate::error::ValidationError;
use crate::unit_of_work::UnitOfWork;
use serde_json::Value;

/// A named field projection.
pub type Scope = (&'static str, &'static [&'static str]);

/// Static description of a document type.
///
/// A schema is a zero-sized marker type: the data lives in
/// [`Document<S>`](Document), the behavior lives here. Every method has a
/// default, so the smallest schema only names its type:
///
/// ```rust
/// use elasticdata_core::Schema;
///
/// struct Article;
///
/// impl Schema for Article {
///     const TYPE_NAME: &'static str = "article";
/// }
/// ```
///
/// # Field hooks
///
/// `to_storage_field` and `to_representation_field` transform one value on
/// its way out; `validate_field` checks one value. All three receive the
/// whole document and an optional caller context, which is whatever was
/// passed to the `*_with` variants on [`Document`].
#[allow(unused_variables)]
pub trait Schema: Sized + Send + Sync + 'static {
    /// Document type name in the store.
    const TYPE_NAME: &'static str;

    /// Whether `created_at` and `updated_at` are maintained on write.
    const TIMESTAMPS: bool = false;

    /// Named field projections.
    ///
    /// A document read with a scope only carries, stores and represents the
    /// scope's fields.
    fn scopes() -> &'static [Scope] {
        &[]
    }

    /// Transforms a field for storage.
    fn to_storage_field(
        doc: &Document<Self>,
        field: &str,
        value: Value,
        ctx: Option<&Value>,
    ) -> Value {
        value
    }

    /// Transforms a field for presentation.
    fn to_representation_field(
        doc: &Document<Self>,
        field: &str,
        value: Value,
        ctx: Option<&Value>,
    ) -> Value {
        value
    }

    /// Validates one field.
    fn validate_field(
        doc: &Document<Self>,
        field: &str,
        value: &Value,
        ctx: Option<&Value>,
    ) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Validates the whole document after the field validators ran.
    fn validate(
        doc: &Document<Self>,
        data: &Source,
        ctx: Option<&Value>,
    ) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Runs before the document is created.
    fn pre_create(doc: &mut Document<Self>, uow: &mut UnitOfWork) {}

    /// Runs before the document is updated.
    fn pre_update(doc: &mut Document<Self>, uow: &mut UnitOfWork) {}

    /// Runs before the document is deleted.
    fn pre_delete(doc: &mut Document<Self>, uow: &mut UnitOfWork) {}

    /// Runs after the document was created.
    fn post_create(doc: &mut Document<Self>, uow: &mut UnitOfWork) {}

    /// Runs after the document was updated.
    fn post_update(doc: &mut Document<Self>, uow: &mut UnitOfWork) {}

    /// Runs after the document was deleted.
    fn post_delete(doc: &mut Document<Self>, uow: &mut UnitOfWork) {}
}

/// Looks up a scope's field list.
pub(crate) fn scope_of<S: Schema>(name: &str) -> Option<&'static [&'static str]> {
    S::scopes()
        .iter()
        .find(|(scope, _)| *scope == name)
        .map(|(_, fields)| *fields)
}
