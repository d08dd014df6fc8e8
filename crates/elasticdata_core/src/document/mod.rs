//! Typed documents.
//!
//! [`Document<S>`](Document) is a keyed JSON document whose behavior
//! (type name, scopes, field transforms, validation and lifecycle hooks)
//! comes from a [`Schema`].

mod schema;
mod typed;

pub use schema::{Schema, Scope};
pub use typed::{Document, GENERAL_ERROR_KEY};
