//! # elasticdata testkit
//!
//! Test utilities for elasticdata.
//!
//! This crate provides:
//! - Fixture schemas and managers over an in-memory store
//! - Property-based test generators using proptest
//! - Log output for test runs
//!
//! ## Usage
//!
//! ```rust,ignore
//! use elasticdata_testkit::prelude::*;
//!
//! #[test]
//! fn flush_assigns_ids() {
//!     let mut em = fresh_manager();
//!     let e = note(json!({"foo": "bar"}));
//!     em.persist(&e);
//!     em.flush().unwrap();
//!     assert!(e.read().contains("id"));
//! }
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod fixtures;
pub mod generators;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::fixtures::*;
    pub use crate::generators::*;
}

pub use fixtures::*;
pub use generators::*;
