//! # elasticdata HTTP store
//!
//! A [`DocumentStore`](elasticdata_core::DocumentStore) that talks to a
//! search engine node over its REST protocol.
//!
//! This crate provides:
//! - Request building for get, multi-get, search and bulk
//! - NDJSON encoding of write statements and decoding of bulk items
//! - An HTTP client abstraction, with a blocking `reqwest` client behind
//!   the `reqwest` feature
//!
//! ## Usage
//!
//! ```rust,ignore
//! use elasticdata_core::{EntityManager, ManagerConfig};
//! use elasticdata_http::{HttpStore, HttpStoreConfig};
//!
//! let store = HttpStore::connect(HttpStoreConfig::new("http://localhost:9200"))?;
//! let mut em = EntityManager::new(store, ManagerConfig::new().index("blog"));
//! ```
//!
//! ## Status mapping
//!
//! - 2xx responses are decoded into the core response types
//! - A 404 on get with `found: false` is a miss, any other 404 on get is
//!   `StoreError::NotFound`
//! - Every other non-2xx status is `StoreError::Transport` with the status
//! - Item failures inside a bulk response are outcomes, not errors

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod bulk;
mod client;
mod config;
mod store;

pub use bulk::{decode as decode_bulk, encode as encode_bulk};
#[cfg(feature = "reqwest")]
pub use client::ReqwestClient;
pub use client::{HttpClient, HttpRequest, HttpResponse, Method, JSON, NDJSON};
pub use config::{HttpStoreConfig, DEFAULT_BASE_URL};
pub use store::HttpStore;
