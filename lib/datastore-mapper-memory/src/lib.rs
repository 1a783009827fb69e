//! In-memory store for datastore-mapper.
//!
//! This crate provides an in-process implementation of the datastore-mapper
//! store traits: namespaced keys, filtered and ordered queries with opaque
//! cursors, and single-bracket transactions with optimistic conflict
//! detection.
//!
//! # Example
//!
//! ```text
//! use datastore_mapper::{Document, Model};
//! use datastore_mapper_memory::{DatastoreConnection, MemoryDatastore};
//!
//! #[derive(Model)]
//! pub struct Account {
//!     #[property(email)]
//!     pub email: String,
//! }
//!
//! let store = MemoryDatastore::connect("memory://tenant")?;
//! let mut doc = Document::from_model(store, Account { email: "a@b.com".into() })?;
//! doc.save()?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod cursor;
mod store;

pub use store::{MemoryDatastore, MemoryTransaction};

// Re-export core types for convenience
pub use datastore_mapper::{
    Collection, CollectionOptions, ConnectionConfig, Cursor, Datastore, DatastoreConnection,
    Document, Entity, ErrorLog, FetchOptions, Filter, Key, KeyId, MapperError, Model, Order,
    Page, PersistError, Properties, PropertyKind, Query, Transaction, Value,
};
