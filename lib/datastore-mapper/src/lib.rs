//! Datastore Mapper - typed, validated documents over transactional stores.
//!
//! This crate maps model types onto records in a schemaless document store.
//! Inputs are validated field by field, records are written inside a single
//! store transaction, and reads go through a filterable, cursor-paginated
//! query builder.
//!
//! # Core Concepts
//!
//! - **Kind**: the record namespace of a model type, its type name by default.
//! - **Key-id**: the identifying part of a record key; the document uid unless
//!   re-keyed to a store-native integer id.
//! - **Error log**: per-document, append-only list of failures. A non-empty
//!   log blocks further writes.
//! - **Soft delete**: stamping `deletedAt`; records are never removed.
//!
//! # Traits
//!
//! - [`Model`]: model types with a static field-descriptor list
//! - [`Datastore`]: store clients (keys, queries, transactions)
//! - [`Transaction`]: single-record write bracket
//! - [`DatastoreConnection`]: connecting from a [`ConnectionConfig`]

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::unwrap_in_result,
        clippy::panic
    )
)]

mod collection;
mod document;
mod entity;
mod error;
mod error_log;
mod finder;
mod key;
mod model;
mod persist;
mod properties;
mod property;
mod query;
mod store;
mod time;
mod value;

#[cfg(test)]
mod testing;

pub use collection::{
    Collection, CollectionOptions, DEFAULT_LIMIT, DEFAULT_ORDER, Envelope, FetchPath,
};
pub use document::Document;
pub use entity::Entity;
pub use error::{MapperError, PersistError};
pub use error_log::ErrorLog;
pub use finder::QueryBuilder;
pub use key::{Key, KeyId, KeyManager, key_for};
pub use model::{
    DEFAULT_EXCLUDED_INDEXES, FieldDescriptor, IntoInput, Model, ModelDescriptor,
    RESERVED_FIELD_NAMES,
};
pub use persist::{Persister, build_entity};
pub use properties::{PRIVATE_FIELD_MARKER, Properties};
pub use property::{
    DEFAULT_RANDOM_MAX, DEFAULT_RANDOM_MIN, PropertyKind, PropertyValue, random_string,
};
pub use query::{Cursor, FetchOptions, Filter, Order, Page, Query};
pub use store::{ConnectionConfig, Datastore, DatastoreConnection, Transaction};
pub use time::Timestamp;
pub use value::Value;

// Re-export derive macro
pub use datastore_mapper_derive::Model;
