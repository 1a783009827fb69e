//! Store client traits.
//!
//! - `Datastore`: keys, queries, and transaction factory for one store
//! - `Transaction`: begin/put/commit/rollback around a single record write
//! - `DatastoreConnection`: connecting from a `ConnectionConfig`

use crate::{Entity, Key, KeyId, MapperError, Page, Query, key_for};

/// Connection configuration for store backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// Connect using a store URL string.
    Url(String),
    /// Connect to a project, scoping every key to a namespace.
    Namespace { project: String, namespace: String },
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_string())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.clone())
    }
}

/// Trait for store connection.
pub trait DatastoreConnection: Sized {
    /// Connect to the store using the provided configuration.
    fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, MapperError>;
}

/// A transactional document store.
///
/// Implemented by store clients. Records are never physically removed
/// through this interface.
pub trait Datastore {
    /// The transaction type for this store.
    type Transaction: Transaction;

    /// Namespace applied to every key this client builds.
    fn namespace(&self) -> Option<&str> {
        None
    }

    /// Build a key for `kind` in this client's namespace.
    fn key(&self, kind: &str, id: KeyId) -> Result<Key, MapperError> {
        key_for(self.namespace(), kind, &id)
    }

    /// Create an unopened transaction. Call [`Transaction::begin`] before use.
    fn transaction(&self) -> Self::Transaction;

    /// Execute a query and return one page of results.
    fn run_query(&self, query: &Query) -> Result<Page, MapperError>;
}

/// A single-record write bracket.
pub trait Transaction {
    fn begin(&mut self) -> Result<(), MapperError>;

    /// Stage an entity; nothing is visible until commit.
    fn put(&mut self, entity: Entity) -> Result<(), MapperError>;

    /// Apply staged writes. Fails with `MapperError::Conflict` when a staged
    /// key was modified by another writer after it was staged.
    fn commit(&mut self) -> Result<(), MapperError>;

    /// Discard staged writes.
    fn rollback(&mut self) -> Result<(), MapperError>;
}

impl<S: Datastore> Datastore for &S {
    type Transaction = S::Transaction;

    fn namespace(&self) -> Option<&str> {
        (**self).namespace()
    }

    fn key(&self, kind: &str, id: KeyId) -> Result<Key, MapperError> {
        (**self).key(kind, id)
    }

    fn transaction(&self) -> Self::Transaction {
        (**self).transaction()
    }

    fn run_query(&self, query: &Query) -> Result<Page, MapperError> {
        (**self).run_query(query)
    }
}
