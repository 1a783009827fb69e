//! In-process implementation of the store traits.
//!
//! Records live in a `BTreeMap` keyed by [`Key`] behind a `parking_lot`
//! lock. Every committed write bumps a per-record version; a transaction
//! remembers the version it saw when an entity was staged and refuses to
//! commit if another writer got there first.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use datastore_mapper::{
    ConnectionConfig, Datastore, DatastoreConnection, Entity, Key, MapperError, Order, Page,
    Query, Transaction,
};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::cursor;

const URL_SCHEME: &str = "memory://";

#[derive(Debug, Clone)]
struct StoredRecord {
    entity: Entity,
    version: u64,
}

#[derive(Debug, Default)]
struct Inner {
    records: RwLock<BTreeMap<Key, StoredRecord>>,
    versions: AtomicU64,
}

/// A shared in-memory document store.
///
/// Clones share the same records.
#[derive(Debug, Clone, Default)]
pub struct MemoryDatastore {
    inner: Arc<Inner>,
    namespace: Option<String>,
}

impl MemoryDatastore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A client over the same records that builds keys in `namespace`.
    pub fn with_namespace(&self, namespace: impl Into<String>) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
            namespace: Some(namespace.into()),
        }
    }

    /// Number of records across all namespaces.
    pub fn len(&self) -> usize {
        self.inner.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.records.read().is_empty()
    }

    pub fn get(&self, key: &Key) -> Option<Entity> {
        self.inner
            .records
            .read()
            .get(key)
            .map(|record| record.entity.clone())
    }

    /// Committed version of a record, if present.
    pub fn version(&self, key: &Key) -> Option<u64> {
        self.inner.records.read().get(key).map(|record| record.version)
    }
}

impl DatastoreConnection for MemoryDatastore {
    fn connect(config: impl Into<ConnectionConfig>) -> Result<Self, MapperError> {
        match config.into() {
            ConnectionConfig::Url(url) => {
                let Some(rest) = url.strip_prefix(URL_SCHEME) else {
                    return Err(MapperError::Config(format!(
                        "unsupported store url: {}",
                        url
                    )));
                };
                let namespace = rest.trim_end_matches('/');
                info!(namespace, "connected to memory store");
                if namespace.is_empty() {
                    Ok(Self::new())
                } else {
                    Ok(Self::new().with_namespace(namespace))
                }
            }
            ConnectionConfig::Namespace { project, namespace } => {
                info!(%project, %namespace, "connected to memory store");
                Ok(Self::new().with_namespace(namespace))
            }
        }
    }
}

/// Compare two entities under the query's order-by clauses, then by key.
fn compare_entities(a: &Entity, b: &Entity, order_by: &[(String, Order)]) -> Ordering {
    for (field, order) in order_by {
        let ordering = match (a.get(field), b.get(field)) {
            (Some(x), Some(y)) => x.compare(y).unwrap_or(Ordering::Equal),
            (None, Some(_)) => Ordering::Less,
            (Some(_), None) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        let ordering = match order {
            Order::Asc => ordering,
            Order::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.key().cmp(b.key())
}

impl Datastore for MemoryDatastore {
    type Transaction = MemoryTransaction;

    fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    fn transaction(&self) -> Self::Transaction {
        MemoryTransaction {
            inner: Arc::clone(&self.inner),
            state: TransactionState::Idle,
            staged: Vec::new(),
        }
    }

    fn run_query(&self, query: &Query) -> Result<Page, MapperError> {
        let offset = match &query.start_cursor {
            Some(start) => cursor::decode(start)?,
            None => 0,
        };

        let mut matched: Vec<Entity> = {
            let records = self.inner.records.read();
            records
                .iter()
                .filter(|(key, _)| key.kind == query.kind && key.namespace == query.namespace)
                .filter(|(key, _)| query.key_filter.as_ref().is_none_or(|wanted| wanted == *key))
                .filter(|(_, record)| {
                    query
                        .filters
                        .iter()
                        .all(|filter| filter.matches(record.entity.get(filter.field())))
                })
                .map(|(_, record)| record.entity.clone())
                .collect()
        };
        matched.sort_by(|a, b| compare_entities(a, b, &query.order_by));

        let total = matched.len();
        // A zero limit would hand back its own start cursor; treat it as unbounded.
        let end = match query.limit.filter(|limit| *limit > 0) {
            Some(limit) => offset.saturating_add(limit as usize).min(total),
            None => total,
        };
        let items: Vec<Entity> = matched
            .into_iter()
            .skip(offset)
            .take(end.saturating_sub(offset))
            .collect();

        let more_results = end < total;
        let next_cursor = more_results.then(|| cursor::encode(end));
        debug!(
            kind = %query.kind,
            total,
            returned = items.len(),
            more_results,
            "ran query"
        );
        Ok(Page::new(items, more_results, next_cursor))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TransactionState {
    Idle,
    Active,
    Committed,
    RolledBack,
}

/// A memory store transaction.
///
/// Writes are staged until commit and applied under a single write lock.
pub struct MemoryTransaction {
    inner: Arc<Inner>,
    state: TransactionState,
    staged: Vec<(Entity, Option<u64>)>,
}

impl MemoryTransaction {
    fn require_active(&self, operation: &str) -> Result<(), MapperError> {
        if self.state != TransactionState::Active {
            return Err(MapperError::Storage(format!(
                "Cannot {} outside an active transaction ({:?})",
                operation, self.state
            )));
        }
        Ok(())
    }
}

impl Transaction for MemoryTransaction {
    fn begin(&mut self) -> Result<(), MapperError> {
        if self.state == TransactionState::Active {
            return Err(MapperError::Storage(
                "Transaction already begun".to_string(),
            ));
        }
        self.state = TransactionState::Active;
        self.staged.clear();
        Ok(())
    }

    fn put(&mut self, entity: Entity) -> Result<(), MapperError> {
        self.require_active("put")?;
        if !entity.key().is_complete() {
            return Err(MapperError::Storage(format!(
                "Cannot put entity with incomplete key {}",
                entity.key()
            )));
        }
        let observed = self
            .inner
            .records
            .read()
            .get(entity.key())
            .map(|record| record.version);
        self.staged.push((entity, observed));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), MapperError> {
        self.require_active("commit")?;
        let mut records = self.inner.records.write();

        for (entity, observed) in &self.staged {
            let current = records.get(entity.key()).map(|record| record.version);
            if current != *observed {
                return Err(MapperError::Conflict(format!(
                    "{} was modified concurrently",
                    entity.key()
                )));
            }
        }

        for (entity, _) in self.staged.drain(..) {
            let version = self.inner.versions.fetch_add(1, AtomicOrdering::SeqCst) + 1;
            records.insert(entity.key().clone(), StoredRecord { entity, version });
        }
        self.state = TransactionState::Committed;
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), MapperError> {
        if self.state == TransactionState::Committed {
            return Err(MapperError::Storage(
                "Cannot rollback committed transaction".to_string(),
            ));
        }
        self.staged.clear();
        self.state = TransactionState::RolledBack;
        Ok(())
    }
}
