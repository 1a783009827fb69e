//! Transactional save protocol.
//!
//! Every write follows the same bracket: check the error log, begin, build
//! the record, put, commit. Any failure inside the bracket is appended to the
//! log and rolled back; nothing escapes as a panic or a propagated error.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::{
    Datastore, Entity, ErrorLog, Key, KeyManager, MapperError, PRIVATE_FIELD_MARKER, PersistError,
    Properties, Transaction,
};

/// Build the record for `properties` under `key`.
///
/// The record is annotated with `excluded`; documents whose metadata is not
/// indexed also keep every hydrated field out of the indexes.
pub fn build_entity(key: &Key, properties: &Properties, excluded: &BTreeSet<String>) -> Entity {
    let mut entity = Entity::new(key.clone()).with_excluded_indexes(excluded.iter().cloned());

    if !properties.is_indexed() {
        entity = entity.with_excluded_indexes(
            properties
                .fields()
                .map(|(name, _)| name)
                .filter(|name| !name.starts_with(PRIVATE_FIELD_MARKER))
                .map(str::to_string),
        );
    }

    for (name, value) in properties.record_fields() {
        entity.insert(name, value);
    }
    entity
}

/// Runs the save bracket against one store on behalf of one document.
pub struct Persister<'a, S: Datastore> {
    client: &'a S,
    errors: &'a mut ErrorLog,
}

impl<'a, S: Datastore> Persister<'a, S> {
    pub fn new(client: &'a S, errors: &'a mut ErrorLog) -> Self {
        Self { client, errors }
    }

    /// Write the document's current record in one transaction.
    ///
    /// Returns the committed entity. With a non-empty error log no
    /// transaction is opened at all.
    pub fn save(
        &mut self,
        operation: &'static str,
        keys: &KeyManager,
        properties: &Properties,
    ) -> Result<Entity, PersistError> {
        if !self.errors.is_empty() {
            warn!(
                operation,
                pending = self.errors.len(),
                "refusing to open transaction with pending errors"
            );
            return Err(PersistError::Blocked {
                operation,
                pending: self.errors.len(),
            });
        }

        let mut transaction = self.client.transaction();
        match Self::write(&mut transaction, keys, properties) {
            Ok(entity) => {
                info!(operation, key = %entity.key(), "committed");
                Ok(entity)
            }
            Err(error) => {
                warn!(operation, %error, "transaction failed, rolling back");
                self.errors.push(error);
                if let Err(rollback_error) = transaction.rollback() {
                    warn!(operation, error = %rollback_error, "rollback failed");
                    self.errors.push(rollback_error);
                }
                Err(PersistError::RolledBack)
            }
        }
    }

    fn write(
        transaction: &mut S::Transaction,
        keys: &KeyManager,
        properties: &Properties,
    ) -> Result<Entity, MapperError> {
        transaction.begin()?;
        let key = keys.key()?;
        let entity = build_entity(key, properties, keys.excluded_indexes());
        debug!(key = %key, fields = entity.properties().len(), "putting record");
        transaction.put(entity.clone())?;
        transaction.commit()?;
        Ok(entity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, RecordingStore, descriptor};
    use crate::{KeyId, Value};

    fn keys(properties: &Properties) -> KeyManager {
        KeyManager::new(descriptor(), None, properties.uid()).unwrap()
    }

    #[test]
    fn record_carries_metadata_fields_and_exclusions() {
        let mut properties = Properties::default();
        properties.add_field("name", Value::from("Ada"));
        properties.add_field("_draft", Value::from("hidden"));
        let keys = keys(&properties);

        let entity = build_entity(keys.key().unwrap(), &properties, keys.excluded_indexes());

        assert_eq!(entity.key().id, KeyId::Name(properties.uid().to_string()));
        assert_eq!(entity.get("name"), Some(&Value::from("Ada")));
        assert_eq!(entity.get("uid"), Some(&Value::from(properties.uid())));
        assert!(entity.get("_draft").is_none());
        assert!(entity.get("deletedAt").is_none());
        assert!(!entity.is_indexed("createdAt"));
        assert!(!entity.is_indexed("updatedAt"));
        assert!(!entity.is_indexed("bio"));
        assert!(entity.is_indexed("name"));
    }

    #[test]
    fn unindexed_metadata_excludes_hydrated_fields() {
        let mut properties = Properties::new(false);
        properties.add_field("name", Value::from("Ada"));
        let keys = keys(&properties);

        let entity = build_entity(keys.key().unwrap(), &properties, keys.excluded_indexes());
        assert!(!entity.is_indexed("name"));
        assert!(entity.is_indexed("uid"));
    }

    #[test]
    fn save_commits_in_order() {
        let store = RecordingStore::default();
        let mut errors = ErrorLog::new();
        let properties = Properties::default();
        let keys = keys(&properties);

        let entity = Persister::new(&store, &mut errors)
            .save("save", &keys, &properties)
            .unwrap();

        assert!(errors.is_empty());
        assert_eq!(entity.key(), keys.key().unwrap());
        assert_eq!(
            store.calls(),
            vec![Call::Begin, Call::Put(entity.key().clone()), Call::Commit]
        );
    }

    #[test]
    fn pending_errors_block_without_transaction_calls() {
        let store = RecordingStore::default();
        let mut errors = ErrorLog::new();
        errors.push(MapperError::Input("bad".into()));
        let properties = Properties::default();
        let keys = keys(&properties);

        let result = Persister::new(&store, &mut errors).save("save", &keys, &properties);

        assert_eq!(
            result,
            Err(PersistError::Blocked {
                operation: "save",
                pending: 1
            })
        );
        assert!(store.calls().is_empty());
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn commit_failure_is_logged_and_rolled_back() {
        let store = RecordingStore::default();
        store.fail_commit_with(MapperError::Conflict("stale".into()));
        let mut errors = ErrorLog::new();
        let properties = Properties::default();
        let keys = keys(&properties);

        let result = Persister::new(&store, &mut errors).save("save", &keys, &properties);

        assert_eq!(result, Err(PersistError::RolledBack));
        assert_eq!(errors.len(), 1);
        assert!(matches!(errors.entries()[0], MapperError::Conflict(_)));
        assert_eq!(store.calls().last(), Some(&Call::Rollback));
    }

    #[test]
    fn rollback_failure_is_logged_too() {
        let store = RecordingStore::default();
        store.fail_put_with(MapperError::Storage("disk full".into()));
        store.fail_rollback_with(MapperError::Storage("gone".into()));
        let mut errors = ErrorLog::new();
        let properties = Properties::default();
        let keys = keys(&properties);

        let result = Persister::new(&store, &mut errors).save("save", &keys, &properties);

        assert_eq!(result, Err(PersistError::RolledBack));
        assert_eq!(errors.messages(), vec!["Storage error: disk full", "Storage error: gone"]);
    }
}
