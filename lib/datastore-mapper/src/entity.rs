use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::{Key, Value};

/// A stored record: a key, named values, and the names kept out of indexes.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    key: Key,
    properties: BTreeMap<String, Value>,
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    exclude_from_indexes: BTreeSet<String>,
}

impl Entity {
    pub fn new(key: Key) -> Self {
        Self {
            key,
            properties: BTreeMap::new(),
            exclude_from_indexes: BTreeSet::new(),
        }
    }

    pub fn with_excluded_indexes<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude_from_indexes
            .extend(names.into_iter().map(Into::into));
        self
    }

    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.properties.insert(name.into(), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn properties(&self) -> &BTreeMap<String, Value> {
        &self.properties
    }

    pub fn exclude_from_indexes(&self) -> &BTreeSet<String> {
        &self.exclude_from_indexes
    }

    pub fn is_indexed(&self, name: &str) -> bool {
        !self.exclude_from_indexes.contains(name)
    }
}
