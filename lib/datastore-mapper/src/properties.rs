use serde::Serialize;
use serde::ser::SerializeMap;
use uuid::Uuid;

use crate::{RESERVED_FIELD_NAMES, Timestamp, Value};

/// Names starting with this marker are never written to the store.
pub const PRIVATE_FIELD_MARKER: char = '_';

/// Identity, lifecycle timestamps, and hydrated fields of one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Properties {
    uid: String,
    created_at: Timestamp,
    updated_at: Timestamp,
    deleted_at: Option<Timestamp>,
    indexed: bool,
    fields: Vec<(String, Value)>,
}

impl Properties {
    pub fn new(indexed: bool) -> Self {
        let now = Timestamp::now();
        Self {
            uid: Uuid::new_v4().to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
            indexed,
            fields: Vec::new(),
        }
    }

    pub fn uid(&self) -> &str {
        &self.uid
    }

    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    pub fn deleted_at(&self) -> Option<Timestamp> {
        self.deleted_at
    }

    pub fn is_indexed(&self) -> bool {
        self.indexed
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields
            .iter()
            .find(|(field, _)| field == name)
            .map(|(_, value)| value)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    /// Attach a hydrated field, replacing any earlier value under `name`.
    pub(crate) fn add_field(&mut self, name: impl Into<String>, value: Value) {
        let name = name.into();
        match self.fields.iter_mut().find(|(field, _)| *field == name) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((name, value)),
        }
    }

    pub(crate) fn touch(&mut self) {
        self.updated_at = Timestamp::now();
    }

    pub(crate) fn mark_deleted(&mut self) {
        self.deleted_at = Some(Timestamp::now());
    }

    /// Every storable field in record order.
    ///
    /// `deletedAt` only appears once the document has been soft-deleted.
    /// Names with the private marker and attached fields shadowing metadata
    /// are skipped.
    pub fn record_fields(&self) -> Vec<(&str, Value)> {
        let mut record = vec![
            ("uid", Value::from(self.uid.as_str())),
            ("createdAt", Value::Timestamp(self.created_at)),
            ("updatedAt", Value::Timestamp(self.updated_at)),
        ];
        if let Some(deleted_at) = self.deleted_at {
            record.push(("deletedAt", Value::Timestamp(deleted_at)));
        }
        record.extend(
            self.fields
                .iter()
                .filter(|(name, _)| {
                    !name.starts_with(PRIVATE_FIELD_MARKER)
                        && !RESERVED_FIELD_NAMES.contains(&name.as_str())
                })
                .map(|(name, value)| (name.as_str(), value.clone())),
        );
        record
    }
}

impl Default for Properties {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Serialize for Properties {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let record = self.record_fields();
        let mut map = serializer.serialize_map(Some(record.len()))?;
        for (name, value) in &record {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
