//! Store keys and the per-document key manager.

use std::collections::BTreeSet;

use once_cell::unsync::OnceCell;
use serde::Serialize;

use crate::{MapperError, ModelDescriptor};

/// The identifying part of a key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(untagged)]
pub enum KeyId {
    /// A string key name (document uids are stored this way).
    Name(String),
    /// A store-native integer id.
    Id(i64),
}

impl KeyId {
    pub fn is_empty(&self) -> bool {
        match self {
            KeyId::Name(name) => name.is_empty(),
            KeyId::Id(id) => *id == 0,
        }
    }
}

impl std::fmt::Display for KeyId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            KeyId::Name(name) => write!(f, "{:?}", name),
            KeyId::Id(id) => write!(f, "{}", id),
        }
    }
}

impl From<&str> for KeyId {
    fn from(name: &str) -> Self {
        KeyId::Name(name.to_string())
    }
}

impl From<String> for KeyId {
    fn from(name: String) -> Self {
        KeyId::Name(name)
    }
}

impl From<i64> for KeyId {
    fn from(id: i64) -> Self {
        KeyId::Id(id)
    }
}

/// A store key: optional namespace, kind, and id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Key {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub kind: String,
    pub id: KeyId,
}

impl Key {
    pub fn new(kind: impl Into<String>, id: impl Into<KeyId>) -> Self {
        Self {
            namespace: None,
            kind: kind.into(),
            id: id.into(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// A key is complete once it carries a non-empty name or a non-zero id.
    pub fn is_complete(&self) -> bool {
        !self.kind.is_empty() && !self.id.is_empty()
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(namespace) => write!(f, "{}:{}({})", namespace, self.kind, self.id),
            None => write!(f, "{}({})", self.kind, self.id),
        }
    }
}

/// Derive a key from (kind, key-id).
pub fn key_for(
    namespace: Option<&str>,
    kind: &str,
    key_id: &KeyId,
) -> Result<Key, MapperError> {
    if kind.is_empty() {
        return Err(MapperError::Config("Cannot define an empty kind.".to_string()));
    }
    if key_id.is_empty() {
        return Err(MapperError::Config("Invalid uid value.".to_string()));
    }

    let key = Key::new(kind, key_id.clone());
    Ok(match namespace {
        Some(namespace) => key.with_namespace(namespace),
        None => key,
    })
}

/// Owns a document's kind and key-id and caches the derived key.
///
/// The cache is dropped whenever the key-id changes, so the next call to
/// [`KeyManager::key`] always reflects the current id.
#[derive(Debug)]
pub struct KeyManager {
    descriptor: &'static ModelDescriptor,
    namespace: Option<String>,
    key_id: KeyId,
    cached: OnceCell<Key>,
}

impl KeyManager {
    pub fn new(
        descriptor: &'static ModelDescriptor,
        namespace: Option<String>,
        key_id: impl Into<KeyId>,
    ) -> Result<Self, MapperError> {
        if descriptor.kind().is_empty() {
            return Err(MapperError::Config(
                "Cannot define a none type kind.".to_string(),
            ));
        }
        if let Some(name) = descriptor.reserved_field() {
            return Err(MapperError::Config(format!(
                "Field name {:?} is reserved for document metadata.",
                name
            )));
        }

        let manager = Self {
            descriptor,
            namespace,
            key_id: key_id.into(),
            cached: OnceCell::new(),
        };
        // Fail at construction rather than at the first save.
        manager.key()?;
        Ok(manager)
    }

    pub fn kind(&self) -> &'static str {
        self.descriptor.kind()
    }

    pub fn key_id(&self) -> &KeyId {
        &self.key_id
    }

    pub fn set_key_id(&mut self, key_id: impl Into<KeyId>) {
        let key_id = key_id.into();
        if key_id != self.key_id {
            self.key_id = key_id;
            self.cached.take();
        }
    }

    /// The current key, derived on first access after construction or a key-id change.
    pub fn key(&self) -> Result<&Key, MapperError> {
        self.cached
            .get_or_try_init(|| key_for(self.namespace.as_deref(), self.kind(), &self.key_id))
    }

    /// Drop the cached key and derive it again from the current key-id.
    pub fn refresh(&mut self) -> Result<&Key, MapperError> {
        self.cached.take();
        self.key()
    }

    pub fn excluded_indexes(&self) -> &'static BTreeSet<String> {
        self.descriptor.excluded_indexes()
    }
}
