//! Model instances bound to a store client.

use std::collections::BTreeSet;
use std::marker::PhantomData;

use tracing::debug;

use crate::{
    Datastore, Entity, Envelope, ErrorLog, FetchOptions, Key, KeyId, KeyManager, MapperError,
    Model, PRIVATE_FIELD_MARKER, Page, PersistError, Persister, Properties, PropertyValue, Query,
    QueryBuilder, Value,
};

/// One instance of model `M`, backed by store client `S`.
///
/// A document owns its metadata, key manager and error log. Persistence
/// and queries are delegated to [`Persister`] and [`QueryBuilder`], which
/// append operational failures to the error log instead of returning them.
pub struct Document<M: Model, S: Datastore> {
    client: S,
    properties: Properties,
    keys: KeyManager,
    errors: ErrorLog,
    data: Option<Entity>,
    _model: PhantomData<M>,
}

impl<M: Model, S: Datastore> Document<M, S> {
    /// An empty document with fresh metadata.
    pub fn new(client: S) -> Result<Self, MapperError> {
        Self::with_properties(client, Properties::default())
    }

    /// An empty document around existing metadata.
    pub fn with_properties(client: S, properties: Properties) -> Result<Self, MapperError> {
        let keys = KeyManager::new(
            M::descriptor(),
            client.namespace().map(str::to_string),
            properties.uid(),
        )?;
        Ok(Self {
            client,
            properties,
            keys,
            errors: ErrorLog::new(),
            data: None,
            _model: PhantomData,
        })
    }

    /// A document hydrated from named inputs.
    ///
    /// Validation failures are logged, not returned; only a bad kind or
    /// key-id fails construction.
    pub fn hydrate<I, K>(client: S, inputs: I) -> Result<Self, MapperError>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let mut document = Self::new(client)?;
        document.apply(inputs);
        Ok(document)
    }

    /// A document hydrated from a typed model value.
    pub fn from_model(client: S, model: M) -> Result<Self, MapperError> {
        Self::hydrate(client, model.into_inputs())
    }

    /// Validate inputs against the declared fields and attach the ones that pass.
    ///
    /// Undeclared and private names are ignored and a repeated name keeps its
    /// last value. Each declared field gets a fresh [`PropertyValue`]; a
    /// rejected input is logged and the field is left unattached.
    pub fn apply<I, K>(&mut self, inputs: I)
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        let descriptor = M::descriptor();
        let mut pending: Vec<(K, Value)> = Vec::new();
        for (name, value) in inputs {
            let declared = descriptor.field(name.as_ref()).is_some();
            if declared && !name.as_ref().starts_with(PRIVATE_FIELD_MARKER) {
                match pending
                    .iter_mut()
                    .find(|(seen, _)| seen.as_ref() == name.as_ref())
                {
                    Some((_, earlier)) => {
                        debug!(
                            kind = descriptor.kind(),
                            field = name.as_ref(),
                            "repeated input, last value wins"
                        );
                        *earlier = value;
                    }
                    None => pending.push((name, value)),
                }
            } else {
                debug!(kind = descriptor.kind(), field = name.as_ref(), "ignoring undeclared input");
            }
        }

        for field in descriptor.fields() {
            let Some(position) = pending
                .iter()
                .position(|(name, _)| name.as_ref() == field.name())
            else {
                continue;
            };
            let (_, value) = pending.swap_remove(position);

            let mut property = PropertyValue::new(field.kind().clone());
            match property.set_value(value) {
                Ok(()) => {
                    if let Some(value) = property.into_value() {
                        self.properties.add_field(field.name(), value);
                    }
                }
                Err(error) => {
                    debug!(kind = descriptor.kind(), field = field.name(), %error, "rejected input");
                    self.errors.push(error);
                }
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        self.keys.kind()
    }

    pub fn client(&self) -> &S {
        &self.client
    }

    pub fn properties(&self) -> &Properties {
        &self.properties
    }

    pub fn errors(&self) -> &ErrorLog {
        &self.errors
    }

    /// Append failures recorded elsewhere on behalf of this document.
    pub fn record_errors(&mut self, errors: impl IntoIterator<Item = MapperError>) {
        self.errors.extend(errors);
    }

    pub fn key(&self) -> Result<&Key, MapperError> {
        self.keys.key()
    }

    pub fn key_id(&self) -> &KeyId {
        self.keys.key_id()
    }

    pub fn excluded_indexes(&self) -> &'static BTreeSet<String> {
        self.keys.excluded_indexes()
    }

    /// The record written by the last successful save.
    pub fn data(&self) -> Option<&Entity> {
        self.data.as_ref()
    }

    /// `{message, data, status}` values describing this document.
    pub fn info(&self) -> Result<Envelope<serde_json::Value>, MapperError> {
        Ok(Envelope::success(serde_json::to_value(&self.properties)?))
    }

    /// Write the current record in one transaction.
    pub fn save(&mut self) -> Result<Entity, PersistError> {
        self.persist("save")
    }

    /// Re-key from the uid, refresh `updatedAt`, then save.
    pub fn update(&mut self) -> Result<Entity, PersistError> {
        self.persist_updated("update")
    }

    /// Stamp `deletedAt`, then update. The record stays in the store.
    ///
    /// A blocked delete leaves the document untouched.
    pub fn delete(&mut self) -> Result<Entity, PersistError> {
        if self.errors.is_empty() {
            self.properties.mark_deleted();
        }
        self.persist_updated("delete")
    }

    fn persist_updated(&mut self, operation: &'static str) -> Result<Entity, PersistError> {
        if self.errors.is_empty() {
            self.keys.set_key_id(self.properties.uid().to_string());
            if let Err(error) = self.keys.refresh() {
                self.errors.push(error);
            }
        }
        if self.errors.is_empty() {
            self.properties.touch();
        }
        self.persist(operation)
    }

    fn persist(&mut self, operation: &'static str) -> Result<Entity, PersistError> {
        let entity = Persister::new(&self.client, &mut self.errors).save(
            operation,
            &self.keys,
            &self.properties,
        )?;
        self.data = Some(entity.clone());
        Ok(entity)
    }

    fn finder(&mut self) -> QueryBuilder<'_, S> {
        QueryBuilder::new(&self.client, self.keys.kind(), &mut self.errors)
    }

    /// An empty query over this document's kind.
    pub fn query(&mut self) -> Query {
        self.finder().query()
    }

    pub fn all_items(&mut self, options: &FetchOptions) -> Page {
        self.finder().all_items(options)
    }

    /// See [`QueryBuilder::filters`]: only the first well-formed entry applies.
    pub fn filters(&mut self, params: &Value) -> Page {
        self.finder().filters(params)
    }

    /// Fetch by store-native integer id.
    ///
    /// Integers, integral floats and numeric strings are accepted; the
    /// document is re-keyed to that id before the fetch.
    pub fn find_by_id(&mut self, id: impl Into<Value>) -> Vec<Entity> {
        let id = match coerce_id(&id.into()) {
            Ok(id) => id,
            Err(error) => {
                self.errors.push(error);
                return Vec::new();
            }
        };

        self.keys.set_key_id(id);
        let key = match self.keys.key() {
            Ok(key) => key.clone(),
            Err(error) => {
                self.errors.push(error);
                return Vec::new();
            }
        };
        self.finder().find_by_key(key)
    }

    /// Fetch by the logical `uid` field.
    pub fn find_by_iud(&mut self, uid: &str) -> Vec<Entity> {
        self.finder().find_by_uid(uid)
    }
}

fn coerce_id(value: &Value) -> Result<i64, MapperError> {
    match value {
        Value::Int(id) => Ok(*id),
        // i64::MAX as f64 rounds up to 2^63, which is already out of range.
        Value::Float(f)
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f < i64::MAX as f64 =>
        {
            Ok(*f as i64)
        }
        Value::Float(f) => Err(MapperError::Input(format!("invalid id {}", f))),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map_err(|e| MapperError::Input(format!("invalid id {:?}: {}", s, e))),
        other => Err(MapperError::Input(format!(
            "invalid id of type {}",
            other.type_name()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::OnceLock;

    use crate::testing::{Author, Call, RecordingStore};
    use crate::{FieldDescriptor, Filter, ModelDescriptor, PropertyKind, Value};

    type AuthorDocument = Document<Author, RecordingStore>;

    struct Shadow;

    impl Model for Shadow {
        fn descriptor() -> &'static ModelDescriptor {
            static DESCRIPTOR: OnceLock<ModelDescriptor> = OnceLock::new();
            DESCRIPTOR.get_or_init(|| {
                ModelDescriptor::new(
                    "Shadow",
                    vec![FieldDescriptor::new("uid", PropertyKind::String)],
                )
            })
        }

        fn into_inputs(self) -> Vec<(&'static str, Value)> {
            Vec::new()
        }
    }

    #[test]
    fn models_declaring_metadata_fields_are_rejected() {
        let result = Document::<Shadow, RecordingStore>::hydrate(
            RecordingStore::default(),
            [("uid", Value::from("forged"))],
        );
        assert!(matches!(result, Err(MapperError::Config(_))));
    }

    #[test]
    fn repeated_input_keeps_last_value() {
        let doc = AuthorDocument::hydrate(
            RecordingStore::default(),
            [("name", Value::from("Ada")), ("name", Value::from("Grace"))],
        )
        .unwrap();
        assert_eq!(doc.properties().get("name"), Some(&Value::from("Grace")));
        assert!(doc.errors().is_empty());
    }

    #[test]
    fn blocked_update_and_delete_leave_document_unchanged() {
        let store = RecordingStore::default();
        let mut doc =
            AuthorDocument::hydrate(store.clone(), [("website", Value::from("nowhere"))]).unwrap();
        doc.find_by_id(42);
        let updated_at = doc.properties().updated_at();

        assert!(matches!(doc.update(), Err(PersistError::Blocked { .. })));
        assert!(matches!(doc.delete(), Err(PersistError::Blocked { .. })));

        assert_eq!(doc.properties().updated_at(), updated_at);
        assert!(doc.properties().deleted_at().is_none());
        assert_eq!(doc.key_id(), &KeyId::Id(42));
        assert!(!store.calls().contains(&Call::Begin));
    }

    #[test]
    fn find_by_id_rejects_floats_outside_i64() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::new(store.clone()).unwrap();

        assert!(doc.find_by_id(1e300).is_empty());
        assert!(doc.find_by_id(-1e19).is_empty());
        assert!(doc.find_by_id(f64::NAN).is_empty());
        assert!(store.queries().is_empty());
        assert_eq!(doc.errors().len(), 3);

        doc.find_by_id(42.0);
        assert_eq!(store.queries()[0].key_filter, Some(Key::new("Author", 42)));
    }

    #[test]
    fn valid_email_is_attached() {
        let doc = AuthorDocument::hydrate(RecordingStore::default(), [("email", Value::from("a@b.com"))])
            .unwrap();
        assert_eq!(doc.properties().get("email"), Some(&Value::from("a@b.com")));
        assert!(doc.errors().is_empty());
    }

    #[test]
    fn invalid_email_is_logged_and_not_attached() {
        let doc =
            AuthorDocument::hydrate(RecordingStore::default(), [("email", Value::from("not-an-email"))])
                .unwrap();
        assert!(doc.properties().get("email").is_none());
        assert_eq!(doc.errors().len(), 1);
    }

    #[test]
    fn undeclared_and_private_inputs_are_ignored() {
        let doc = AuthorDocument::hydrate(
            RecordingStore::default(),
            [
                ("nickname", Value::from("x")),
                ("_name", Value::from("y")),
                ("name", Value::from("Ada")),
            ],
        )
        .unwrap();
        assert_eq!(doc.properties().fields().count(), 1);
        assert!(doc.errors().is_empty());
    }

    #[test]
    fn random_string_field_is_generated() {
        let doc = AuthorDocument::hydrate(RecordingStore::default(), [("token", Value::Null)]).unwrap();
        let token = doc.properties().get("token").and_then(Value::as_str).unwrap();
        assert!((8..=12).contains(&token.chars().count()));
    }

    #[test]
    fn from_model_uses_typed_inputs() {
        let author = Author {
            name: Some("Ada".into()),
            email: None,
        };
        let doc = AuthorDocument::from_model(RecordingStore::default(), author).unwrap();
        assert_eq!(doc.properties().get("name"), Some(&Value::from("Ada")));
        assert!(doc.properties().get("email").is_none());
    }

    #[test]
    fn save_retains_committed_record() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::hydrate(store.clone(), [("name", Value::from("Ada"))]).unwrap();

        let entity = doc.save().unwrap();

        assert_eq!(doc.data(), Some(&entity));
        assert_eq!(store.puts(), vec![entity]);
    }

    #[test]
    fn save_with_validation_errors_makes_no_calls() {
        let store = RecordingStore::default();
        let mut doc =
            AuthorDocument::hydrate(store.clone(), [("website", Value::from("nowhere"))]).unwrap();

        let result = doc.save();

        assert!(matches!(result, Err(PersistError::Blocked { .. })));
        assert!(store.calls().is_empty());
        assert!(doc.data().is_none());
    }

    #[test]
    fn update_rekeys_from_uid_after_find_by_id() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::new(store.clone()).unwrap();
        doc.find_by_id(42);
        assert_eq!(doc.key_id(), &KeyId::Id(42));

        let before = doc.properties().updated_at();
        let entity = doc.update().unwrap();

        assert_eq!(entity.key().id, KeyId::Name(doc.properties().uid().to_string()));
        assert!(doc.properties().updated_at() >= before);
    }

    #[test]
    fn delete_is_soft() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::new(store.clone()).unwrap();

        let entity = doc.delete().unwrap();

        assert!(doc.properties().deleted_at().is_some());
        assert!(entity.get("deletedAt").is_some());
        assert_eq!(
            store.calls(),
            vec![Call::Begin, Call::Put(entity.key().clone()), Call::Commit]
        );
    }

    #[test]
    fn find_by_id_issues_one_key_filtered_fetch() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::new(store.clone()).unwrap();

        doc.find_by_id(42);

        let queries = store.queries();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].key_filter, Some(Key::new("Author", 42)));
        assert!(queries[0].filters.is_empty());
    }

    #[test]
    fn find_by_id_coerces_numeric_strings() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::new(store.clone()).unwrap();

        doc.find_by_id("17");
        assert_eq!(store.queries()[0].key_filter, Some(Key::new("Author", 17)));

        doc.find_by_id("seventeen");
        assert_eq!(store.queries().len(), 1);
        assert!(matches!(doc.errors().entries()[0], MapperError::Input(_)));
    }

    #[test]
    fn find_by_iud_filters_on_uid_field() {
        let store = RecordingStore::default();
        let mut doc = AuthorDocument::new(store.clone()).unwrap();

        doc.find_by_iud("u-1");

        assert_eq!(
            store.queries()[0].filters,
            vec![Filter::Eq("uid".into(), Value::from("u-1"))]
        );
    }

    #[test]
    fn info_wraps_properties() {
        let doc = AuthorDocument::hydrate(RecordingStore::default(), [("name", Value::from("Ada"))])
            .unwrap();
        let envelope = doc.info().unwrap();
        assert_eq!(envelope.status, 200);
        assert_eq!(envelope.message, "Success");
        assert_eq!(envelope.data["name"], "Ada");
    }
}
