//! Model types and their field descriptors.
//!
//! A model type declares its fields once, as an immutable [`ModelDescriptor`].
//! Hydration walks that list rather than whatever inputs happen to arrive.
//! `#[derive(Model)]` generates the descriptor from a struct definition:
//!
//! ```text
//! #[derive(Model)]
//! #[model(kind = "Account")]
//! pub struct Account {
//!     #[property(string)]
//!     pub name: String,
//!     #[property(email)]
//!     pub email: String,
//!     #[property(url, exclude_from_indexes)]
//!     pub homepage: Option<String>,
//!     #[property(random_string(min = 16, max = 24))]
//!     pub api_token: Option<String>,
//! }
//! ```

use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::{Entity, PropertyKind, Timestamp, Value};

/// Record fields that are never indexed.
pub const DEFAULT_EXCLUDED_INDEXES: [&str; 2] = ["createdAt", "updatedAt"];

/// Record fields written from document metadata. Models cannot declare them.
pub const RESERVED_FIELD_NAMES: [&str; 4] = ["uid", "createdAt", "updatedAt", "deletedAt"];

/// A declared model field: stored name, validation kind, index policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    name: String,
    kind: PropertyKind,
    exclude_from_indexes: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            kind,
            exclude_from_indexes: false,
        }
    }

    pub fn exclude_from_indexes(mut self, exclude: bool) -> Self {
        self.exclude_from_indexes = exclude;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    pub fn is_excluded_from_indexes(&self) -> bool {
        self.exclude_from_indexes
    }
}

/// Per-type model metadata. Built once per type and never mutated afterwards.
#[derive(Debug)]
pub struct ModelDescriptor {
    kind: String,
    fields: Vec<FieldDescriptor>,
    excluded: OnceLock<BTreeSet<String>>,
}

impl ModelDescriptor {
    pub fn new(kind: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            kind: kind.into(),
            fields,
            excluded: OnceLock::new(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// The first declared field whose name collides with document metadata.
    pub fn reserved_field(&self) -> Option<&str> {
        self.fields
            .iter()
            .map(FieldDescriptor::name)
            .find(|name| RESERVED_FIELD_NAMES.contains(name))
    }

    /// `createdAt` and `updatedAt` plus every field declared as unindexed.
    pub fn excluded_indexes(&self) -> &BTreeSet<String> {
        self.excluded.get_or_init(|| {
            DEFAULT_EXCLUDED_INDEXES
                .iter()
                .map(|name| name.to_string())
                .chain(
                    self.fields
                        .iter()
                        .filter(|field| field.exclude_from_indexes)
                        .map(|field| field.name.clone()),
                )
                .collect()
        })
    }
}

/// A model type with a static descriptor.
///
/// Usually implemented with `#[derive(Model)]`.
pub trait Model: Sized {
    fn descriptor() -> &'static ModelDescriptor;

    /// Named inputs for hydration. Absent optional fields are omitted.
    fn into_inputs(self) -> Vec<(&'static str, Value)>;
}

/// Conversion of a model struct field into a hydration input.
pub trait IntoInput {
    fn into_input(self) -> Option<Value>;
}

macro_rules! into_input_via_value {
    ($($ty:ty),* $(,)?) => {
        $(
            impl IntoInput for $ty {
                fn into_input(self) -> Option<Value> {
                    Some(Value::from(self))
                }
            }
        )*
    };
}

into_input_via_value!(String, &str, i64, i32, f64, bool, Timestamp, Entity, Vec<Value>);

impl IntoInput for Value {
    fn into_input(self) -> Option<Value> {
        Some(self)
    }
}

impl<T: IntoInput> IntoInput for Option<T> {
    fn into_input(self) -> Option<Value> {
        self.and_then(IntoInput::into_input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn excluded_indexes_always_include_timestamps() {
        let descriptor = ModelDescriptor::new("Bare", Vec::new());
        let excluded = descriptor.excluded_indexes();
        assert!(excluded.contains("createdAt"));
        assert!(excluded.contains("updatedAt"));
        assert_eq!(excluded.len(), 2);
    }

    #[test]
    fn excluded_indexes_are_stable_across_calls() {
        let descriptor = ModelDescriptor::new(
            "Post",
            vec![
                FieldDescriptor::new("body", PropertyKind::String).exclude_from_indexes(true),
                FieldDescriptor::new("title", PropertyKind::String),
            ],
        );

        let first = descriptor.excluded_indexes().clone();
        let second = descriptor.excluded_indexes().clone();
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
        assert!(first.contains("body"));
        assert!(!first.contains("title"));
    }

    #[test]
    fn unrelated_descriptors_do_not_share_exclusions() {
        let post = ModelDescriptor::new(
            "Post",
            vec![FieldDescriptor::new("body", PropertyKind::Raw).exclude_from_indexes(true)],
        );
        let user = ModelDescriptor::new("User", Vec::new());

        assert!(post.excluded_indexes().contains("body"));
        assert!(!user.excluded_indexes().contains("body"));
    }

    #[test]
    fn metadata_names_are_reported_as_reserved() {
        let clean = ModelDescriptor::new(
            "Post",
            vec![FieldDescriptor::new("title", PropertyKind::String)],
        );
        let shadowing = ModelDescriptor::new(
            "Post",
            vec![
                FieldDescriptor::new("title", PropertyKind::String),
                FieldDescriptor::new("createdAt", PropertyKind::Raw),
            ],
        );

        assert_eq!(clean.reserved_field(), None);
        assert_eq!(shadowing.reserved_field(), Some("createdAt"));
    }

    #[test]
    fn optional_inputs_skip_none() {
        assert_eq!(None::<String>.into_input(), None);
        assert_eq!(Some("a").into_input(), Some(Value::from("a")));
    }
}
