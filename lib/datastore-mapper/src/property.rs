//! Validated property values.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use crate::{MapperError, Value};

static URL_PATTERN: Lazy<Result<Regex, regex::Error>> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)^(?:http|ftp)s?://",
        r"(?:(?:[A-Z0-9](?:[A-Z0-9-]{0,61}[A-Z0-9])?\.)+(?:[A-Z]{2,6}\.?|[A-Z0-9-]{2,}\.?)|",
        r"localhost|",
        r"\d{1,3}\.\d{1,3}\.\d{1,3}\.\d{1,3})",
        r"(?::\d+)?",
        r"(?:/?|[/?]\S+)$",
    ))
});

static EMAIL_PATTERN: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[^@]+@[^@]+\.[^@]+"));

const RANDOM_CHARSET: &[u8] =
    b"abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ!\"#$%&'()*+,-./:;<=>?@[\\]^_`{|}~0123456789";

pub const DEFAULT_RANDOM_MIN: usize = 8;
pub const DEFAULT_RANDOM_MAX: usize = 12;

/// The validation rule applied when a property is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// Stored as given.
    Raw,
    /// Must be a string.
    String,
    /// Must be an http(s)/ftp(s) URL with a domain, `localhost`, or IPv4 host.
    Url,
    /// Must look like `local@domain.tld`.
    Email,
    /// Ignores the assigned value and stores a fresh random string.
    RandomString { min: usize, max: usize },
    /// Stored as given; used for generated ids.
    Identifier,
    /// Must be a persisted entity.
    EntityRef,
}

impl PropertyKind {
    pub fn random_string() -> Self {
        PropertyKind::RandomString {
            min: DEFAULT_RANDOM_MIN,
            max: DEFAULT_RANDOM_MAX,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            PropertyKind::Raw => "Property",
            PropertyKind::String => "StringProperty",
            PropertyKind::Url => "UrlProperty",
            PropertyKind::Email => "EmailProperty",
            PropertyKind::RandomString { .. } => "RandomStringProperty",
            PropertyKind::Identifier => "UidProperty",
            PropertyKind::EntityRef => "EntityProperty",
        }
    }

    /// Check `raw` against this kind's rule and return the value to store.
    pub fn validate(&self, raw: Value) -> Result<Value, MapperError> {
        match self {
            PropertyKind::Raw | PropertyKind::Identifier => Ok(raw),
            PropertyKind::String => match raw {
                Value::String(_) => Ok(raw),
                other => Err(self.invalid(&other)),
            },
            PropertyKind::Url => self.matching(&URL_PATTERN, raw),
            PropertyKind::Email => self.matching(&EMAIL_PATTERN, raw),
            PropertyKind::RandomString { min, max } => {
                Ok(Value::String(random_string(*min, *max)))
            }
            PropertyKind::EntityRef => match &raw {
                Value::Entity(entity) if entity.key().is_complete() => Ok(raw),
                other => Err(self.invalid(other)),
            },
        }
    }

    fn matching(
        &self,
        pattern: &Lazy<Result<Regex, regex::Error>>,
        raw: Value,
    ) -> Result<Value, MapperError> {
        let regex = match pattern.as_ref() {
            Ok(regex) => regex,
            Err(e) => return Err(MapperError::Config(e.to_string())),
        };
        match raw.as_str() {
            Some(s) if regex.is_match(s) => Ok(raw),
            _ => Err(self.invalid(&raw)),
        }
    }

    fn invalid(&self, raw: &Value) -> MapperError {
        MapperError::Validation {
            property: self.name(),
            input: raw.to_string(),
        }
    }
}

/// Random string of length in `[min, max]` over letters, punctuation and digits.
pub fn random_string(min: usize, max: usize) -> String {
    let (min, max) = if min <= max { (min, max) } else { (max, min) };
    let mut rng = rand::thread_rng();
    let len = rng.gen_range(min..=max);
    (0..len)
        .map(|_| RANDOM_CHARSET[rng.gen_range(0..RANDOM_CHARSET.len())] as char)
        .collect()
}

/// A value holder that only ever stores values accepted by its kind.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyValue {
    kind: PropertyKind,
    value: Option<Value>,
}

impl PropertyValue {
    pub fn new(kind: PropertyKind) -> Self {
        Self { kind, value: None }
    }

    /// Create a property and assign `default` through validation.
    pub fn with_default(kind: PropertyKind, default: Value) -> Result<Self, MapperError> {
        let mut property = Self::new(kind);
        property.set_value(default)?;
        Ok(property)
    }

    pub fn kind(&self) -> &PropertyKind {
        &self.kind
    }

    /// Validate and store `raw`. On failure the previous value is kept.
    pub fn set_value(&mut self, raw: impl Into<Value>) -> Result<(), MapperError> {
        let validated = self.kind.validate(raw.into())?;
        self.value = Some(validated);
        Ok(())
    }

    pub fn get_value(&self) -> Option<&Value> {
        self.value.as_ref()
    }

    pub fn into_value(self) -> Option<Value> {
        self.value
    }
}
