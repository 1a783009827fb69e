//! Paginated listings and the response values handed to envelope formatters.

use std::collections::HashMap;

use serde::Serialize;
use tracing::debug;

use crate::{Cursor, Datastore, Document, Entity, FetchOptions, MapperError, Model, Value};

pub const DEFAULT_ORDER: &str = "-createdAt";
pub const DEFAULT_LIMIT: u64 = 15;

/// The three values a response envelope formatter consumes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope<T> {
    pub message: String,
    pub data: T,
    pub status: u16,
}

impl<T> Envelope<T> {
    pub fn success(data: T) -> Self {
        Self {
            message: "Success".to_string(),
            data,
            status: 200,
        }
    }
}

/// Options recognized when listing documents.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionOptions {
    pub cursor: Option<Cursor>,
    pub order: String,
    pub limit: u64,
    pub uid: Option<String>,
    pub filters: Option<Value>,
}

impl Default for CollectionOptions {
    fn default() -> Self {
        Self {
            cursor: None,
            order: DEFAULT_ORDER.to_string(),
            limit: DEFAULT_LIMIT,
            uid: None,
            filters: None,
        }
    }
}

/// Which fetch a set of options resolves to.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchPath {
    /// Single-record lookup on the `uid` field; pagination ignored.
    Uid(String),
    /// Ad-hoc filter list; pagination ignored.
    Filters(Value),
    /// Ordered, cursor-bounded listing.
    Paged(FetchOptions),
}

impl CollectionOptions {
    /// Decode request-style parameters, taking the first value of each key.
    ///
    /// Values that cannot be decoded keep their defaults and are returned
    /// as input errors.
    pub fn from_params(params: &HashMap<String, Vec<Value>>) -> (Self, Vec<MapperError>) {
        let first = |name: &str| params.get(name).and_then(|values| values.first());
        let mut options = Self::default();
        let mut errors = Vec::new();

        match first("cursor") {
            None | Some(Value::Null) => {}
            Some(Value::String(token)) => options.cursor = Some(Cursor::new(token.clone())),
            Some(other) => errors.push(invalid("cursor", other)),
        }

        match first("order") {
            None => {}
            Some(Value::String(order)) if !order.is_empty() => options.order = order.clone(),
            Some(other) => errors.push(invalid("order", other)),
        }

        match first("limit") {
            None => {}
            Some(Value::Int(limit)) if *limit > 0 => options.limit = *limit as u64,
            Some(Value::String(limit)) => match limit.trim().parse::<u64>() {
                Ok(limit) if limit > 0 => options.limit = limit,
                _ => errors.push(invalid("limit", &Value::String(limit.clone()))),
            },
            Some(other) => errors.push(invalid("limit", other)),
        }

        match first("uid") {
            None | Some(Value::Null) => {}
            Some(Value::String(uid)) if uid.is_empty() => {}
            Some(Value::String(uid)) => options.uid = Some(uid.clone()),
            Some(Value::Int(uid)) => options.uid = Some(uid.to_string()),
            Some(other) => errors.push(invalid("uid", other)),
        }

        match first("filters") {
            None | Some(Value::Null) => {}
            Some(filters) => options.filters = Some(filters.clone()),
        }

        (options, errors)
    }

    /// `uid` wins over `filters`, which wins over the paged listing.
    ///
    /// An empty uid, an empty filter list, and a `filters` value that is not
    /// a list all fall through to the paged listing.
    pub fn resolve(&self) -> FetchPath {
        if let Some(uid) = self.uid.as_ref().filter(|uid| !uid.is_empty()) {
            return FetchPath::Uid(uid.clone());
        }
        if let Some(filters) = self
            .filters
            .as_ref()
            .filter(|filters| filters.as_list().is_some_and(|entries| !entries.is_empty()))
        {
            return FetchPath::Filters(filters.clone());
        }
        FetchPath::Paged(FetchOptions {
            cursor: self.cursor.clone(),
            limit: Some(self.limit),
            order: vec![self.order.clone()],
        })
    }
}

fn invalid(option: &str, value: &Value) -> MapperError {
    MapperError::Input(format!(
        "{} must not be a {} ({})",
        option,
        value.type_name(),
        value
    ))
}

/// One page of documents of a kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Collection {
    pub data: Vec<Entity>,
    pub more_results: bool,
    pub next_cursor: Option<Cursor>,
}

impl Collection {
    /// Run the fetch selected by `options` through `document`'s query builder.
    ///
    /// Failures land in the document's error log.
    pub fn fetch<M: Model, S: Datastore>(
        document: &mut Document<M, S>,
        options: &CollectionOptions,
    ) -> Self {
        let filters_malformed = options
            .filters
            .as_ref()
            .is_some_and(|filters| filters.as_list().is_none());
        if filters_malformed {
            document.record_errors([MapperError::Input("Filters must be a list.".to_string())]);
        }

        let path = options.resolve();
        debug!(kind = document.kind(), ?path, "listing collection");
        match path {
            FetchPath::Uid(uid) => Self {
                data: document.filters(&Value::List(vec![Value::from(("uid", "=", uid))])).items,
                more_results: false,
                next_cursor: None,
            },
            FetchPath::Filters(filters) => Self {
                data: document.filters(&filters).items,
                more_results: false,
                next_cursor: None,
            },
            FetchPath::Paged(fetch) => {
                let (data, more_results, next_cursor) = document.all_items(&fetch).into_parts();
                Self {
                    data,
                    more_results,
                    next_cursor,
                }
            }
        }
    }

    /// Decode request parameters and fetch; decoding errors are logged on the document.
    pub fn from_params<M: Model, S: Datastore>(
        document: &mut Document<M, S>,
        params: &HashMap<String, Vec<Value>>,
    ) -> Self {
        let (options, errors) = CollectionOptions::from_params(params);
        document.record_errors(errors);
        Self::fetch(document, &options)
    }

    pub fn envelope(&self) -> Envelope<&Self> {
        Envelope::success(self)
    }
}
