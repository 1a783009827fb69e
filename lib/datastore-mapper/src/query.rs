//! Store-agnostic query description.
//!
//! Backends receive a [`Query`] and translate it into their own fetch
//! primitive, returning one [`Page`] of results.

use std::cmp::Ordering;

use serde::Serialize;

use crate::{Entity, Key, Value};

/// Filter conditions for queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// field = value
    Eq(String, Value),
    /// field != value
    Ne(String, Value),
    /// field > value
    Gt(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
    /// field <= value
    Lte(String, Value),
    /// field IN (values)
    In(String, Value),
}

impl Filter {
    /// Build a filter from an operator symbol. Unknown operators yield `None`.
    pub fn from_operator(
        field: impl Into<String>,
        operator: &str,
        value: impl Into<Value>,
    ) -> Option<Self> {
        let field = field.into();
        let value = value.into();
        let filter = match operator.trim() {
            "=" | "==" => Filter::Eq(field, value),
            "!=" => Filter::Ne(field, value),
            ">" => Filter::Gt(field, value),
            ">=" => Filter::Gte(field, value),
            "<" => Filter::Lt(field, value),
            "<=" => Filter::Lte(field, value),
            op if op.eq_ignore_ascii_case("in") => Filter::In(field, value),
            _ => return None,
        };
        Some(filter)
    }

    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _)
            | Filter::Ne(field, _)
            | Filter::Gt(field, _)
            | Filter::Gte(field, _)
            | Filter::Lt(field, _)
            | Filter::Lte(field, _)
            | Filter::In(field, _) => field,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Filter::Eq(_, value)
            | Filter::Ne(_, value)
            | Filter::Gt(_, value)
            | Filter::Gte(_, value)
            | Filter::Lt(_, value)
            | Filter::Lte(_, value)
            | Filter::In(_, value) => value,
        }
    }

    /// Whether a candidate field value satisfies this filter.
    ///
    /// A missing field never matches.
    pub fn matches(&self, candidate: Option<&Value>) -> bool {
        let Some(candidate) = candidate else {
            return false;
        };
        let ordering = candidate.compare(self.value());
        match self {
            Filter::Eq(..) => ordering == Some(Ordering::Equal),
            Filter::Ne(..) => ordering != Some(Ordering::Equal),
            Filter::Gt(..) => ordering == Some(Ordering::Greater),
            Filter::Gte(..) => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Filter::Lt(..) => ordering == Some(Ordering::Less),
            Filter::Lte(..) => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Filter::In(_, values) => values
                .as_list()
                .is_some_and(|items| {
                    items
                        .iter()
                        .any(|item| candidate.compare(item) == Some(Ordering::Equal))
                }),
        }
    }
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

impl Order {
    /// Parse `"-field"` as descending and `"field"` as ascending.
    pub fn parse(spec: &str) -> (String, Order) {
        match spec.strip_prefix('-') {
            Some(field) => (field.to_string(), Order::Desc),
            None => (spec.to_string(), Order::Asc),
        }
    }
}

/// Opaque continuation token returned by a paged fetch.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    pub fn new(token: impl Into<String>) -> Self {
        Cursor(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Cursor {
    fn from(token: &str) -> Self {
        Cursor(token.to_string())
    }
}

impl From<String> for Cursor {
    fn from(token: String) -> Self {
        Cursor(token)
    }
}

/// A fetch over one kind.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Namespace the kind lives in.
    pub namespace: Option<String>,
    /// The kind to query.
    pub kind: String,
    /// Filter conditions.
    pub filters: Vec<Filter>,
    /// Exact key match.
    pub key_filter: Option<Key>,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results in the page.
    pub limit: Option<u64>,
    /// Resume after a previous page.
    pub start_cursor: Option<Cursor>,
}

impl Query {
    /// Create a new query for a kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            namespace: None,
            kind: kind.into(),
            filters: Vec::new(),
            key_filter: None,
            order_by: Vec::new(),
            limit: None,
            start_cursor: None,
        }
    }

    pub fn namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace;
        self
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand for Filter::Eq).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    /// Restrict the fetch to one key.
    pub fn key_filter(mut self, key: Key) -> Self {
        self.key_filter = Some(key);
        self
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Add an order-by clause from `"-field"` / `"field"` notation.
    pub fn order(self, spec: &str) -> Self {
        let (field, order) = Order::parse(spec);
        self.order_by(field, order)
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Resume from a cursor returned by an earlier page.
    pub fn start_cursor(mut self, cursor: Option<Cursor>) -> Self {
        self.start_cursor = cursor;
        self
    }
}

/// One page of fetched entities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Page {
    pub items: Vec<Entity>,
    pub more_results: bool,
    pub next_cursor: Option<Cursor>,
}

impl Page {
    pub fn new(items: Vec<Entity>, more_results: bool, next_cursor: Option<Cursor>) -> Self {
        Self {
            items,
            more_results,
            next_cursor,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn into_parts(self) -> (Vec<Entity>, bool, Option<Cursor>) {
        (self.items, self.more_results, self.next_cursor)
    }
}

/// Cursor, limit and order for an unfiltered listing.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FetchOptions {
    pub cursor: Option<Cursor>,
    pub limit: Option<u64>,
    pub order: Vec<String>,
}
