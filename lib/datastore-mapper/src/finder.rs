//! Read-side queries over one kind.

use tracing::{debug, warn};

use crate::{Datastore, Entity, ErrorLog, FetchOptions, Filter, Key, MapperError, Page, Query, Value};

const FILTERS_NOT_A_LIST: &str = "Filters must be a list.";
const FILTER_NOT_A_TRIPLE: &str =
    "Filters must consist of tuple(property_name, operator, value).";

/// Builds and runs queries for one kind, logging failures instead of
/// returning them.
pub struct QueryBuilder<'a, S: Datastore> {
    client: &'a S,
    kind: &'a str,
    errors: &'a mut ErrorLog,
}

impl<'a, S: Datastore> QueryBuilder<'a, S> {
    pub fn new(client: &'a S, kind: &'a str, errors: &'a mut ErrorLog) -> Self {
        Self {
            client,
            kind,
            errors,
        }
    }

    /// An empty query scoped to this kind and the client's namespace.
    pub fn query(&self) -> Query {
        Query::new(self.kind).namespace(self.client.namespace().map(str::to_string))
    }

    /// Unfiltered listing with order, cursor and limit.
    pub fn all_items(&mut self, options: &FetchOptions) -> Page {
        let mut query = self.query().start_cursor(options.cursor.clone());
        for spec in &options.order {
            query = query.order(spec);
        }
        if let Some(limit) = options.limit {
            query = query.limit(limit);
        }
        self.fetch(&query)
    }

    /// Apply the first well-formed `[field, operator, value]` entry of `params`.
    ///
    /// Only one filter is ever applied: the page for the first well-formed
    /// entry is returned and later entries are not looked at. Malformed
    /// entries before it are logged and skipped.
    pub fn filters(&mut self, params: &Value) -> Page {
        let Some(entries) = params.as_list() else {
            self.errors
                .push(MapperError::Input(FILTERS_NOT_A_LIST.to_string()));
            return Page::empty();
        };

        for (position, entry) in entries.iter().enumerate() {
            match parse_filter(entry) {
                Some(filter) => {
                    let ignored = entries.len() - position - 1;
                    if ignored > 0 {
                        debug!(kind = self.kind, ignored, "only the first filter is applied");
                    }
                    let query = self.query().filter(filter);
                    return self.fetch(&query);
                }
                None => {
                    warn!(kind = self.kind, entry = %entry, "skipping malformed filter");
                    self.errors
                        .push(MapperError::Input(FILTER_NOT_A_TRIPLE.to_string()));
                }
            }
        }
        Page::empty()
    }

    /// Fetch by exact key match.
    pub fn find_by_key(&mut self, key: Key) -> Vec<Entity> {
        let query = self.query().key_filter(key);
        self.fetch(&query).items
    }

    /// Fetch documents whose logical `uid` field equals `uid`.
    pub fn find_by_uid(&mut self, uid: &str) -> Vec<Entity> {
        let params = Value::List(vec![Value::from(("uid", "=", uid))]);
        self.filters(&params).items
    }

    /// Run `query`; store failures are logged and yield an empty page.
    pub fn fetch(&mut self, query: &Query) -> Page {
        match self.client.run_query(query) {
            Ok(page) => {
                debug!(
                    kind = self.kind,
                    items = page.items.len(),
                    more_results = page.more_results,
                    "fetched page"
                );
                page
            }
            Err(error) => {
                warn!(kind = self.kind, %error, "fetch failed");
                self.errors.push(error);
                Page::empty()
            }
        }
    }
}

fn parse_filter(entry: &Value) -> Option<Filter> {
    match entry.as_list()? {
        [field, operator, value] => {
            Filter::from_operator(field.as_str()?, operator.as_str()?, value.clone())
        }
        _ => None,
    }
}
