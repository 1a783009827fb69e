//! Test doubles shared by the unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::{
    Datastore, Entity, FieldDescriptor, Key, MapperError, Model, ModelDescriptor, Page,
    PropertyKind, Query, Transaction, Value,
};

pub fn descriptor() -> &'static ModelDescriptor {
    static DESCRIPTOR: OnceLock<ModelDescriptor> = OnceLock::new();
    DESCRIPTOR.get_or_init(|| {
        ModelDescriptor::new(
            "Author",
            vec![
                FieldDescriptor::new("name", PropertyKind::String),
                FieldDescriptor::new("email", PropertyKind::Email),
                FieldDescriptor::new("website", PropertyKind::Url),
                FieldDescriptor::new("bio", PropertyKind::String).exclude_from_indexes(true),
                FieldDescriptor::new("token", PropertyKind::random_string()),
                FieldDescriptor::new("editor", PropertyKind::EntityRef),
            ],
        )
    })
}

#[derive(Debug, Default)]
pub struct Author {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl Model for Author {
    fn descriptor() -> &'static ModelDescriptor {
        descriptor()
    }

    fn into_inputs(self) -> Vec<(&'static str, Value)> {
        let mut inputs = Vec::new();
        if let Some(name) = self.name {
            inputs.push(("name", Value::from(name)));
        }
        if let Some(email) = self.email {
            inputs.push(("email", Value::from(email)));
        }
        inputs
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Begin,
    Put(Key),
    Commit,
    Rollback,
}

#[derive(Debug, Default)]
struct State {
    calls: Vec<Call>,
    puts: Vec<Entity>,
    queries: Vec<Query>,
    pages: VecDeque<Page>,
    fail_put: Option<MapperError>,
    fail_commit: Option<MapperError>,
    fail_rollback: Option<MapperError>,
    fail_query: Option<MapperError>,
}

/// A store that records every call and answers queries from a queue.
#[derive(Debug, Default, Clone)]
pub struct RecordingStore {
    state: Rc<RefCell<State>>,
}

impl RecordingStore {
    pub fn calls(&self) -> Vec<Call> {
        self.state.borrow().calls.clone()
    }

    pub fn puts(&self) -> Vec<Entity> {
        self.state.borrow().puts.clone()
    }

    pub fn queries(&self) -> Vec<Query> {
        self.state.borrow().queries.clone()
    }

    pub fn respond_with(&self, page: Page) {
        self.state.borrow_mut().pages.push_back(page);
    }

    pub fn fail_put_with(&self, error: MapperError) {
        self.state.borrow_mut().fail_put = Some(error);
    }

    pub fn fail_commit_with(&self, error: MapperError) {
        self.state.borrow_mut().fail_commit = Some(error);
    }

    pub fn fail_rollback_with(&self, error: MapperError) {
        self.state.borrow_mut().fail_rollback = Some(error);
    }

    pub fn fail_query_with(&self, error: MapperError) {
        self.state.borrow_mut().fail_query = Some(error);
    }
}

pub struct RecordingTransaction {
    state: Rc<RefCell<State>>,
}

impl Transaction for RecordingTransaction {
    fn begin(&mut self) -> Result<(), MapperError> {
        self.state.borrow_mut().calls.push(Call::Begin);
        Ok(())
    }

    fn put(&mut self, entity: Entity) -> Result<(), MapperError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Put(entity.key().clone()));
        if let Some(error) = state.fail_put.take() {
            return Err(error);
        }
        state.puts.push(entity);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), MapperError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Commit);
        match state.fail_commit.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn rollback(&mut self) -> Result<(), MapperError> {
        let mut state = self.state.borrow_mut();
        state.calls.push(Call::Rollback);
        match state.fail_rollback.take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

impl Datastore for RecordingStore {
    type Transaction = RecordingTransaction;

    fn transaction(&self) -> Self::Transaction {
        RecordingTransaction {
            state: Rc::clone(&self.state),
        }
    }

    fn run_query(&self, query: &Query) -> Result<Page, MapperError> {
        let mut state = self.state.borrow_mut();
        state.queries.push(query.clone());
        if let Some(error) = state.fail_query.take() {
            return Err(error);
        }
        Ok(state.pages.pop_front().unwrap_or_default())
    }
}
