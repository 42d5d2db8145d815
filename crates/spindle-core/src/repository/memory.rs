//! In-memory workflow store.

use std::collections::BTreeMap;
use std::sync::RwLock;

use spindle_types::error::RepositoryError;

use super::workflow::{WorkflowStore, validate_key};
use crate::serializer::WorkflowRecord;

/// A `WorkflowStore` backed by a map. Records are cloned in and out.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    records: RwLock<BTreeMap<String, WorkflowRecord>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Io("in-memory store lock poisoned".to_string())
}

impl WorkflowStore for InMemoryStore {
    fn save(&self, key: &str, record: &WorkflowRecord) -> Result<(), RepositoryError> {
        validate_key(key)?;
        self.records
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<WorkflowRecord>, RepositoryError> {
        validate_key(key)?;
        Ok(self.records.read().map_err(poisoned)?.get(key).cloned())
    }

    fn list(&self) -> Result<Vec<String>, RepositoryError> {
        Ok(self.records.read().map_err(poisoned)?.keys().cloned().collect())
    }

    fn delete(&self, key: &str) -> Result<bool, RepositoryError> {
        validate_key(key)?;
        Ok(self.records.write().map_err(poisoned)?.remove(key).is_some())
    }
}
