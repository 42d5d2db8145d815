//! Workflow record store trait definition.

use spindle_types::error::RepositoryError;
use spindle_types::workflow::Workflow;

use crate::serializer::{SerializerError, WorkflowRecord, WorkflowSerializer};

/// Storage for serialized workflow records, addressed by key.
///
/// Synchronous: one workflow instance is persisted between operations by a
/// single caller.
pub trait WorkflowStore: Send + Sync {
    /// Insert or replace the record stored under `key`.
    fn save(&self, key: &str, record: &WorkflowRecord) -> Result<(), RepositoryError>;

    /// Get the record stored under `key`.
    fn load(&self, key: &str) -> Result<Option<WorkflowRecord>, RepositoryError>;

    /// Keys of every stored record, sorted.
    fn list(&self) -> Result<Vec<String>, RepositoryError>;

    /// Delete the record under `key`. Returns `true` if it existed.
    fn delete(&self, key: &str) -> Result<bool, RepositoryError>;
}

/// Keys are non-empty and limited to ASCII letters, digits, `-`, `_` and `.`,
/// and may not start with `.`.
pub fn validate_key(key: &str) -> Result<(), RepositoryError> {
    let valid = !key.is_empty()
        && !key.starts_with('.')
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(RepositoryError::InvalidKey(key.to_string()))
    }
}

impl WorkflowSerializer {
    /// Serialize `workflow` and store it under `key`.
    pub fn save_to(
        &self,
        store: &impl WorkflowStore,
        key: &str,
        workflow: &Workflow,
    ) -> Result<(), SerializerError> {
        let record = self.serialize_workflow(workflow, self.config().include_spec)?;
        store.save(key, &record)?;
        tracing::debug!(key, tasks = workflow.task_tree.count(), "saved workflow");
        Ok(())
    }

    /// Load and rebuild the workflow stored under `key`.
    pub fn load_from(&self, store: &impl WorkflowStore, key: &str) -> Result<Workflow, SerializerError> {
        let record = store
            .load(key)?
            .ok_or_else(|| RepositoryError::NotFound(key.to_string()))?;
        self.deserialize_workflow(&record, None, false)
    }
}
