use spindle_types::error::{RepositoryError, SpecError};
use thiserror::Error;
use uuid::Uuid;

use crate::codec::CodecError;

/// Errors that can occur while serializing or deserializing workflows.
#[derive(Debug, Error)]
pub enum SerializerError {
    /// A value capsule could not be encoded or decoded.
    #[error("corrupt value in {context}: {source}")]
    CorruptValue {
        context: String,
        #[source]
        source: CodecError,
    },

    /// Unknown operand/operator kind tag.
    #[error("unsupported expression kind '{0}'")]
    UnsupportedExpression(String),

    /// A known tag carried a payload of the wrong shape.
    #[error("malformed '{tag}' expression: {reason}")]
    MalformedExpression { tag: String, reason: String },

    /// Attempt to serialize something that cannot be duplicated safely.
    #[error("task not supported: {0}")]
    TaskNotSupported(String),

    /// A task or edge names a spec that does not exist, even after repair.
    #[error("missing task spec: {0}")]
    MissingSpec(String),

    /// A parent or last-task id names a task that is not in the tree.
    #[error("missing task {0}")]
    MissingTask(Uuid),

    /// The same task id appears twice in one tree.
    #[error("duplicate task id {0}")]
    DuplicateTask(Uuid),

    /// Structurally invalid specification graph record.
    #[error("malformed specification graph: {0}")]
    MalformedGraph(String),

    /// The outer JSON/YAML text could not be produced or parsed.
    #[error("format error: {0}")]
    Format(String),

    /// The record store failed.
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl SerializerError {
    pub(crate) fn corrupt(context: impl Into<String>) -> impl FnOnce(CodecError) -> Self {
        let context = context.into();
        move |source| Self::CorruptValue { context, source }
    }
}

impl From<SpecError> for SerializerError {
    fn from(err: SpecError) -> Self {
        match err {
            SpecError::UnknownSpec(name) => Self::MissingSpec(name),
            other => Self::MalformedGraph(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for SerializerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Format(err.to_string())
    }
}

impl From<serde_yaml_ng::Error> for SerializerError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        Self::Format(err.to_string())
    }
}
