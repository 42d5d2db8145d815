use thiserror::Error;

/// Errors from building or editing a specification graph.
#[derive(Debug, Error)]
pub enum SpecError {
    #[error("unknown task spec: {0}")]
    UnknownSpec(String),

    #[error("task spec '{0}' already exists")]
    DuplicateName(String),

    #[error("'{0}' is not a StartTask named 'Start'")]
    NotAStart(String),

    #[error("edge {from} -> {to} is not recorded on both ends")]
    EdgeMismatch { from: String, to: String },
}

/// Errors from workflow record storage (implemented in spindle-infra).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("record '{0}' not found")]
    NotFound(String),

    #[error("invalid record key '{0}'")]
    InvalidKey(String),

    #[error("storage I/O error: {0}")]
    Io(String),

    #[error("record encoding error: {0}")]
    Format(String),
}
