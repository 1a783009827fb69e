use thiserror::Error;

#[derive(Error, Debug)]
pub enum MapperError {
    #[error("Invalid {property} format: {input}")]
    Validation {
        property: &'static str,
        input: String,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    Input(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Commit conflict: {0}")]
    Conflict(String),
}

impl MapperError {
    /// Whether this error came from the store rather than from caller input.
    pub fn is_operational(&self) -> bool {
        matches!(
            self,
            MapperError::Storage(_) | MapperError::Conflict(_) | MapperError::Serialization(_)
        )
    }
}

/// Result of a persistence operation that did not commit.
///
/// The underlying cause is never carried here; it is appended to the
/// document's error log instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PersistError {
    #[error("Cannot proceed to transaction {operation}. There are errors encountered.")]
    Blocked {
        operation: &'static str,
        pending: usize,
    },

    #[error("Unexpected error occurred.")]
    RolledBack,
}
