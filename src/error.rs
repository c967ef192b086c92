use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Timeout errors
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// A racing writer already created a cluster for the same matching key.
    /// Not an operator-visible failure: the caller must re-run matching
    /// against the now-visible cluster and attach instead of creating.
    #[error("Duplicate event key: {key}")]
    DuplicateEventKey { key: String },

    /// Processing errors
    #[error("Processing error: {0}")]
    Processing(String),

    /// Scheduler errors
    #[error("Scheduler error: {0}")]
    Scheduler(String),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Validation(_) => "VALIDATION_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Io(_) => "IO_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Timeout(_) => "TIMEOUT",
            AppError::DuplicateEventKey { .. } => "DUPLICATE_EVENT_KEY",
            AppError::Processing(_) => "PROCESSING_ERROR",
            AppError::Scheduler(_) => "SCHEDULER_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether a retry with backoff may succeed.
    ///
    /// Only store unavailability and timeouts qualify. `DuplicateEventKey`
    /// is deliberately excluded: it triggers a re-match, not a retry of
    /// the same creation.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::Storage(_) | AppError::Timeout(_))
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from bincode::Error
impl From<bincode::Error> for AppError {
    fn from(err: bincode::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Validation(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from sled::Error
impl From<sled::Error> for AppError {
    fn from(err: sled::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
