//! Error Handling
//!
//! Unified error types for the application.
//! Uses thiserror for ergonomic error definitions.

use thiserror::Error;

use scan_review_core::CoreError;
use scan_review_llm::LlmError;

use crate::services::workflow::GuardViolation;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Missing or invalid required input. Nothing was mutated.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing credential or invalid configuration. No call was attempted.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An image call failed or returned malformed data mid-run.
    /// No partial results were committed.
    #[error("Analysis aborted: {reason}")]
    AnalysisAborted { reason: String },

    /// Wrong persona or wrong status for the requested action
    #[error("Workflow guard violation: {0}")]
    WorkflowGuard(#[from] GuardViolation),

    /// Database errors
    #[error("Database error: {0}")]
    Database(String),

    /// SQLite errors (auto-converted from rusqlite::Error)
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Encrypting or decrypting a stored secret failed
    #[error("Secret storage error: {0}")]
    Secret(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Not found errors
    #[error("Not found: {0}")]
    NotFound(String),

    /// Inference boundary errors outside an analysis run (e.g. translation)
    #[error("Inference error: {0}")]
    Inference(#[from] LlmError),

    /// Generic internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an aborted-analysis error
    pub fn analysis_aborted(reason: impl Into<String>) -> Self {
        Self::AnalysisAborted {
            reason: reason.into(),
        }
    }

    /// Create a database error
    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    /// Create a secret storage error
    pub fn secret(msg: impl Into<String>) -> Self {
        Self::Secret(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether this is a workflow guard violation
    pub fn is_guard_violation(&self) -> bool {
        matches!(self, Self::WorkflowGuard(_))
    }
}

impl From<CoreError> for AppError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Config(msg) => Self::Config(msg),
            CoreError::Validation(msg) => Self::Validation(msg),
            CoreError::Serialization(e) => Self::Serialization(e),
            CoreError::Parse(msg) => Self::Validation(msg),
        }
    }
}

/// Convert AppError to a string suitable for command responses
impl From<AppError> for String {
    fn from(err: AppError) -> String {
        err.to_string()
    }
}
