//! Error types for the research pipeline

use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Error, Debug)]
pub enum PipelineError {

    // =============================
    // Pipeline Errors
    // =============================

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("LLM request timed out after {seconds}s")]
    Timeout { seconds: u64 },

    #[error("Missing prerequisite: {0}")]
    MissingPrerequisite(String),

    #[error("Update carries undeclared field: {0}")]
    UndeclaredField(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl PipelineError {
    /// Map a transport failure, turning an elapsed request into `Timeout`.
    ///
    /// The request URL is dropped from the error; it may carry credentials.
    pub(crate) fn from_transport(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            PipelineError::Timeout {
                seconds: timeout_secs,
            }
        } else {
            PipelineError::HttpError(err.without_url())
        }
    }
}
