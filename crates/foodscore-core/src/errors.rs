use thiserror::Error;

/// Failure taxonomy for a scoring request.
///
/// Each variant carries a stable machine-readable code so the transport layer
/// can map it without string matching.
#[derive(Debug, Error)]
pub enum ScoreError {
    /// Request body is not a JSON object of numbers.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Cache read or write failed. Never retried.
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    /// Classifier rejected the input or produced an unusable output.
    #[error("model invocation failed: {0}")]
    ModelInvocation(String),

    /// Model artifact could not be read or is structurally invalid.
    #[error("model load failed: {0}")]
    ModelLoad(String),

    /// The request deadline passed before the result was persisted.
    #[error("deadline exceeded after {elapsed_ms} ms")]
    DeadlineExceeded { elapsed_ms: u64 },

    /// A built-in invariant broke (e.g. the input schema failed to compile).
    #[error("internal error: {0}")]
    Internal(String),
}

pub mod codes {
    pub const E_INVALID_INPUT: &str = "E_INVALID_INPUT";
    pub const E_STORAGE: &str = "E_STORAGE";
    pub const E_MODEL: &str = "E_MODEL";
    pub const E_MODEL_LOAD: &str = "E_MODEL_LOAD";
    pub const E_TIMEOUT: &str = "E_TIMEOUT";
    pub const E_INTERNAL: &str = "E_INTERNAL";
}

impl ScoreError {
    pub fn code(&self) -> &'static str {
        match self {
            ScoreError::InvalidInput(_) => codes::E_INVALID_INPUT,
            ScoreError::Storage(_) => codes::E_STORAGE,
            ScoreError::ModelInvocation(_) => codes::E_MODEL,
            ScoreError::ModelLoad(_) => codes::E_MODEL_LOAD,
            ScoreError::DeadlineExceeded { .. } => codes::E_TIMEOUT,
            ScoreError::Internal(_) => codes::E_INTERNAL,
        }
    }

    /// True when the caller sent something we refuse to score (4xx territory).
    pub fn is_client_error(&self) -> bool {
        matches!(self, ScoreError::InvalidInput(_))
    }
}
