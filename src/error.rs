//! Error types for frontier-core.

use thiserror::Error;

/// Result type alias using frontier-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during search orchestration.
#[derive(Error, Debug)]
pub enum Error {
    /// Tool bridge failure that is not an expected tool error.
    ///
    /// Expected tool failures (unknown tool, timeout, execution error) are
    /// reported in-band as `ToolResult::Err` and never reach this variant.
    #[error("tool adapter error: {0}")]
    Tool(String),

    /// LLM call failed after retries but may succeed later.
    #[error("transient LLM error: {0}")]
    LlmTransient(String),

    /// LLM call failed in a way retries cannot fix.
    #[error("permanent LLM error: {0}")]
    LlmPermanent(String),

    /// Planner or validator output did not match the expected schema.
    #[error("schema violation in {source_stage}: {message}")]
    SchemaViolation {
        source_stage: String,
        message: String,
    },

    /// Referenced task does not exist or was cleaned up.
    #[error("unknown task: {task_id}")]
    TaskNotFound { task_id: String },

    /// Referenced file is not present in the registry.
    #[error("unknown file: {file_id}")]
    FileNotFound { file_id: String },

    /// Serialization/deserialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a tool adapter error.
    pub fn tool(message: impl Into<String>) -> Self {
        Self::Tool(message.into())
    }

    /// Create a transient LLM error.
    pub fn llm_transient(message: impl Into<String>) -> Self {
        Self::LlmTransient(message.into())
    }

    /// Create a permanent LLM error.
    pub fn llm_permanent(message: impl Into<String>) -> Self {
        Self::LlmPermanent(message.into())
    }

    /// Create a schema violation error for a pipeline stage.
    pub fn schema_violation(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::SchemaViolation {
            source_stage: stage.into(),
            message: message.into(),
        }
    }

    /// Create a task-not-found error.
    pub fn task_not_found(task_id: impl Into<String>) -> Self {
        Self::TaskNotFound {
            task_id: task_id.into(),
        }
    }

    /// Whether a retry of the same operation could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::LlmTransient(_) | Self::SchemaViolation { .. } | Self::Tool(_)
        )
    }
}
