//! Error types for the estate RAG tool.
//!
//! One enum covers every failure category: the pipeline's own taxonomy
//! (parse, extraction, embedding, empty store, not ready, completion) and the
//! ambient ones (configuration, I/O, serialization, prompt rendering).

use thiserror::Error;

/// Unified error type for the estate RAG tool.
///
/// All fallible functions return `Result<T, AppError>`.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A CSV row could not be turned into a property record
    #[error("Parse error at row {row}: {message}")]
    Parse { row: usize, message: String },

    /// The guideline document could not be read at all
    #[error("Extraction error: {0}")]
    Extraction(String),

    /// Embedding call failed after all retries
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Search against a store with no items
    #[error("Vector store is empty")]
    EmptyStore,

    /// Query issued before the knowledge base finished building
    #[error("Knowledge base is not ready (state: {state})")]
    NotReady { state: String },

    /// Chat completion failed after all retries
    #[error("Completion error: {0}")]
    Completion(String),

    /// A single provider request failed (before retry accounting)
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base and retrieval errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl AppError {
    /// Build a row-level parse error.
    pub fn parse(row: usize, message: impl Into<String>) -> Self {
        AppError::Parse {
            row,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_message() {
        let err = AppError::parse(4, "missing price");
        assert_eq!(err.to_string(), "Parse error at row 4: missing price");
    }

    #[test]
    fn test_not_ready_message() {
        let err = AppError::NotReady {
            state: "empty".to_string(),
        };
        assert!(err.to_string().contains("empty"));
    }
}
