//! Error types for the answer pipeline.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RagError {
    /// Vector store or embedding service unreachable or erroring.
    #[error("Retrieval failed: {0}")]
    RetrievalFailure(String),

    /// Language model unreachable or erroring, before or during a stream.
    #[error("Generation failed: {0}")]
    GenerationFailure(String),

    /// Required settings absent or invalid at collaborator construction.
    #[error("Missing required configuration: {}", .0.join(", "))]
    ConfigurationFailure(Vec<String>),

    #[error("Invalid question: {0}")]
    InvalidQuestion(String),
}

impl RagError {
    /// HTTP status the transport layer maps this error to.
    pub fn status_code(&self) -> u16 {
        match self {
            RagError::RetrievalFailure(_) => 503,
            RagError::GenerationFailure(_) => 503,
            RagError::ConfigurationFailure(_) => 500,
            RagError::InvalidQuestion(_) => 422,
        }
    }

    pub fn retrieval(err: impl std::fmt::Display) -> Self {
        RagError::RetrievalFailure(err.to_string())
    }

    pub fn generation(err: impl std::fmt::Display) -> Self {
        RagError::GenerationFailure(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_failure_lists_settings() {
        let err = RagError::ConfigurationFailure(vec![
            "OLLAMA_LLM_MODEL".to_string(),
            "CHROMA_DB_URL".to_string(),
        ]);
        assert_eq!(
            err.to_string(),
            "Missing required configuration: OLLAMA_LLM_MODEL, CHROMA_DB_URL"
        );
        assert_eq!(err.status_code(), 500);
    }

    #[test]
    fn test_collaborator_failures_are_unavailable() {
        assert_eq!(RagError::retrieval("connection refused").status_code(), 503);
        assert_eq!(RagError::generation("model crashed").status_code(), 503);
        assert_eq!(RagError::InvalidQuestion("empty".into()).status_code(), 422);
    }
}
