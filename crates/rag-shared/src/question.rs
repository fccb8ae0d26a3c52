//! Question and retrieved passage types.

use crate::error::RagError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A validated, immutable question. The only input to a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    /// Reject empty or whitespace-only text.
    pub fn new(text: impl Into<String>) -> Result<Self, RagError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(RagError::InvalidQuestion(
                "question must not be empty".to_string(),
            ));
        }
        Ok(Self(text))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First `max_chars` characters, for log lines.
    pub fn truncated(&self, max_chars: usize) -> String {
        if self.0.chars().count() <= max_chars {
            self.0.clone()
        } else {
            let head: String = self.0.chars().take(max_chars).collect();
            format!("{}...", head)
        }
    }
}

impl fmt::Display for Question {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One retrieved document passage. Opaque to the pipeline beyond being
/// generation input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
    /// Distance reported by the vector store (lower is closer)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f32>,
}

impl Passage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
            distance: None,
        }
    }

    /// Source label from metadata, if the index stored one.
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(|v| v.as_str())
    }
}

/// Ordered passages for one request, bounded by top-k.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetrievedContext {
    passages: Vec<Passage>,
}

impl RetrievedContext {
    /// Keep at most `top_k` passages, preserving retriever order.
    pub fn bounded(mut passages: Vec<Passage>, top_k: usize) -> Self {
        passages.truncate(top_k);
        Self { passages }
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }
}
