//! Streaming event protocol.
//!
//! Each event is one JSON object on its own line:
//!
//! ```text
//! {"event":"retrieval_complete","data":{"retrieval_time":0.05}}
//! {"event":"token","data":{"token":"Paris"}}
//! {"event":"token","data":{"token":"","metrics":{...}}}
//! {"event":"metrics","data":{"total_processing_time":0.46}}
//! ```
//!
//! A stream ends with exactly one `metrics` or `error` event.

use crate::metrics::GenerationMetrics;
use serde::{Deserialize, Serialize};

/// Payload of a `token` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenData {
    pub token: String,
    /// Present only on the trailing chunk, once generation is exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metrics: Option<GenerationMetrics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum StreamEvent {
    RetrievalComplete { retrieval_time: f64 },
    Token(TokenData),
    Metrics { total_processing_time: f64 },
    Error { message: String },
}

impl StreamEvent {
    pub fn token(text: impl Into<String>) -> Self {
        StreamEvent::Token(TokenData {
            token: text.into(),
            metrics: None,
        })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Metrics { .. } | StreamEvent::Error { .. })
    }

    /// Serialize as one newline-terminated record.
    pub fn to_line(&self) -> String {
        // Plain strings and floats; a failure here still yields a valid record
        match serde_json::to_string(self) {
            Ok(json) => json + "\n",
            Err(e) => format!(
                "{{\"event\":\"error\",\"data\":{{\"message\":\"failed to encode event: {}\"}}}}\n",
                e.to_string().replace('"', "'")
            ),
        }
    }
}

/// How a stream finished, fed into [`terminal_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum StreamOutcome {
    Success { total_processing_time: f64 },
    Failure { message: String },
}

/// Translate a stream outcome into its terminal event.
pub fn terminal_event(outcome: StreamOutcome) -> StreamEvent {
    match outcome {
        StreamOutcome::Success {
            total_processing_time,
        } => StreamEvent::Metrics {
            total_processing_time,
        },
        StreamOutcome::Failure { message } => StreamEvent::Error { message },
    }
}
