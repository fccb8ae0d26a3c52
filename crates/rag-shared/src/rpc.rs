//! HTTP request and response bodies shared by ragd and ragctl.

use serde::{Deserialize, Serialize};

/// Media type of the answer stream. The body is NDJSON, one `StreamEvent`
/// per line, not SSE framing; the header value is kept because existing
/// clients key on it.
pub const STREAM_CONTENT_TYPE: &str = "text/event-stream";

/// Body of both answer endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionRequest {
    pub question: String,
}

/// Body returned with any non-2xx status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// `GET /` health check.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub message: String,
}
