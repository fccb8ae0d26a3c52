//! HTTP client for communicating with ragd.

use anyhow::{anyhow, Result};
use futures_util::StreamExt;
use rag_shared::{
    AnswerResult, ErrorResponse, HealthResponse, NdjsonDecoder, QuestionRequest, StreamEvent,
    STREAM_CONTENT_TYPE,
};
use std::time::Duration;

/// Whole-request timeout for batch answers
const ANSWER_TIMEOUT_SECS: u64 = 300;

/// Client for communicating with ragd
pub struct RagClient {
    http: reqwest::Client,
    base_url: String,
    prefix: String,
}

impl RagClient {
    pub fn new(base_url: &str, prefix: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            prefix: prefix.trim_end_matches('/').to_string(),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.prefix, path)
    }

    fn unreachable(&self, e: reqwest::Error) -> anyhow::Error {
        anyhow!(
            "Cannot reach ragd at {}: {}\n\n\
             Is the server running? Start it with `ragd` or set --url.",
            self.base_url,
            e
        )
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .http
            .get(format!("{}/", self.base_url))
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Batch answer
    pub async fn ask(&self, question: &str) -> Result<AnswerResult> {
        let resp = self
            .http
            .post(self.api_url("/rag/answer"))
            .timeout(Duration::from_secs(ANSWER_TIMEOUT_SECS))
            .json(&QuestionRequest {
                question: question.to_string(),
            })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = check_status(resp).await?;
        Ok(resp.json().await?)
    }

    /// Streaming answer. `on_event` sees every event in order; returns the
    /// terminal one.
    pub async fn ask_stream(
        &self,
        question: &str,
        mut on_event: impl FnMut(&StreamEvent),
    ) -> Result<StreamEvent> {
        let resp = self
            .http
            .post(self.api_url("/rag/answer/stream"))
            .json(&QuestionRequest {
                question: question.to_string(),
            })
            .send()
            .await
            .map_err(|e| self.unreachable(e))?;
        let resp = check_status(resp).await?;
        check_stream_type(resp.headers().get(reqwest::header::CONTENT_TYPE))?;

        let mut body = resp.bytes_stream();
        let mut decoder = NdjsonDecoder::new();
        while let Some(chunk) = body.next().await {
            for line in decoder.push(&chunk?) {
                let event = parse_event(&line)?;
                on_event(&event);
                if event.is_terminal() {
                    return Ok(event);
                }
            }
        }
        if let Some(line) = decoder.finish() {
            let event = parse_event(&line)?;
            on_event(&event);
            if event.is_terminal() {
                return Ok(event);
            }
        }
        Err(anyhow!("Stream ended without a final event"))
    }
}

fn parse_event(line: &str) -> Result<StreamEvent> {
    serde_json::from_str(line).map_err(|e| anyhow!("Malformed event {:?}: {}", line, e))
}

/// The stream endpoint answers with NDJSON under `STREAM_CONTENT_TYPE`;
/// anything else is not a ragd event stream.
fn check_stream_type(value: Option<&reqwest::header::HeaderValue>) -> Result<()> {
    let media = value
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim);
    match media {
        Some(m) if m.eq_ignore_ascii_case(STREAM_CONTENT_TYPE) => Ok(()),
        other => Err(anyhow!(
            "Unexpected stream content type {:?}, expected {}",
            other.unwrap_or("none"),
            STREAM_CONTENT_TYPE
        )),
    }
}

/// Turn a non-2xx reply into an error carrying the server's `detail`.
async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body)
        .map(|e| e.detail)
        .unwrap_or(body);
    Err(anyhow!("Server returned {}: {}", status, detail))
}
