//! Ollama HTTP client: answer generation and question embeddings.
//!
//! Endpoints used:
//! - POST /api/generate - generate response (blocking or NDJSON stream)
//! - POST /api/embeddings - embed text

use crate::collaborators::{ChunkStream, Completion, GenerationChunk, Generator};
use crate::prompts::{build_prompt, SYSTEM_PROMPT};
use crate::task_stream::TaskStream;
use async_trait::async_trait;
use futures_util::StreamExt;
use rag_shared::{NdjsonDecoder, Passage, Question, RagError};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Connection timeout for every Ollama call
pub const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Timeout for embedding calls
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Chunks buffered between the HTTP reader and the consumer
const STREAM_CHANNEL_CAPACITY: usize = 64;

/// Error from Ollama operations
#[derive(Debug, Error)]
pub enum OllamaError {
    #[error("Ollama not available: {0}")]
    NotAvailable(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Request timed out")]
    Timeout,

    #[error("HTTP error: {0}")]
    HttpError(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Generate error: {0}")]
    GenerateError(String),
}

impl From<reqwest::Error> for OllamaError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            OllamaError::Timeout
        } else if e.is_connect() {
            OllamaError::NotAvailable(e.to_string())
        } else {
            OllamaError::HttpError(e.to_string())
        }
    }
}

/// Request for /api/generate
#[derive(Debug, Clone, Serialize)]
pub struct GenerateRequest {
    pub model: String,
    pub prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<GenerateOptions>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct GenerateOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

/// Response from /api/generate. Streaming sends one of these per line.
#[derive(Debug, Clone, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub eval_count: Option<u32>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    embedding: Vec<f32>,
}

fn http_client() -> Result<reqwest::Client, OllamaError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .build()
        .map_err(|e| OllamaError::HttpError(e.to_string()))
}

/// Fail on a non-success status, keeping the body for the message.
async fn check_status(
    resp: reqwest::Response,
    model: &str,
) -> Result<reqwest::Response, OllamaError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status.as_u16() == 404 {
        return Err(OllamaError::ModelNotFound(model.to_string()));
    }
    Err(OllamaError::GenerateError(format!(
        "Status {}: {}",
        status, body
    )))
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

// ============================================================================
// Generator
// ============================================================================

/// Language model collaborator backed by Ollama.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
    temperature: Option<f32>,
}

impl OllamaGenerator {
    pub fn new(base_url: &str, model: &str, timeout: Duration) -> Result<Self, OllamaError> {
        Ok(Self {
            http: http_client()?,
            base_url: trim_base_url(base_url),
            model: model.to_string(),
            timeout,
            temperature: None,
        })
    }

    pub fn with_temperature(mut self, temperature: Option<f32>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request(&self, question: &Question, contexts: &[Passage], stream: bool) -> GenerateRequest {
        GenerateRequest {
            model: self.model.clone(),
            prompt: build_prompt(question, contexts),
            system: Some(SYSTEM_PROMPT.to_string()),
            stream,
            options: self.temperature.map(|t| GenerateOptions {
                temperature: Some(t),
            }),
        }
    }

    /// Blocking calls are bounded as a whole. Streaming calls bound the wait
    /// for headers here and each gap between body chunks in `pump_chunks`.
    async fn send(&self, request: &GenerateRequest) -> Result<reqwest::Response, OllamaError> {
        let url = format!("{}/api/generate", self.base_url);
        let builder = self.http.post(&url).json(request);
        let resp = if request.stream {
            tokio::time::timeout(self.timeout, builder.send())
                .await
                .map_err(|_| OllamaError::Timeout)??
        } else {
            builder.timeout(self.timeout).send().await?
        };
        check_status(resp, &self.model).await
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(
        &self,
        question: &Question,
        contexts: &[Passage],
    ) -> Result<Completion, RagError> {
        let request = self.request(question, contexts, false);
        let resp = self.send(&request).await.map_err(RagError::generation)?;
        let body: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| RagError::generation(OllamaError::ParseError(e.to_string())))?;

        if let Some(err) = body.error {
            return Err(RagError::generation(OllamaError::GenerateError(err)));
        }
        Ok(Completion {
            text: body.response,
            tokens: body.eval_count,
        })
    }

    async fn generate_stream(
        &self,
        question: &Question,
        contexts: &[Passage],
    ) -> Result<ChunkStream, RagError> {
        let request = self.request(question, contexts, true);
        let resp = self.send(&request).await.map_err(RagError::generation)?;
        debug!("Ollama stream opened for model {}", self.model);

        let idle = self.timeout;
        let stream = TaskStream::spawn(STREAM_CHANNEL_CAPACITY, move |tx| {
            pump_chunks(resp, tx, idle)
        });
        Ok(stream.boxed())
    }
}

type ChunkSender = mpsc::Sender<Result<GenerationChunk, RagError>>;

/// What one line of a streaming reply contributes.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamLine {
    pub chunks: Vec<GenerationChunk>,
    pub done: bool,
}

/// Decode one NDJSON line of a streaming /api/generate reply.
pub fn parse_stream_line(line: &str) -> Result<StreamLine, RagError> {
    let parsed: GenerateResponse = serde_json::from_str(line)
        .map_err(|e| RagError::generation(OllamaError::ParseError(e.to_string())))?;

    if let Some(err) = parsed.error {
        return Err(RagError::generation(OllamaError::GenerateError(err)));
    }

    let mut chunks = Vec::new();
    if !parsed.response.is_empty() {
        chunks.push(GenerationChunk::Text(parsed.response));
    }
    if parsed.done {
        if let Some(tokens) = parsed.eval_count {
            chunks.push(GenerationChunk::Usage { tokens });
        }
    }
    Ok(StreamLine {
        chunks,
        done: parsed.done,
    })
}

/// Read the response body and forward chunks until `done`, an error, the
/// receiver goes away, or the model goes quiet for longer than `idle`.
async fn pump_chunks(resp: reqwest::Response, tx: ChunkSender, idle: Duration) {
    let mut body = resp.bytes_stream();
    let mut decoder = NdjsonDecoder::new();

    loop {
        let bytes = match tokio::time::timeout(idle, body.next()).await {
            Ok(Some(Ok(bytes))) => bytes,
            Ok(Some(Err(e))) => {
                let _ = tx.send(Err(RagError::generation(OllamaError::from(e)))).await;
                return;
            }
            Ok(None) => break,
            Err(_) => {
                warn!("No output from Ollama for {}s", idle.as_secs_f64());
                let _ = tx
                    .send(Err(RagError::GenerationFailure(
                        "model stream timed out".to_string(),
                    )))
                    .await;
                return;
            }
        };
        for line in decoder.push(&bytes) {
            match forward_line(&line, &tx).await {
                Forwarded::More => {}
                Forwarded::Finished | Forwarded::Stop => return,
            }
        }
    }

    if let Some(line) = decoder.finish() {
        if forward_line(&line, &tx).await != Forwarded::More {
            return;
        }
    }

    warn!("Ollama stream ended without a done marker");
    let _ = tx
        .send(Err(RagError::GenerationFailure(
            "model stream ended before completion".to_string(),
        )))
        .await;
}

#[derive(Debug, PartialEq)]
enum Forwarded {
    More,
    Finished,
    Stop,
}

async fn forward_line(line: &str, tx: &ChunkSender) -> Forwarded {
    match parse_stream_line(line) {
        Ok(parsed) => {
            for chunk in parsed.chunks {
                if tx.send(Ok(chunk)).await.is_err() {
                    return Forwarded::Stop; // Receiver dropped
                }
            }
            if parsed.done {
                Forwarded::Finished
            } else {
                Forwarded::More
            }
        }
        Err(e) => {
            let _ = tx.send(Err(e)).await;
            Forwarded::Stop
        }
    }
}

// ============================================================================
// Embedder
// ============================================================================

/// Embedding model client used by the retriever.
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaEmbedder {
    pub fn new(base_url: &str, model: &str) -> Result<Self, OllamaError> {
        Ok(Self {
            http: http_client()?,
            base_url: trim_base_url(base_url),
            model: model.to_string(),
        })
    }

    pub async fn embed(&self, text: &str) -> Result<Vec<f32>, OllamaError> {
        let url = format!("{}/api/embeddings", self.base_url);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: text,
        };
        let resp = self
            .http
            .post(&url)
            .timeout(Duration::from_secs(EMBED_TIMEOUT_SECS))
            .json(&request)
            .send()
            .await?;
        let resp = check_status(resp, &self.model).await?;
        let body: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| OllamaError::ParseError(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(OllamaError::ParseError(format!(
                "empty embedding from model {}",
                self.model
            )));
        }
        Ok(body.embedding)
    }
}
