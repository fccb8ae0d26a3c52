//! API routes for ragd
//!
//! - `GET /` health check
//! - `POST {prefix}/rag/answer` batch answer
//! - `POST {prefix}/rag/answer/stream` NDJSON event stream

use crate::server::AppState;
use axum::{
    body::Body,
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::StreamExt;
use rag_shared::{
    AnswerResult, ErrorResponse, HealthResponse, Question, QuestionRequest, RagError,
    STREAM_CONTENT_TYPE,
};
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

type AppStateArc = Arc<AppState>;

/// Characters of a question shown in logs
const LOG_QUESTION_CHARS: usize = 50;

/// A pipeline error on its way to the client as `{"detail": ...}`.
pub struct ApiError(pub RagError);

impl From<RagError> for ApiError {
    fn from(e: RagError) -> Self {
        ApiError(e)
    }
}

/// A body that is not a `QuestionRequest` gets the same `{"detail"}` shape
/// as every other client error.
impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError(RagError::InvalidQuestion(rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = ErrorResponse {
            detail: self.0.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

// ============================================================================
// Health Routes
// ============================================================================

pub fn health_routes() -> Router<AppStateArc> {
    Router::new().route("/", get(health_check))
}

async fn health_check(State(state): State<AppStateArc>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        message: format!("{} is running", state.config.server.project_name),
    })
}

// ============================================================================
// Answer Routes
// ============================================================================

pub fn answer_routes() -> Router<AppStateArc> {
    Router::new()
        .route("/rag/answer", post(answer_question))
        .route("/rag/answer/stream", post(answer_question_stream))
}

async fn answer_question(
    State(state): State<AppStateArc>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Json<AnswerResult>, ApiError> {
    let span = info_span!("answer", request_id = %Uuid::new_v4());
    async move {
        let Json(req) = payload?;
        let question = Question::new(req.question)?;
        info!("Processing question: {}", question.truncated(LOG_QUESTION_CHARS));

        let pipeline = state.pipeline().await?;
        match pipeline.answer(&question).await {
            Ok(result) => {
                info!(
                    "Answer ready in {:.3}s ({} tokens)",
                    result.metrics.total_processing_time, result.metrics.tokens
                );
                Ok(Json(result))
            }
            Err(e) => {
                error!("Error processing question: {}", e);
                Err(ApiError(e))
            }
        }
    }
    .instrument(span)
    .await
}

/// Failures before the first event (bad question, collaborator construction)
/// are returned as an error status. After that every failure is an `error`
/// event inside a 200 body.
async fn answer_question_stream(
    State(state): State<AppStateArc>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let span = info_span!("answer_stream", request_id = %Uuid::new_v4());
    async move {
        let Json(req) = payload?;
        let question = Question::new(req.question)?;
        info!(
            "Processing streaming question: {}",
            question.truncated(LOG_QUESTION_CHARS)
        );

        let pipeline = state.pipeline().await.map_err(|e| {
            error!("Collaborators unavailable: {}", e);
            ApiError(e)
        })?;

        // Created inside the request span, which the body carries along
        let lines = pipeline
            .answer_stream(question)
            .map(|event| Ok::<_, Infallible>(event.to_line()));

        Ok((
            [(header::CONTENT_TYPE, STREAM_CONTENT_TYPE)],
            Body::from_stream(lines),
        )
            .into_response())
    }
    .instrument(span)
    .await
}
