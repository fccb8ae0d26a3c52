//! Shared types for the ragd daemon and the ragctl client.
//!
//! Everything that crosses the HTTP boundary lives here so both sides
//! serialize the same shapes.

pub mod error;
pub mod events;
pub mod metrics;
pub mod ndjson;
pub mod question;
pub mod rpc;

pub use error::RagError;
pub use events::{terminal_event, StreamEvent, StreamOutcome, TokenData};
pub use metrics::{tokens_per_second, AnswerResult, GenerationMetrics, TimingMetrics};
pub use ndjson::NdjsonDecoder;
pub use question::{Passage, Question, RetrievedContext};
pub use rpc::{ErrorResponse, HealthResponse, QuestionRequest, STREAM_CONTENT_TYPE};
