//! Answer Pipeline
//!
//! Retrieval → Generation, in two delivery modes:
//! - batch (`Pipeline::answer`): one `AnswerResult` once generation completes
//! - stream (`Pipeline::answer_stream`): `StreamEvent`s as they happen
//!
//! Invariants:
//! - Retrieval and generation run strictly in sequence, once per request
//! - No state survives a request; collaborators are shared read-only
//! - A stream always ends with exactly one `metrics` or `error` event

pub mod batch;
pub mod generation;
pub mod retrieval;
pub mod stream;

use crate::collaborators::{Generator, Retriever};
use std::sync::Arc;

pub use generation::{GeneratedAnswer, GenerationStage, TokenChunk, TokenStream};
pub use retrieval::RetrievalStage;
pub use stream::EventStream;

/// Knobs the pipeline reads from configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineSettings {
    /// Maximum passages handed to the generator
    pub top_k: usize,
    /// Drive batch generation incrementally to measure the real first token
    pub observe_first_token: bool,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            observe_first_token: false,
        }
    }
}

pub struct Pipeline {
    retrieval: RetrievalStage,
    generation: GenerationStage,
}

impl Pipeline {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retrieval: RetrievalStage::new(retriever, settings.top_k),
            generation: GenerationStage::new(generator, settings.observe_first_token),
        }
    }

    pub fn retrieval(&self) -> &RetrievalStage {
        &self.retrieval
    }

    pub fn generation(&self) -> &GenerationStage {
        &self.generation
    }
}
