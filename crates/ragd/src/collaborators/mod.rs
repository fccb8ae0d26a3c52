//! Collaborator Trait Abstraction
//!
//! The pipeline depends on two external services only through these traits:
//! - `Retriever`: embedding model + vector index
//! - `Generator`: language model runtime
//!
//! Production code uses `ChromaRetriever` and `OllamaGenerator`.
//! Test code uses `FakeRetriever` and `FakeGenerator` with scripted responses.

pub mod fake;

use async_trait::async_trait;
use futures_util::stream::BoxStream;
use rag_shared::{Passage, Question, RagError};

pub use fake::{FakeGenerator, FakeGeneratorBuilder, FakeRetriever, FakeStep};

// ============================================================================
// Retriever
// ============================================================================

#[async_trait]
pub trait Retriever: Send + Sync {
    /// Passages relevant to the question, most relevant first.
    async fn retrieve(&self, question: &Question) -> Result<Vec<Passage>, RagError>;
}

// ============================================================================
// Generator
// ============================================================================

/// A finished, non-incremental generation.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    /// Token count reported by the model, when it reports one
    pub tokens: Option<u32>,
}

/// One unit produced by an incremental generation.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationChunk {
    /// A text fragment
    Text(String),
    /// Model-reported count of generated tokens
    Usage { tokens: u32 },
}

/// Lazy, finite sequence of chunks. Dropping it releases the underlying call.
pub type ChunkStream = BoxStream<'static, Result<GenerationChunk, RagError>>;

#[async_trait]
pub trait Generator: Send + Sync {
    /// Block until the full answer is produced.
    async fn generate(&self, question: &Question, contexts: &[Passage])
        -> Result<Completion, RagError>;

    /// Start an incremental generation. May fail eagerly or from inside the stream.
    async fn generate_stream(
        &self,
        question: &Question,
        contexts: &[Passage],
    ) -> Result<ChunkStream, RagError>;
}
