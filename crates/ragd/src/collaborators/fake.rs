//! Fake collaborators for deterministic testing.
//!
//! No network calls. Delays use `tokio::time::sleep`, so tests running with
//! paused time observe exact durations.
//!
//! ## Example
//!
//! ```rust,ignore
//! let generator = FakeGeneratorBuilder::new()
//!     .fragments(&["Paris", " is", " the", " capital"])
//!     .step(FakeStep::Fail("connection reset".into()))
//!     .build();
//! ```

use super::{ChunkStream, Completion, GenerationChunk, Generator, Retriever};
use async_trait::async_trait;
use futures_util::StreamExt;
use rag_shared::{Passage, Question, RagError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fake Retriever
// ============================================================================

pub struct FakeRetriever {
    passages: Vec<Passage>,
    delay: Duration,
    failure: Option<String>,
    calls: Arc<AtomicUsize>,
}

impl FakeRetriever {
    pub fn new(passages: Vec<Passage>) -> Self {
        Self {
            passages,
            delay: Duration::ZERO,
            failure: None,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Retriever returning `count` numbered passages.
    pub fn with_passages(count: usize) -> Self {
        Self::new(
            (1..=count)
                .map(|i| Passage::new(format!("passage {}", i)))
                .collect(),
        )
    }

    /// Retriever whose every call fails with `RetrievalFailure`.
    pub fn failing(message: &str) -> Self {
        let mut fake = Self::new(Vec::new());
        fake.failure = Some(message.to_string());
        fake
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Retriever for FakeRetriever {
    async fn retrieve(&self, _question: &Question) -> Result<Vec<Passage>, RagError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &self.failure {
            Some(message) => Err(RagError::RetrievalFailure(message.clone())),
            None => Ok(self.passages.clone()),
        }
    }
}

// ============================================================================
// Fake Generator
// ============================================================================

/// One scripted step of a fake incremental generation.
#[derive(Debug, Clone)]
pub enum FakeStep {
    Text(String),
    Usage(u32),
    Wait(Duration),
    Fail(String),
}

pub struct FakeGenerator {
    completion: Result<Completion, RagError>,
    generate_delay: Duration,
    steps: Vec<FakeStep>,
    open_failure: Option<String>,
    generate_calls: Arc<AtomicUsize>,
    stream_calls: Arc<AtomicUsize>,
    fragments_emitted: Arc<AtomicUsize>,
    streams_released: Arc<AtomicUsize>,
}

impl FakeGenerator {
    /// Times `generate` was called
    pub fn generate_calls(&self) -> usize {
        self.generate_calls.load(Ordering::SeqCst)
    }

    /// Times `generate_stream` was called
    pub fn stream_calls(&self) -> usize {
        self.stream_calls.load(Ordering::SeqCst)
    }

    /// Text fragments actually produced across all streams
    pub fn fragments_emitted(&self) -> usize {
        self.fragments_emitted.load(Ordering::SeqCst)
    }

    /// Streams whose state has been dropped, by exhaustion or by the consumer
    pub fn streams_released(&self) -> usize {
        self.streams_released.load(Ordering::SeqCst)
    }
}

/// Counts a stream as released when its state is dropped.
struct ReleaseGuard(Arc<AtomicUsize>);

impl Drop for ReleaseGuard {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct FakeStreamState {
    steps: VecDeque<FakeStep>,
    emitted: Arc<AtomicUsize>,
    _guard: ReleaseGuard,
}

#[async_trait]
impl Generator for FakeGenerator {
    async fn generate(
        &self,
        _question: &Question,
        _contexts: &[Passage],
    ) -> Result<Completion, RagError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if !self.generate_delay.is_zero() {
            tokio::time::sleep(self.generate_delay).await;
        }
        self.completion.clone()
    }

    async fn generate_stream(
        &self,
        _question: &Question,
        _contexts: &[Passage],
    ) -> Result<ChunkStream, RagError> {
        self.stream_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.open_failure {
            return Err(RagError::GenerationFailure(message.clone()));
        }

        let state = FakeStreamState {
            steps: self.steps.iter().cloned().collect(),
            emitted: self.fragments_emitted.clone(),
            _guard: ReleaseGuard(self.streams_released.clone()),
        };

        let stream = futures_util::stream::unfold(state, |mut state| async move {
            loop {
                match state.steps.pop_front()? {
                    FakeStep::Wait(delay) => tokio::time::sleep(delay).await,
                    FakeStep::Text(text) => {
                        state.emitted.fetch_add(1, Ordering::SeqCst);
                        return Some((Ok(GenerationChunk::Text(text)), state));
                    }
                    FakeStep::Usage(tokens) => {
                        return Some((Ok(GenerationChunk::Usage { tokens }), state));
                    }
                    FakeStep::Fail(message) => {
                        state.steps.clear();
                        return Some((Err(RagError::GenerationFailure(message)), state));
                    }
                }
            }
        });

        Ok(stream.boxed())
    }
}

pub struct FakeGeneratorBuilder {
    completion: Result<Completion, RagError>,
    generate_delay: Duration,
    steps: Vec<FakeStep>,
    open_failure: Option<String>,
}

impl FakeGeneratorBuilder {
    pub fn new() -> Self {
        Self {
            completion: Ok(Completion {
                text: String::new(),
                tokens: None,
            }),
            generate_delay: Duration::ZERO,
            steps: Vec::new(),
            open_failure: None,
        }
    }

    /// Result of the blocking `generate` call
    pub fn completion(mut self, text: &str, tokens: Option<u32>) -> Self {
        self.completion = Ok(Completion {
            text: text.to_string(),
            tokens,
        });
        self
    }

    /// Make the blocking `generate` call fail
    pub fn generate_failure(mut self, message: &str) -> Self {
        self.completion = Err(RagError::GenerationFailure(message.to_string()));
        self
    }

    pub fn generate_delay(mut self, delay: Duration) -> Self {
        self.generate_delay = delay;
        self
    }

    /// Append text fragments to the stream script
    pub fn fragments(mut self, fragments: &[&str]) -> Self {
        self.steps
            .extend(fragments.iter().map(|f| FakeStep::Text(f.to_string())));
        self
    }

    pub fn step(mut self, step: FakeStep) -> Self {
        self.steps.push(step);
        self
    }

    /// Make `generate_stream` fail before returning a stream
    pub fn stream_open_failure(mut self, message: &str) -> Self {
        self.open_failure = Some(message.to_string());
        self
    }

    pub fn build(self) -> FakeGenerator {
        FakeGenerator {
            completion: self.completion,
            generate_delay: self.generate_delay,
            steps: self.steps,
            open_failure: self.open_failure,
            generate_calls: Arc::new(AtomicUsize::new(0)),
            stream_calls: Arc::new(AtomicUsize::new(0)),
            fragments_emitted: Arc::new(AtomicUsize::new(0)),
            streams_released: Arc::new(AtomicUsize::new(0)),
        }
    }
}

impl Default for FakeGeneratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question() -> Question {
        Question::new("What is the capital of France?").unwrap()
    }

    #[tokio::test]
    async fn test_fake_stream_follows_script() {
        let generator = FakeGeneratorBuilder::new()
            .fragments(&["a", "b"])
            .step(FakeStep::Usage(2))
            .build();

        let chunks: Vec<_> = generator
            .generate_stream(&question(), &[])
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(
            chunks,
            vec![
                Ok(GenerationChunk::Text("a".into())),
                Ok(GenerationChunk::Text("b".into())),
                Ok(GenerationChunk::Usage { tokens: 2 }),
            ]
        );
        assert_eq!(generator.fragments_emitted(), 2);
        assert_eq!(generator.streams_released(), 1);
    }

    #[tokio::test]
    async fn test_fake_stream_ends_after_failure() {
        let generator = FakeGeneratorBuilder::new()
            .fragments(&["a"])
            .step(FakeStep::Fail("boom".into()))
            .fragments(&["never"])
            .build();

        let chunks: Vec<_> = generator
            .generate_stream(&question(), &[])
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 2);
        assert!(matches!(chunks[1], Err(RagError::GenerationFailure(_))));
        assert_eq!(generator.fragments_emitted(), 1);
    }

    #[tokio::test]
    async fn test_fake_retriever_counts_calls() {
        let retriever = FakeRetriever::with_passages(3);
        let passages = retriever.retrieve(&question()).await.unwrap();
        assert_eq!(passages.len(), 3);
        assert_eq!(retriever.call_count(), 1);

        let failing = FakeRetriever::failing("index offline");
        assert_eq!(
            failing.retrieve(&question()).await,
            Err(RagError::RetrievalFailure("index offline".into()))
        );
    }
}
