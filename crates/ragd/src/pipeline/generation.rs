//! Generation stage: batch and incremental variants over one `Generator`.
//!
//! The stage owns all generation timing. In the incremental variant the
//! first-token and completion instants are only known once the collaborator
//! stream is exhausted, so the complete `GenerationMetrics` travel on one
//! trailing chunk with empty text.

use crate::collaborators::{ChunkStream, GenerationChunk, Generator};
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use rag_shared::{GenerationMetrics, Question, RagError, RetrievedContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// A completed answer with its generation measurements.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedAnswer {
    pub answer: String,
    pub metrics: GenerationMetrics,
}

/// One item of an incremental generation.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenChunk {
    pub text: String,
    /// Set only on the trailing chunk
    pub metrics: Option<GenerationMetrics>,
}

/// Lazy, finite, non-restartable. Ends right after an `Err` item.
pub type TokenStream = BoxStream<'static, Result<TokenChunk, RagError>>;

pub struct GenerationStage {
    generator: Arc<dyn Generator>,
    observe_first_token: bool,
}

impl GenerationStage {
    pub fn new(generator: Arc<dyn Generator>, observe_first_token: bool) -> Self {
        Self {
            generator,
            observe_first_token,
        }
    }

    /// Batch variant.
    ///
    /// A blocking collaborator call cannot observe its first token, so
    /// `time_to_first_token` equals `total_generation_time` unless
    /// `observe_first_token` routes the call through the incremental variant.
    pub async fn generate(
        &self,
        question: &Question,
        contexts: &RetrievedContext,
    ) -> Result<GeneratedAnswer, RagError> {
        if self.observe_first_token {
            return self.generate_observed(question, contexts).await;
        }

        let start = Instant::now();
        let completion = self.generator.generate(question, contexts.passages()).await?;
        let elapsed = start.elapsed();

        let tokens = completion
            .tokens
            .unwrap_or_else(|| count_words(&completion.text));
        let metrics = GenerationMetrics::new(elapsed, elapsed, tokens);
        debug!(
            "Generated {} tokens in {:.3}s",
            metrics.tokens, metrics.total_generation_time
        );

        Ok(GeneratedAnswer {
            answer: completion.text,
            metrics,
        })
    }

    async fn generate_observed(
        &self,
        question: &Question,
        contexts: &RetrievedContext,
    ) -> Result<GeneratedAnswer, RagError> {
        let mut tokens = self.generate_stream(question, contexts).await?;
        let mut answer = String::new();
        let mut metrics = None;

        while let Some(chunk) = tokens.next().await {
            let chunk = chunk?;
            answer.push_str(&chunk.text);
            if chunk.metrics.is_some() {
                metrics = chunk.metrics;
            }
        }

        let metrics = metrics.ok_or_else(|| {
            RagError::GenerationFailure("generation ended without metrics".to_string())
        })?;
        Ok(GeneratedAnswer { answer, metrics })
    }

    /// Incremental variant.
    ///
    /// The clock starts before the collaborator call, so connection setup
    /// counts toward time-to-first-token. An eager collaborator failure is
    /// returned here; later failures arrive as the stream's last item.
    pub async fn generate_stream(
        &self,
        question: &Question,
        contexts: &RetrievedContext,
    ) -> Result<TokenStream, RagError> {
        let start = Instant::now();
        let chunks = self
            .generator
            .generate_stream(question, contexts.passages())
            .await?;

        let clock = TokenClock {
            chunks: Some(chunks),
            start,
            first_token: None,
            fragments: 0,
            reported_tokens: None,
        };
        Ok(futures_util::stream::unfold(clock, next_token).boxed())
    }
}

/// Timing state threaded through the token stream.
struct TokenClock {
    /// `None` once exhausted or failed
    chunks: Option<ChunkStream>,
    start: Instant,
    first_token: Option<Duration>,
    fragments: u32,
    reported_tokens: Option<u32>,
}

impl TokenClock {
    fn finish(&self, total: Duration) -> GenerationMetrics {
        let tokens = self.reported_tokens.unwrap_or(self.fragments);
        GenerationMetrics::new(self.first_token.unwrap_or(total), total, tokens)
    }
}

async fn next_token(
    mut clock: TokenClock,
) -> Option<(Result<TokenChunk, RagError>, TokenClock)> {
    let mut chunks = clock.chunks.take()?;
    loop {
        match chunks.next().await {
            Some(Ok(GenerationChunk::Text(text))) => {
                if text.is_empty() {
                    continue;
                }
                if clock.first_token.is_none() {
                    clock.first_token = Some(clock.start.elapsed());
                }
                clock.fragments += 1;
                clock.chunks = Some(chunks);
                return Some((Ok(TokenChunk { text, metrics: None }), clock));
            }
            Some(Ok(GenerationChunk::Usage { tokens })) => {
                clock.reported_tokens = Some(tokens);
            }
            Some(Err(e)) => {
                return Some((Err(e), clock));
            }
            None => {
                let metrics = clock.finish(clock.start.elapsed());
                debug!(
                    "Stream exhausted: {} tokens in {:.3}s",
                    metrics.tokens, metrics.total_generation_time
                );
                let trailing = TokenChunk {
                    text: String::new(),
                    metrics: Some(metrics),
                };
                return Some((Ok(trailing), clock));
            }
        }
    }
}

/// Fallback token count when the model does not report one.
fn count_words(text: &str) -> u32 {
    text.split_whitespace().count() as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FakeGeneratorBuilder, FakeStep};
    use approx::assert_relative_eq;
    use rag_shared::Passage;

    fn question() -> Question {
        Question::new("What is the capital of France?").unwrap()
    }

    fn contexts() -> RetrievedContext {
        RetrievedContext::bounded(vec![Passage::new("Paris is the capital of France.")], 3)
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_first_token_equals_total() {
        let generator = FakeGeneratorBuilder::new()
            .completion("Paris is the capital of France.", Some(7))
            .generate_delay(Duration::from_millis(400))
            .build();
        let stage = GenerationStage::new(Arc::new(generator), false);

        let generated = stage.generate(&question(), &contexts()).await.unwrap();
        assert_eq!(generated.answer, "Paris is the capital of France.");
        assert_eq!(generated.metrics.tokens, 7);
        assert_relative_eq!(generated.metrics.total_generation_time, 0.4, epsilon = 1e-9);
        assert_eq!(
            generated.metrics.time_to_first_token,
            generated.metrics.total_generation_time
        );
        assert_relative_eq!(generated.metrics.tokens_per_second, 17.5, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_batch_counts_words_without_usage() {
        let generator = FakeGeneratorBuilder::new()
            .completion("Paris is the capital of France.", None)
            .build();
        let stage = GenerationStage::new(Arc::new(generator), false);
        let generated = stage.generate(&question(), &contexts()).await.unwrap();
        assert_eq!(generated.metrics.tokens, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stream_measures_first_token_and_total() {
        let generator = FakeGeneratorBuilder::new()
            .step(FakeStep::Wait(Duration::from_millis(100)))
            .fragments(&["Paris"])
            .step(FakeStep::Wait(Duration::from_millis(300)))
            .fragments(&[" is", ""])
            .build();
        let stage = GenerationStage::new(Arc::new(generator), false);

        let chunks: Vec<TokenChunk> = stage
            .generate_stream(&question(), &contexts())
            .await
            .unwrap()
            .map(|c| c.unwrap())
            .collect()
            .await;

        // Empty fragments are not forwarded
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].text, "Paris");
        assert!(chunks[0].metrics.is_none());

        let trailing = chunks.last().unwrap();
        assert_eq!(trailing.text, "");
        let metrics = trailing.metrics.unwrap();
        assert_relative_eq!(metrics.time_to_first_token, 0.1, epsilon = 1e-9);
        assert_relative_eq!(metrics.total_generation_time, 0.4, epsilon = 1e-9);
        assert_eq!(metrics.tokens, 2);
        assert_relative_eq!(metrics.tokens_per_second, 5.0, epsilon = 1e-9);
    }

    #[tokio::test]
    async fn test_stream_prefers_reported_usage() {
        let generator = FakeGeneratorBuilder::new()
            .fragments(&["Paris", " is"])
            .step(FakeStep::Usage(9))
            .build();
        let stage = GenerationStage::new(Arc::new(generator), false);
        let chunks: Vec<_> = stage
            .generate_stream(&question(), &contexts())
            .await
            .unwrap()
            .collect()
            .await;
        let trailing = chunks.last().unwrap().as_ref().unwrap();
        assert_eq!(trailing.metrics.unwrap().tokens, 9);
    }

    #[tokio::test]
    async fn test_stream_failure_is_last_item() {
        let generator = FakeGeneratorBuilder::new()
            .fragments(&["Paris", " is"])
            .step(FakeStep::Fail("connection reset".into()))
            .build();
        let stage = GenerationStage::new(Arc::new(generator), false);
        let chunks: Vec<_> = stage
            .generate_stream(&question(), &contexts())
            .await
            .unwrap()
            .collect()
            .await;

        assert_eq!(chunks.len(), 3);
        assert!(chunks[..2].iter().all(|c| c.is_ok()));
        assert_eq!(
            chunks[2],
            Err(RagError::GenerationFailure("connection reset".into()))
        );
    }

    #[tokio::test]
    async fn test_stream_eager_failure() {
        let generator = FakeGeneratorBuilder::new()
            .stream_open_failure("model not loaded")
            .build();
        let stage = GenerationStage::new(Arc::new(generator), false);
        let result = stage.generate_stream(&question(), &contexts()).await;
        assert!(matches!(result, Err(RagError::GenerationFailure(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_observed_batch_reports_true_first_token() {
        let generator = Arc::new(
            FakeGeneratorBuilder::new()
                .step(FakeStep::Wait(Duration::from_millis(50)))
                .fragments(&["Paris", " is", " the", " capital"])
                .step(FakeStep::Wait(Duration::from_millis(150)))
                .build(),
        );
        let stage = GenerationStage::new(generator.clone(), true);

        let generated = stage.generate(&question(), &contexts()).await.unwrap();
        assert_eq!(generated.answer, "Paris is the capital");
        assert_relative_eq!(generated.metrics.time_to_first_token, 0.05, epsilon = 1e-9);
        assert_relative_eq!(generated.metrics.total_generation_time, 0.2, epsilon = 1e-9);
        assert_eq!(generator.generate_calls(), 0);
        assert_eq!(generator.stream_calls(), 1);
    }

    #[tokio::test]
    async fn test_observed_batch_propagates_midstream_failure() {
        let generator = FakeGeneratorBuilder::new()
            .fragments(&["Paris"])
            .step(FakeStep::Fail("eof".into()))
            .build();
        let stage = GenerationStage::new(Arc::new(generator), true);
        let err = stage.generate(&question(), &contexts()).await.unwrap_err();
        assert_eq!(err, RagError::GenerationFailure("eof".into()));
    }
}
