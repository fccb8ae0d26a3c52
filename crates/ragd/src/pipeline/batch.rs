use super::Pipeline;
use rag_shared::{AnswerResult, Question, RagError, TimingMetrics};
use tokio::time::Instant;
use tracing::{debug, info};

impl Pipeline {
    /// Batch orchestration: retrieve, generate, then one `AnswerResult`.
    ///
    /// Any stage failure aborts the request; no partial answer is returned.
    pub async fn answer(&self, question: &Question) -> Result<AnswerResult, RagError> {
        let started = Instant::now();

        debug!("Starting document retrieval");
        let (contexts, retrieval_time) = self.retrieval().retrieve(question).await?;
        debug!(
            "Document retrieval completed in {:.3}s",
            retrieval_time.as_secs_f64()
        );

        debug!("Starting answer generation");
        let generated = self.generation().generate(question, &contexts).await?;
        debug!(
            "Answer generation completed in {:.3}s",
            generated.metrics.total_generation_time
        );

        let metrics = TimingMetrics::assemble(retrieval_time, &generated.metrics, started.elapsed());
        info!("Question answered in {:.3}s", metrics.total_processing_time);

        Ok(AnswerResult {
            answer: generated.answer,
            metrics,
        })
    }
}
