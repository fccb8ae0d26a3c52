use crate::collaborators::Retriever;
use rag_shared::{Question, RagError, RetrievedContext};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Single best-effort retriever call, timed. No retries, no caching.
pub struct RetrievalStage {
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl RetrievalStage {
    pub fn new(retriever: Arc<dyn Retriever>, top_k: usize) -> Self {
        Self { retriever, top_k }
    }

    /// Returns the bounded contexts and the wall time the call took.
    pub async fn retrieve(
        &self,
        question: &Question,
    ) -> Result<(RetrievedContext, Duration), RagError> {
        let start = Instant::now();
        let passages = self.retriever.retrieve(question).await?;
        let elapsed = start.elapsed();

        let contexts = RetrievedContext::bounded(passages, self.top_k);
        debug!(
            "Retrieved {} passages in {:.3}s",
            contexts.len(),
            elapsed.as_secs_f64()
        );
        Ok((contexts, elapsed))
    }
}
