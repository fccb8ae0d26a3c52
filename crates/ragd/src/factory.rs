//! Collaborator construction.
//!
//! The server never builds collaborators at startup. The first request asks
//! a `CollaboratorFactory` for a `Pipeline`; see `server::AppState::pipeline`.

use crate::chroma::ChromaRetriever;
use crate::collaborators::{Generator, Retriever};
use crate::config::{
    Config, ENV_CHROMA_DB_URL, ENV_EMBEDDING_BASE_URL, ENV_EMBEDDING_MODEL, ENV_LLM_BASE_URL,
    ENV_LLM_MODEL,
};
use crate::ollama::{OllamaEmbedder, OllamaGenerator};
use crate::pipeline::{Pipeline, PipelineSettings};
use async_trait::async_trait;
use rag_shared::RagError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[async_trait]
pub trait CollaboratorFactory: Send + Sync {
    async fn build(&self) -> Result<Pipeline, RagError>;
}

/// Production factory: Chroma for retrieval, Ollama for embeddings and generation.
pub struct OllamaChromaFactory {
    config: Config,
}

impl OllamaChromaFactory {
    pub fn new(config: Config) -> Self {
        Self { config }
    }
}

/// Value of a setting `validate` has already checked.
fn required(value: &Option<String>, name: &str) -> Result<String, RagError> {
    value
        .clone()
        .ok_or_else(|| RagError::ConfigurationFailure(vec![name.to_string()]))
}

#[async_trait]
impl CollaboratorFactory for OllamaChromaFactory {
    async fn build(&self) -> Result<Pipeline, RagError> {
        let config = &self.config;
        config.validate()?;

        let embedder = OllamaEmbedder::new(
            &required(&config.embedding.base_url, ENV_EMBEDDING_BASE_URL)?,
            &required(&config.embedding.model, ENV_EMBEDDING_MODEL)?,
        )
        .map_err(RagError::retrieval)?;

        let retriever = ChromaRetriever::connect(
            &required(&config.vector_store.url, ENV_CHROMA_DB_URL)?,
            &config.vector_store.collection,
            embedder,
            config.pipeline.top_k,
            Duration::from_secs(config.vector_store.timeout_secs),
        )
        .await?;

        let generator = OllamaGenerator::new(
            &required(&config.llm.base_url, ENV_LLM_BASE_URL)?,
            &required(&config.llm.model, ENV_LLM_MODEL)?,
            Duration::from_secs(config.llm.timeout_secs),
        )
        .map_err(RagError::generation)?
        .with_temperature(config.llm.temperature);

        info!(
            "Collaborators ready (model {}, top_k {})",
            generator.model(),
            config.pipeline.top_k
        );
        Ok(Pipeline::new(
            Arc::new(retriever),
            Arc::new(generator),
            config.pipeline_settings(),
        ))
    }
}

/// Factory over already-built collaborators. Counts how often it is asked.
pub struct StaticFactory {
    retriever: Arc<dyn Retriever>,
    generator: Arc<dyn Generator>,
    settings: PipelineSettings,
    builds: AtomicUsize,
}

impl StaticFactory {
    pub fn new(
        retriever: Arc<dyn Retriever>,
        generator: Arc<dyn Generator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever,
            generator,
            settings,
            builds: AtomicUsize::new(0),
        }
    }

    pub fn build_count(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CollaboratorFactory for StaticFactory {
    async fn build(&self) -> Result<Pipeline, RagError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        Ok(Pipeline::new(
            self.retriever.clone(),
            self.generator.clone(),
            self.settings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{FakeGeneratorBuilder, FakeRetriever};

    #[tokio::test]
    async fn test_missing_settings_fail_before_any_connection() {
        let factory = OllamaChromaFactory::new(Config::default());
        match factory.build().await {
            Err(RagError::ConfigurationFailure(missing)) => {
                assert!(missing.contains(&"OLLAMA_LLM_MODEL".to_string()));
                assert!(missing.contains(&"CHROMA_DB_URL".to_string()));
            }
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("build should fail without settings"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_store_is_retrieval_failure() {
        let mut config = Config::default();
        config.llm.model = Some("m".into());
        config.llm.base_url = Some("http://127.0.0.1:9".into());
        config.embedding.model = Some("e".into());
        config.embedding.base_url = Some("http://127.0.0.1:9".into());
        config.vector_store.url = Some("127.0.0.1:9".into());
        config.vector_store.timeout_secs = 2;

        let result = OllamaChromaFactory::new(config).build().await;
        assert!(matches!(result, Err(RagError::RetrievalFailure(_))));
    }

    #[tokio::test]
    async fn test_static_factory_counts_builds() {
        let factory = StaticFactory::new(
            Arc::new(FakeRetriever::with_passages(1)),
            Arc::new(FakeGeneratorBuilder::new().build()),
            PipelineSettings::default(),
        );
        assert!(factory.build().await.is_ok());
        assert_eq!(factory.build_count(), 1);
    }
}
