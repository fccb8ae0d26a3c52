//! Configuration management for ragd.
//!
//! Loads settings from `$RAGD_CONFIG`, then /etc/ragd/config.toml, or uses
//! defaults. Environment variables override file values so a container can
//! be configured without a file.

use anyhow::Result;
use rag_shared::RagError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use tracing::{info, warn};

use crate::pipeline::PipelineSettings;

/// Config file path
pub const CONFIG_PATH: &str = "/etc/ragd/config.toml";

/// Env var naming an alternative config file
pub const CONFIG_ENV: &str = "RAGD_CONFIG";

pub const ENV_LLM_MODEL: &str = "OLLAMA_LLM_MODEL";
pub const ENV_LLM_BASE_URL: &str = "OLLAMA_LLM_BASE_URL";
pub const ENV_EMBEDDING_MODEL: &str = "OLLAMA_EMBEDDING_MODEL";
pub const ENV_EMBEDDING_BASE_URL: &str = "OLLAMA_EMBEDDING_BASE_URL";
pub const ENV_CHROMA_DB_URL: &str = "CHROMA_DB_URL";
pub const ENV_TOP_K: &str = "TOP_K_RESULTS";
pub const ENV_BIND: &str = "RAGD_BIND";

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Prefix for the versioned API routes
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,

    #[serde(default = "default_project_name")]
    pub project_name: String,
}

fn default_bind() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

fn default_project_name() -> String {
    "RAG API".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_prefix: default_api_prefix(),
            project_name: default_project_name(),
        }
    }
}

/// Language model (Ollama) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    /// Whole-request timeout for blocking generation calls; for streams,
    /// the longest wait for headers or between two chunks
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub temperature: Option<f32>,
}

fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            base_url: None,
            timeout_secs: default_llm_timeout(),
            temperature: None,
        }
    }
}

/// Embedding model (Ollama) configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    #[serde(default)]
    pub model: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,
}

/// Vector store (Chroma) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorStoreConfig {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default = "default_collection")]
    pub collection: String,

    #[serde(default = "default_vector_timeout")]
    pub timeout_secs: u64,
}

fn default_collection() -> String {
    "document_collection".to_string()
}

fn default_vector_timeout() -> u64 {
    30
}

impl Default for VectorStoreConfig {
    fn default() -> Self {
        Self {
            url: None,
            collection: default_collection(),
            timeout_secs: default_vector_timeout(),
        }
    }
}

/// Answer pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Passages retrieved per question
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Batch answers measure the real first token by streaming internally
    #[serde(default)]
    pub observe_first_token: bool,
}

fn default_top_k() -> usize {
    3
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            observe_first_token: false,
        }
    }
}

/// Full daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub vector_store: VectorStoreConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

impl Config {
    /// Load config from file (or defaults), then apply environment overrides
    pub fn load() -> Self {
        let path = std::env::var(CONFIG_ENV).unwrap_or_else(|_| CONFIG_PATH.to_string());
        let mut config = Self::load_from_path(&path).unwrap_or_else(|e| {
            warn!("Config not loaded from {}, using defaults: {}", path, e);
            Config::default()
        });
        config.apply_env(|key| std::env::var(key).ok());
        config
    }

    /// Load config from specific path
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Override values from the environment. `lookup` is injectable for tests.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty(ENV_LLM_MODEL) {
            self.llm.model = Some(v);
        }
        if let Some(v) = non_empty(ENV_LLM_BASE_URL) {
            self.llm.base_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_EMBEDDING_MODEL) {
            self.embedding.model = Some(v);
        }
        if let Some(v) = non_empty(ENV_EMBEDDING_BASE_URL) {
            self.embedding.base_url = Some(v);
        }
        if let Some(v) = non_empty(ENV_CHROMA_DB_URL) {
            self.vector_store.url = Some(v);
        }
        if let Some(v) = non_empty(ENV_BIND) {
            self.server.bind = v;
        }
        if let Some(v) = non_empty(ENV_TOP_K) {
            match v.trim().parse::<usize>() {
                Ok(k) => self.pipeline.top_k = k,
                Err(_) => warn!("Ignoring non-numeric {}={}", ENV_TOP_K, v),
            }
        }
    }

    /// Names of required settings that are absent, by their env var name
    pub fn missing_settings(&self) -> Vec<String> {
        let required = [
            (ENV_LLM_MODEL, &self.llm.model),
            (ENV_LLM_BASE_URL, &self.llm.base_url),
            (ENV_EMBEDDING_MODEL, &self.embedding.model),
            (ENV_EMBEDDING_BASE_URL, &self.embedding.base_url),
            (ENV_CHROMA_DB_URL, &self.vector_store.url),
        ];
        required
            .iter()
            .filter(|(_, value)| value.as_deref().map_or(true, |v| v.trim().is_empty()))
            .map(|(name, _)| name.to_string())
            .collect()
    }

    /// Check everything collaborator construction needs
    pub fn validate(&self) -> Result<(), RagError> {
        let mut problems = self.missing_settings();
        if self.pipeline.top_k == 0 {
            problems.push(format!("{} (must be a positive integer)", ENV_TOP_K));
        }
        if problems.is_empty() {
            Ok(())
        } else {
            Err(RagError::ConfigurationFailure(problems))
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            top_k: self.pipeline.top_k,
            observe_first_token: self.pipeline.observe_first_token,
        }
    }
}
