//! Chroma vector store retriever.
//!
//! Embeds the question with Ollama, then runs a nearest-neighbour query
//! against one collection over Chroma's v1 HTTP API.

use crate::collaborators::Retriever;
use crate::ollama::OllamaEmbedder;
use async_trait::async_trait;
use rag_shared::{Passage, Question, RagError};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const CHROMA_DEFAULT_HOST: &str = "localhost";
pub const CHROMA_DEFAULT_PORT: u16 = 4555;

/// Normalize a configured Chroma address into `scheme://host:port`.
///
/// Accepts bare `host`, `host:port`, or a full URL. Missing scheme becomes
/// `http`, missing host `localhost`, missing port 4555. An address that does
/// not parse at all falls back to `http://localhost:4555`.
pub fn normalize_chroma_url(raw: &str) -> String {
    let raw = raw.trim();
    let with_scheme = if raw.starts_with("http://") || raw.starts_with("https://") {
        raw.to_string()
    } else {
        format!("http://{}", raw)
    };
    // `http://:4000` has an empty host, which the URL parser rejects
    let with_scheme = with_scheme.replacen("://:", &format!("://{}:", CHROMA_DEFAULT_HOST), 1);

    let url = match Url::parse(&with_scheme) {
        Ok(url) => url,
        Err(e) => {
            warn!("Unparsable Chroma address {:?} ({}), using defaults", raw, e);
            return format!("http://{}:{}", CHROMA_DEFAULT_HOST, CHROMA_DEFAULT_PORT);
        }
    };

    let host = url.host_str().unwrap_or(CHROMA_DEFAULT_HOST);
    let port = url
        .port()
        .or_else(|| explicit_default_port(&url, &with_scheme))
        .unwrap_or(CHROMA_DEFAULT_PORT);

    format!("{}://{}:{}", url.scheme(), host, port)
}

/// `Url` drops a port equal to the scheme default (`http://chroma:80`);
/// keep it when the address spelled it out.
fn explicit_default_port(url: &Url, raw: &str) -> Option<u16> {
    let port = url.port_or_known_default()?;
    let host = url.host_str()?;
    let spelled = format!("{}:{}", host, port);
    raw.to_ascii_lowercase().contains(&spelled).then_some(port)
}

#[derive(Debug, Deserialize)]
struct CollectionInfo {
    id: String,
}

#[derive(Debug, Serialize)]
struct QueryRequest<'a> {
    query_embeddings: Vec<Vec<f32>>,
    n_results: usize,
    include: &'a [&'a str],
}

fn first<T>(lists: Option<Vec<Vec<T>>>) -> Option<Vec<T>> {
    lists.and_then(|l| l.into_iter().next())
}

/// Response from /api/v1/collections/{id}/query. One inner list per query
/// embedding; we always send exactly one.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<serde_json::Map<String, serde_json::Value>>>>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
}

impl QueryResponse {
    /// Passages for the first query, in the store's ranking order.
    /// Entries without a document body are skipped.
    pub fn into_passages(self) -> Vec<Passage> {
        let documents = first(self.documents).unwrap_or_default();
        let mut metadatas = first(self.metadatas).unwrap_or_default().into_iter();
        let mut distances = first(self.distances).unwrap_or_default().into_iter();

        documents
            .into_iter()
            .filter_map(|doc| {
                let metadata = metadatas.next().flatten();
                let distance = distances.next();
                let mut passage = Passage::new(doc?);
                if let Some(metadata) = metadata {
                    passage.metadata = metadata;
                }
                passage.distance = distance;
                Some(passage)
            })
            .collect()
    }
}

/// Retriever over a Chroma collection.
pub struct ChromaRetriever {
    http: reqwest::Client,
    base_url: String,
    collection_id: String,
    embedder: OllamaEmbedder,
    top_k: usize,
}

impl ChromaRetriever {
    /// Heartbeat the store and resolve the collection. Any failure here is a
    /// `RetrievalFailure`, matching what a query against a dead store reports.
    pub async fn connect(
        raw_url: &str,
        collection: &str,
        embedder: OllamaEmbedder,
        top_k: usize,
        timeout: Duration,
    ) -> Result<Self, RagError> {
        let base_url = normalize_chroma_url(raw_url);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(RagError::retrieval)?;

        let connect_err = |e: reqwest::Error| {
            RagError::retrieval(format!("Error connecting to Chroma database: {}", e))
        };

        http.get(format!("{}/api/v1/heartbeat", base_url))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(connect_err)?;

        let info: CollectionInfo = http
            .get(format!("{}/api/v1/collections/{}", base_url, collection))
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(connect_err)?
            .json()
            .await
            .map_err(connect_err)?;

        info!(
            "Connected to Chroma at {} (collection {} = {})",
            base_url, collection, info.id
        );

        Ok(Self {
            http,
            base_url,
            collection_id: info.id,
            embedder,
            top_k,
        })
    }
}

#[async_trait]
impl Retriever for ChromaRetriever {
    async fn retrieve(&self, question: &Question) -> Result<Vec<Passage>, RagError> {
        let embedding = self
            .embedder
            .embed(question.as_str())
            .await
            .map_err(RagError::retrieval)?;

        let request = QueryRequest {
            query_embeddings: vec![embedding],
            n_results: self.top_k,
            include: &["documents", "metadatas", "distances"],
        };
        let url = format!(
            "{}/api/v1/collections/{}/query",
            self.base_url, self.collection_id
        );

        let response: QueryResponse = self
            .http
            .post(&url)
            .json(&request)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(RagError::retrieval)?
            .json()
            .await
            .map_err(RagError::retrieval)?;

        let passages = response.into_passages();
        debug!("Chroma returned {} passages", passages.len());
        Ok(passages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalize_bare_host_port() {
        assert_eq!(normalize_chroma_url("chroma:8000"), "http://chroma:8000");
    }

    #[test]
    fn test_normalize_defaults_port() {
        assert_eq!(normalize_chroma_url("chroma"), "http://chroma:4555");
        assert_eq!(normalize_chroma_url("http://chroma/"), "http://chroma:4555");
    }

    #[test]
    fn test_normalize_keeps_https_and_drops_path() {
        assert_eq!(
            normalize_chroma_url("https://vectors.internal:9443/api"),
            "https://vectors.internal:9443"
        );
    }

    #[test]
    fn test_normalize_empty_host() {
        assert_eq!(normalize_chroma_url(":4000"), "http://localhost:4000");
    }

    #[test]
    fn test_normalize_ipv6_literal() {
        assert_eq!(normalize_chroma_url("http://[::1]"), "http://[::1]:4555");
        assert_eq!(normalize_chroma_url("[::1]:8000"), "http://[::1]:8000");
    }

    #[test]
    fn test_normalize_keeps_spelled_default_port() {
        assert_eq!(normalize_chroma_url("http://chroma:80"), "http://chroma:80");
        assert_eq!(normalize_chroma_url("https://chroma:443/"), "https://chroma:443");
    }

    #[test]
    fn test_normalize_unparsable_falls_back_to_defaults() {
        assert_eq!(normalize_chroma_url("chroma:notaport"), "http://localhost:4555");
        assert_eq!(normalize_chroma_url("chroma:99999"), "http://localhost:4555");
    }

    #[test]
    fn test_query_response_to_passages() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["a", "b", "c"]],
            "documents": [["Paris is the capital.", null, "France is in Europe."]],
            "metadatas": [[{"source": "geo.txt"}, null, null]],
            "distances": [[0.1, 0.2, 0.3]]
        }))
        .unwrap();

        let passages = response.into_passages();
        assert_eq!(passages.len(), 2);
        assert_eq!(passages[0].content, "Paris is the capital.");
        assert_eq!(passages[0].source(), Some("geo.txt"));
        assert_eq!(passages[0].distance, Some(0.1));
        assert_eq!(passages[1].content, "France is in Europe.");
        assert_eq!(passages[1].distance, Some(0.3));
    }

    #[test]
    fn test_empty_query_response() {
        let response: QueryResponse = serde_json::from_value(json!({"ids": [[]]})).unwrap();
        assert!(response.into_passages().is_empty());
    }
}
