//! Knowledge-retrieval boundary: semantic search over the project corpus.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::config::SearchConfig;
use crate::errors::RetrievalError;

/// Semantic search returning free-text snippets. An empty result is normal;
/// only hard connectivity failures raise, and callers treat those as empty.
#[async_trait]
pub trait KnowledgeRetriever: Send + Sync {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>, RetrievalError>;
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchHit>,
}

#[derive(Deserialize)]
struct SearchHit {
    #[serde(default)]
    content: String,
}

/// HTTP client for the vector-search API.
pub struct HttpKnowledgeRetriever {
    http: reqwest::Client,
    api_base: String,
}

impl HttpKnowledgeRetriever {
    pub fn new(config: &SearchConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl KnowledgeRetriever for HttpKnowledgeRetriever {
    async fn search(&self, query: &str, top_k: usize) -> Result<Vec<String>, RetrievalError> {
        let response = self
            .http
            .get(format!("{}/search-drawings", self.api_base))
            .query(&[("query", query), ("top_k", &top_k.to_string())])
            .send()
            .await
            .map_err(RetrievalError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(RetrievalError::Api {
                status: status.as_u16(),
            });
        }

        let parsed: SearchResponse = response.json().await.map_err(RetrievalError::Transport)?;
        let snippets: Vec<String> = parsed
            .results
            .into_iter()
            .map(|hit| hit.content)
            .filter(|content| !content.is_empty())
            .collect();

        debug!(query, hits = snippets.len(), "knowledge retrieval");
        Ok(snippets)
    }
}
