//! Structured-data boundary for the injection chapter.

use async_trait::async_trait;
use tracing::debug;

use crate::errors::RetrievalError;

/// Serves the pre-structured data blob that a
/// [`ChapterKind::StructuredDataInjection`](crate::task::ChapterKind) chapter
/// is rendered from. `Ok(None)` means no blob exists for the project.
#[async_trait]
pub trait StructuredDataSource: Send + Sync {
    async fn fetch(
        &self,
        project_name: &str,
    ) -> Result<Option<serde_json::Value>, RetrievalError>;
}

/// HTTP client fetching the blob by project name.
pub struct HttpStructuredDataSource {
    http: reqwest::Client,
    api_base: String,
}

impl HttpStructuredDataSource {
    pub fn new(api_base: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl StructuredDataSource for HttpStructuredDataSource {
    async fn fetch(
        &self,
        project_name: &str,
    ) -> Result<Option<serde_json::Value>, RetrievalError> {
        let response = self
            .http
            .get(format!("{}/structured-data", self.api_base))
            .query(&[("project", project_name)])
            .send()
            .await
            .map_err(RetrievalError::Transport)?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RetrievalError::Api {
                status: status.as_u16(),
            });
        }

        let blob: serde_json::Value = response.json().await.map_err(RetrievalError::Transport)?;
        debug!(project_name, "structured data blob fetched");
        Ok(Some(blob))
    }
}
