//! Artifact-store boundary: durable object storage with public URLs.

use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, warn};

use crate::config::ArtifactConfig;
use crate::errors::ExportError;

/// Durable object storage. `Ok(None)` signals a declined (best-effort)
/// upload; both `Ok(None)` and `Err` are non-fatal to the pipeline.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn upload(
        &self,
        local_path: &Path,
        object_name: &str,
    ) -> Result<Option<String>, ExportError>;
}

/// Plain HTTP object store: PUT the bytes at `{endpoint}/{bucket}/{object}`
/// and hand back that URL.
pub struct HttpArtifactStore {
    http: reqwest::Client,
    endpoint: String,
    bucket: String,
}

impl HttpArtifactStore {
    pub fn new(config: &ArtifactConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            bucket: config.bucket.clone(),
        }
    }
}

#[async_trait]
impl ArtifactStore for HttpArtifactStore {
    async fn upload(
        &self,
        local_path: &Path,
        object_name: &str,
    ) -> Result<Option<String>, ExportError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| ExportError::Io {
                path: local_path.to_path_buf(),
                source,
            })?;

        let url = format!("{}/{}/{}", self.endpoint, self.bucket, object_name);
        let response = self
            .http
            .put(&url)
            .body(bytes)
            .send()
            .await
            .map_err(|e| ExportError::Upload(e.to_string()))?;

        if response.status().is_success() {
            debug!(%url, "artifact uploaded");
            Ok(Some(url))
        } else {
            warn!(%url, status = %response.status(), "artifact store declined upload");
            Ok(None)
        }
    }
}
