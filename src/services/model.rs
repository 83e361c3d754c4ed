//! Language-model client boundary.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use crate::config::ModelConfig;
use crate::errors::ModelError;

/// Synchronous (request/response) text generation service.
///
/// Returns the raw response text. With `expect_json` the request asks the
/// backend for a JSON object, but a syntactically invalid response is the
/// caller's concern; every documented fallback lives in the stage that
/// issued the call.
#[async_trait]
pub trait LanguageModelClient: Send + Sync {
    async fn call(
        &self,
        prompt: &str,
        context: Option<&str>,
        expect_json: bool,
    ) -> Result<String, ModelError>;
}

/// OpenAI-style chat-completions client.
pub struct HttpModelClient {
    http: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
}

impl HttpModelClient {
    pub fn new(config: &ModelConfig) -> anyhow::Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| {
            anyhow::anyhow!("Model API key not set. Export SCRIBE_API_KEY or DEEPSEEK_API_KEY.")
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LanguageModelClient for HttpModelClient {
    async fn call(
        &self,
        prompt: &str,
        context: Option<&str>,
        expect_json: bool,
    ) -> Result<String, ModelError> {
        let mut messages = Vec::new();
        if let Some(context) = context {
            messages.push(json!({"role": "system", "content": context}));
        }
        messages.push(json!({"role": "user", "content": prompt}));

        let mut body = json!({"model": self.model, "messages": messages});
        if expect_json {
            body["response_format"] = json!({"type": "json_object"});
        }

        debug!(
            model = %self.model,
            expect_json,
            prompt_chars = prompt.len(),
            "calling language model"
        );

        let response = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(ModelError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = response.json().await.map_err(ModelError::Transport)?;
        let content = value
            .pointer("/choices/0/message/content")
            .and_then(|v| v.as_str())
            .ok_or(ModelError::MissingContent)?;

        debug!(response_chars = content.len(), "language model responded");
        Ok(content.to_string())
    }
}
