//! Runtime configuration for scribe.
//!
//! All configuration is resolved once at the binary edge and passed into the
//! orchestrator and stage code as an immutable struct; stage logic never
//! reads the environment. Values come from `scribe.toml` in the project
//! directory (every field optional, serde defaults fill the rest), with the
//! model API key layered in from `SCRIBE_API_KEY` / `DEEPSEEK_API_KEY`.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Immutable runtime configuration, shared by the orchestrator and all
/// stage handlers.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScribeConfig {
    /// Directory holding one JSON record (and exported artifacts) per task.
    /// Relative paths are resolved against the project directory.
    pub tasks_dir: PathBuf,
    pub model: ModelConfig,
    pub search: SearchConfig,
    /// Object storage for exported artifacts. Optional: without it the
    /// pipeline still writes local artifacts, it just never uploads them.
    pub artifacts: Option<ArtifactConfig>,
    pub pipeline: PipelineConfig,
}

/// Language-model endpoint settings (OpenAI-style chat completions).
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub api_base: String,
    pub model: String,
    /// Usually injected from the environment rather than the config file.
    pub api_key: Option<String>,
}

/// Knowledge-retrieval endpoint settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub api_base: String,
    /// Number of snippets requested per query.
    pub top_k: usize,
}

/// Object-store endpoint for best-effort artifact uploads.
#[derive(Debug, Clone, Deserialize)]
pub struct ArtifactConfig {
    pub endpoint: String,
    #[serde(default = "default_bucket")]
    pub bucket: String,
}

/// Bounds and policies for the generation pipeline itself.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Upper bound on critique → retrieval → integrate iterations.
    pub max_refinement_cycles: u32,
    /// Bounded retry budget for the brief call before degrading to the raw
    /// model text.
    pub max_brief_attempts: u32,
    /// Linear backoff between brief retries.
    pub retry_backoff_ms: u64,
    /// Outlines longer than this are cut down via the seeded selection
    /// policy. Zero disables the cut.
    pub max_chapters: usize,
    /// Seed for the chapter selection policy, kept explicit so runs are
    /// reproducible.
    pub selection_seed: u64,
}

impl Default for ScribeConfig {
    fn default() -> Self {
        Self {
            tasks_dir: PathBuf::from("tasks"),
            model: ModelConfig::default(),
            search: SearchConfig::default(),
            artifacts: None,
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.deepseek.com/v1".to_string(),
            model: "deepseek-chat".to_string(),
            api_key: None,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_base: "http://localhost:3000".to_string(),
            top_k: 5,
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_refinement_cycles: 3,
            max_brief_attempts: 3,
            retry_backoff_ms: 2000,
            max_chapters: 12,
            selection_seed: 0,
        }
    }
}

fn default_bucket() -> String {
    "docs".to_string()
}

impl ScribeConfig {
    /// Load configuration for a project directory: `scribe.toml` if present,
    /// defaults otherwise, then the API key from the environment.
    pub fn load(project_dir: &Path) -> Result<Self> {
        let path = project_dir.join("scribe.toml");
        let mut config: ScribeConfig = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&raw)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            ScribeConfig::default()
        };

        if config.tasks_dir.is_relative() {
            config.tasks_dir = project_dir.join(&config.tasks_dir);
        }
        if config.model.api_key.is_none() {
            config.model.api_key = std::env::var("SCRIBE_API_KEY")
                .or_else(|_| std::env::var("DEEPSEEK_API_KEY"))
                .ok();
        }

        Ok(config)
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.tasks_dir).with_context(|| {
            format!(
                "Failed to create tasks directory: {}",
                self.tasks_dir.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_defaults() {
        let config = ScribeConfig::default();
        assert_eq!(config.pipeline.max_refinement_cycles, 3);
        assert_eq!(config.pipeline.max_brief_attempts, 3);
        assert_eq!(config.search.top_k, 5);
        assert_eq!(config.tasks_dir, PathBuf::from("tasks"));
        assert!(config.artifacts.is_none());
    }

    #[test]
    fn test_load_without_config_file_uses_defaults() {
        let dir = tempdir().unwrap();
        let config = ScribeConfig::load(dir.path()).unwrap();
        assert_eq!(config.tasks_dir, dir.path().join("tasks"));
        assert_eq!(config.model.model, "deepseek-chat");
    }

    #[test]
    fn test_load_partial_toml_overrides() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join("scribe.toml"),
            r#"
tasks_dir = "jobs"

[search]
api_base = "http://retriever:3000"
top_k = 8

[pipeline]
max_refinement_cycles = 1

[artifacts]
endpoint = "http://minio:9000"
"#,
        )
        .unwrap();

        let config = ScribeConfig::load(dir.path()).unwrap();
        assert_eq!(config.tasks_dir, dir.path().join("jobs"));
        assert_eq!(config.search.api_base, "http://retriever:3000");
        assert_eq!(config.search.top_k, 8);
        assert_eq!(config.pipeline.max_refinement_cycles, 1);
        // Unset fields keep defaults
        assert_eq!(config.pipeline.max_brief_attempts, 3);
        let artifacts = config.artifacts.expect("artifacts section");
        assert_eq!(artifacts.bucket, "docs");
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let mut config = ScribeConfig::default();
        config.tasks_dir = dir.path().join("nested/tasks");
        config.ensure_directories().unwrap();
        assert!(config.tasks_dir.exists());
    }
}
