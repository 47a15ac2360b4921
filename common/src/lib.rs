/*!
common/src/lib.rs

Shared configuration types for newscurator.

This file provides:
- Config data structures (deserialized from TOML)
- Async loaders for a single config file or a defaults + override pair
- Defaults for the curation and ingestion sections
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default inclusive relevance threshold, on the `[0, 1]` score scale.
pub const DEFAULT_MIN_RELEVANCE_SCORE: f32 = 0.5;

/// Remote LLM endpoint config (used if `llm.adapter = "remote"`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteLlmConfig {
    pub api_url: Option<String>,
    pub api_key_env: Option<String>,
    pub model: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
}

/// LLM top-level config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmConfig {
    pub adapter: Option<String>, // "remote"
    // Fallback: single remote config
    pub remote: Option<RemoteLlmConfig>,
    // Task-specific config for relevance scoring
    pub scoring: Option<RemoteLlmConfig>,
}

impl LlmConfig {
    /// Endpoint used for relevance scoring: `llm.scoring`, falling back to `llm.remote`.
    pub fn scoring_endpoint(&self) -> Option<&RemoteLlmConfig> {
        self.scoring.as_ref().or(self.remote.as_ref())
    }
}

/// Curation defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurationConfig {
    #[serde(default = "default_min_relevance_score")]
    pub min_relevance_score: f32,
    /// Articles sent to the scorer per call. Absent means a single batch.
    pub max_articles_per_batch: Option<usize>,
    /// Overrides the built-in system prompt of the relevance scorer
    pub system_prompt: Option<String>,
    /// Article summaries are cut to this many characters in scoring prompts
    pub summary_max_chars: Option<usize>,
}

impl Default for CurationConfig {
    fn default() -> Self {
        Self {
            min_relevance_score: DEFAULT_MIN_RELEVANCE_SCORE,
            max_articles_per_batch: None,
            system_prompt: None,
            summary_max_chars: None,
        }
    }
}

fn default_min_relevance_score() -> f32 {
    DEFAULT_MIN_RELEVANCE_SCORE
}

/// Feed fetching configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestionConfig {
    pub fetch_timeout_seconds: Option<u64>,
    pub user_agent: Option<String>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub llm: Option<LlmConfig>,
    pub curation: Option<CurationConfig>,
    pub ingestion: Option<IngestionConfig>,
}

impl Config {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(data: &str) -> Result<Self> {
        toml::from_str(data).context("Failed to parse TOML configuration")
    }

    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        Self::from_toml_str(&data)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        if let Some(path) = default_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read default config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse default configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        if let Some(path) = override_path {
            if path.exists() {
                let data = tokio::fs::read_to_string(path).await
                    .with_context(|| format!("Failed to read override config: {}", path.display()))?;
                let val: toml::Value = toml::from_str(&data)
                    .context("Failed to parse override configuration")?;
                merge_toml(&mut config_value, val);
            }
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Curation section, or its defaults when absent
    pub fn curation(&self) -> CurationConfig {
        self.curation.clone().unwrap_or_default()
    }

    /// Ingestion section, or its defaults when absent
    pub fn ingestion(&self) -> IngestionConfig {
        self.ingestion.clone().unwrap_or_default()
    }
}

fn merge_toml(a: &mut toml::Value, b: toml::Value) {
    match (a, b) {
        (toml::Value::Table(a_map), toml::Value::Table(b_map)) => {
            for (k, v) in b_map {
                if let Some(a_val) = a_map.get_mut(&k) {
                    merge_toml(a_val, v);
                } else {
                    a_map.insert(k, v);
                }
            }
        }
        (a_val, b_val) => *a_val = b_val,
    }
}
