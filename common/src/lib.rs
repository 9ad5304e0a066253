/*!
common/src/lib.rs

Shared configuration types and DB helper functions for paperdigest.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an override file
- Validation and API key resolution for the LLM section
- A helper to initialize the SQLite pool backing the summary cache
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// Chat-completion endpoint settings (`[llm]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// OpenAI-compatible base URL, e.g. "https://api.openai.com/v1".
    /// `/chat/completions` is appended by the client.
    pub base_url: String,
    /// Literal API key. Takes precedence over `api_key_env`.
    pub api_key: Option<String>,
    /// Name of the environment variable holding the API key
    pub api_key_env: Option<String>,
    pub model_name: String,
    pub temperature: Option<f32>,
}

impl LlmConfig {
    pub const DEFAULT_TEMPERATURE: f32 = 0.3;

    pub fn temperature(&self) -> f32 {
        self.temperature.unwrap_or(Self::DEFAULT_TEMPERATURE)
    }

    /// Resolve the API key, either inline or from the configured env var.
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_deref().filter(|k| !k.is_empty()) {
            return Ok(key.to_string());
        }
        let env_name = self
            .api_key_env
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("Missing api_key or api_key_env in [llm] config"))?;
        std::env::var(env_name)
            .with_context(|| format!("LLM API key env var '{}' not set", env_name))
    }
}

/// Document service (PDF parsing + Markdown rendering) settings (`[server]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub url: String,
    /// Seconds to wait for a PDF file to become available before giving up
    pub attachment_timeout_seconds: Option<u64>,
}

/// Summarization strategy settings (`[summary]`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SummaryConfig {
    /// Documents with this many chunks or more are not summarized
    pub max_chunk: Option<usize>,
    pub chunk_size: Option<usize>,
    pub chunk_overlap: Option<usize>,
    /// Number of papers processed at the same time in batch mode
    pub max_concurrent_papers: Option<usize>,
    /// Directory receiving the generated HTML notes
    pub notes_dir: Option<String>,
}

impl SummaryConfig {
    pub fn max_chunk(&self) -> usize {
        self.max_chunk.unwrap_or(10)
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size.unwrap_or(4000)
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap.unwrap_or(200)
    }

    pub fn max_concurrent_papers(&self) -> usize {
        self.max_concurrent_papers.unwrap_or(4).max(1)
    }

    pub fn notes_dir(&self) -> &str {
        self.notes_dir.as_deref().unwrap_or("notes")
    }
}

/// Location of the prompt files (`[prompts]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    pub dir: String,
}

/// Summary cache database (`[database]`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/summaries.db")
    pub path: String,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: LlmConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    pub prompts: Option<PromptConfig>,
    pub database: Option<DatabaseConfig>,
}

impl Config {
    /// Load configuration from a TOML file asynchronously.
    ///
    /// Example:
    ///   let cfg = Config::from_file("config.toml").await?;
    pub async fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = tokio::fs::read_to_string(path.as_ref())
            .await
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;
        let cfg: Config = toml::from_str(&data).context("Failed to parse TOML configuration")?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            let exists = tokio::fs::try_exists(path)
                .await
                .with_context(|| format!("Failed to check config file: {}", path.display()))?;
            if !exists {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        Ok(cfg)
    }

    /// Check the settings that would otherwise only fail at request time.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.llm.base_url)
            .with_context(|| format!("Invalid llm.base_url: {}", self.llm.base_url))?;
        url::Url::parse(&self.server.url)
            .with_context(|| format!("Invalid server.url: {}", self.server.url))?;

        if self.summary.max_chunk() == 0 {
            anyhow::bail!("summary.max_chunk must be at least 1");
        }
        if self.summary.chunk_overlap() >= self.summary.chunk_size() {
            anyhow::bail!(
                "summary.chunk_overlap ({}) must be smaller than summary.chunk_size ({})",
                self.summary.chunk_overlap(),
                self.summary.chunk_size()
            );
        }
        Ok(())
    }

    pub fn prompts_dir(&self) -> &str {
        self.prompts.as_ref().map(|p| p.dir.as_str()).unwrap_or("prompts")
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

/// Initialize an SQLite connection pool.
///
/// Creates the parent directory if necessary and the database file if missing.
/// Schema creation is left to the caller (see `paperdigest::cache`).
///
/// Example:
///   let pool = init_db_pool("data/summaries.db").await?;
pub async fn init_db_pool(path: &str) -> Result<SqlitePool> {
    if let Some(parent) = Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.with_context(|| {
                format!("Failed to create DB parent directory: {}", parent.display())
            })?;
        }
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))?
        .create_if_missing(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .with_context(|| format!("Failed to connect to sqlite database at path: {}", path))?;

    Ok(pool)
}
