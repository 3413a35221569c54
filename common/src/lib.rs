/*!
common/src/lib.rs

Shared configuration types and DB helper functions for wikisum.

This file provides:
- Config data structures (deserialized from TOML)
- An async loader that merges a default file with an optional override
- Helpers to initialize and migrate an SQLite database
*/

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;

/// API keys shipped in sample env files. Treated the same as a missing key.
pub const PLACEHOLDER_API_KEYS: &[&str] = &["your-openai-api-key"];

/// Database configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the sqlite database file (e.g. "data/wikisum.db")
    pub path: String,
}

/// HTTP listener
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0".to_string(),
            port: 8000,
        }
    }
}

/// Limits and thresholds for the summarization pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SummaryConfig {
    /// Largest `word_count` a caller may request
    pub max_word_count: usize,
    /// Articles with fewer extracted words are rejected as too short
    pub min_article_words: usize,
    /// Input budget of a single model call; longer articles go through map-reduce
    pub single_pass_max_words: usize,
    /// Upper bound on the size of one map-reduce chunk
    pub max_chunk_words: usize,
    pub map_min_summary_words: usize,
    pub map_max_summary_words: usize,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            max_word_count: 500,
            min_article_words: 50,
            single_pass_max_words: 1200,
            max_chunk_words: 800,
            map_min_summary_words: 60,
            map_max_summary_words: 200,
        }
    }
}

/// Remote LLM config (OpenAI-compatible chat completions endpoint)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_url: String,
    /// Name of the environment variable holding the API key
    pub api_key_env: String,
    /// Primary model
    pub model: String,
    /// Secondary model, tried once the primary exhausts its retries
    pub fallback_model: Option<String>,
    pub timeout_seconds: u64,
    /// Retries after the first attempt, per tier
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
    pub retry_jitter: bool,
    pub max_tokens: usize,
    pub temperature: f32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1/chat/completions".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            model: "gpt-4o-mini".to_string(),
            fallback_model: None,
            timeout_seconds: 30,
            max_retries: 2,
            retry_backoff_ms: 500,
            retry_jitter: true,
            max_tokens: 1024,
            temperature: 0.0,
        }
    }
}

impl LlmConfig {
    /// Read the API key from the configured environment variable.
    /// Returns `None` when the variable is unset, blank or a known placeholder.
    pub fn api_key(&self) -> Option<String> {
        let key = std::env::var(&self.api_key_env).ok()?;
        let key = key.trim();
        if key.is_empty() || PLACEHOLDER_API_KEYS.contains(&key) {
            return None;
        }
        Some(key.to_string())
    }

    /// The secondary model, unless it is blank or the same as the primary.
    pub fn effective_fallback_model(&self) -> Option<&str> {
        self.fallback_model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty() && *m != self.model)
    }
}

/// Wikipedia fetching configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WikipediaConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_content_bytes: usize,
    pub max_redirects: usize,
}

impl Default for WikipediaConfig {
    fn default() -> Self {
        Self {
            user_agent: "wikisum/0.1.0".to_string(),
            timeout_seconds: 10,
            max_content_bytes: 2_000_000,
            max_redirects: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TranslationConfig {
    pub enabled: bool,
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// "text" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "text".to_string(),
        }
    }
}

/// Admin / maintenance config
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminConfig {
    pub auto_migrate: Option<bool>,
}

/// Top-level application configuration (deserialized from config.toml)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub summary: SummaryConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub wikipedia: WikipediaConfig,
    #[serde(default)]
    pub translation: TranslationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub admin: Option<AdminConfig>,
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
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load configuration with an optional default file and an optional override file.
    /// If both are present, they are merged (override takes precedence).
    pub async fn load_with_defaults(default_path: Option<&Path>, override_path: Option<&Path>) -> Result<Self> {
        let mut config_value = toml::Value::Table(toml::map::Map::new());

        for path in [default_path, override_path].into_iter().flatten() {
            if !path.exists() {
                continue;
            }
            let data = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read config: {}", path.display()))?;
            let val: toml::Value = toml::from_str(&data)
                .with_context(|| format!("Failed to parse configuration: {}", path.display()))?;
            merge_toml(&mut config_value, val);
        }

        let cfg: Config = config_value.try_into().context("Failed to parse merged configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that would make the pipeline misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        let s = &self.summary;
        if s.max_word_count == 0 {
            anyhow::bail!("summary.max_word_count must be > 0");
        }
        if s.max_chunk_words == 0 {
            anyhow::bail!("summary.max_chunk_words must be > 0");
        }
        if s.single_pass_max_words < s.max_chunk_words {
            anyhow::bail!(
                "summary.single_pass_max_words ({}) must be >= summary.max_chunk_words ({})",
                s.single_pass_max_words,
                s.max_chunk_words
            );
        }
        if s.map_min_summary_words > s.map_max_summary_words {
            anyhow::bail!("summary.map_min_summary_words must be <= summary.map_max_summary_words");
        }
        if self.wikipedia.max_content_bytes == 0 {
            anyhow::bail!("wikipedia.max_content_bytes must be > 0");
        }
        Ok(())
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

/// Run SQL migrations using sqlx's migration macro.
/// The migrations directory lives at the workspace root and is embedded at compile time,
/// so the binary does not need it at runtime.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../migrations")
        .run(pool)
        .await
        .context("Failed to run sqlx migrations")?;

    Ok(())
}

/// Initialize an SQLite connection pool.
///
/// This function will create the parent directory if necessary and return a configured
/// `SqlitePool` in WAL mode. Defaults are conservative:
/// - max_connections: 5
/// - connection timeout default provided by `sqlx`
///
/// Example:
///   let pool = init_db_pool("data/wikisum.db").await?;
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

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn config_from_string_and_db_pool() {
        // Minimal TOML: every section but [database] falls back to defaults
        let toml = r#"
            [database]
            path = "data/test.db"

            [llm]
            model = "gpt-4o-mini"
            fallback_model = "gpt-4o-mini"

            [translation]
            enabled = false
        "#;

        let cfg: Config = toml::from_str(toml).expect("parse config");
        assert_eq!(cfg.summary.max_word_count, 500);
        assert_eq!(cfg.server.port, 8000);
        assert!(!cfg.translation.enabled);
        // A fallback equal to the primary model is ignored
        assert_eq!(cfg.llm.effective_fallback_model(), None);
        cfg.validate().expect("valid config");

        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("nested").join("wikisum.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = init_db_pool(&db_path_str).await.expect("init pool");
        run_migrations(&pool).await.expect("migrate");
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM summaries")
            .fetch_one(&pool)
            .await
            .expect("count");
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn override_file_wins_over_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let default_path = dir.path().join("config.default.toml");
        let override_path = dir.path().join("config.toml");
        std::fs::write(
            &default_path,
            "[database]\npath = \"a.db\"\n[summary]\nmax_word_count = 300\nmin_article_words = 40\n",
        )
        .unwrap();
        std::fs::write(&override_path, "[summary]\nmax_word_count = 250\n").unwrap();

        let cfg = Config::load_with_defaults(Some(&default_path), Some(&override_path))
            .await
            .expect("load");
        assert_eq!(cfg.database.path, "a.db");
        assert_eq!(cfg.summary.max_word_count, 250);
        // untouched keys from the default file survive the merge
        assert_eq!(cfg.summary.min_article_words, 40);
    }

    #[test]
    fn validate_rejects_inverted_chunk_budget() {
        let toml = r#"
            [database]
            path = "x.db"
            [summary]
            single_pass_max_words = 100
            max_chunk_words = 800
        "#;
        let cfg: Config = toml::from_str(toml).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn placeholder_api_key_is_unavailable() {
        let cfg = LlmConfig {
            api_key_env: "WIKISUM_TEST_PLACEHOLDER_KEY".to_string(),
            ..LlmConfig::default()
        };
        std::env::set_var("WIKISUM_TEST_PLACEHOLDER_KEY", "your-openai-api-key");
        assert_eq!(cfg.api_key(), None);
        std::env::set_var("WIKISUM_TEST_PLACEHOLDER_KEY", " sk-real ");
        assert_eq!(cfg.api_key().as_deref(), Some("sk-real"));
    }
}
