use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;
use crate::data::parser::ParseRules;
use crate::pipeline::dedup::DEFAULT_MAX_ITEMS;
use crate::pipeline::fallback::DEFAULT_FALLBACK_ITEMS;

#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub sources: SourcesConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub monitoring: MonitoringConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    #[serde(default = "default_polymarket_url")]
    pub polymarket_url: String,
    #[serde(default = "default_kalshi_url")]
    pub kalshi_url: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_backoff_min")]
    pub backoff_min_ms: u64,
    #[serde(default = "default_backoff_max")]
    pub backoff_max_ms: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SnapshotConfig {
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    #[serde(default = "default_max_candidates")]
    pub max_candidates_per_source: usize,
    #[serde(default = "default_min_title_len")]
    pub min_title_len: usize,
    #[serde(default = "default_max_title_len")]
    pub max_title_len: usize,
    #[serde(default = "default_fallback_items")]
    pub fallback_items: usize,
    #[serde(default = "default_ttl")]
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MonitoringConfig {
    #[serde(default)]
    pub csv_logging: bool,
    #[serde(default = "default_csv_log_path")]
    pub csv_log_path: String,
}

fn default_polymarket_url() -> String { "https://r.jina.ai/http://polymarket.com/markets".to_string() }
fn default_kalshi_url() -> String { "https://r.jina.ai/http://kalshi.com/markets".to_string() }
fn default_user_agent() -> String { "Mozilla/5.0 WillowForecastBot/1.0".to_string() }
fn default_max_attempts() -> u32 { 3 }
fn default_backoff_min() -> u64 { 250 }
fn default_backoff_max() -> u64 { 650 }
fn default_request_timeout() -> u64 { 20 }
fn default_max_items() -> usize { DEFAULT_MAX_ITEMS }
fn default_max_candidates() -> usize { 64 }
fn default_min_title_len() -> usize { 12 }
fn default_max_title_len() -> usize { 160 }
fn default_fallback_items() -> usize { DEFAULT_FALLBACK_ITEMS }
fn default_ttl() -> u64 { 60 * 60 * 24 * 14 }
fn default_database_path() -> String { "forecasts.db".to_string() }
fn default_csv_log_path() -> String { "snapshot_runs.csv".to_string() }

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            polymarket_url: default_polymarket_url(),
            kalshi_url: default_kalshi_url(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_min_ms: default_backoff_min(),
            backoff_max_ms: default_backoff_max(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            max_candidates_per_source: default_max_candidates(),
            min_title_len: default_min_title_len(),
            max_title_len: default_max_title_len(),
            fallback_items: default_fallback_items(),
            ttl_secs: default_ttl(),
        }
    }
}

impl SnapshotConfig {
    pub fn parse_rules(&self) -> ParseRules {
        ParseRules {
            min_title_len: self.min_title_len,
            max_title_len: self.max_title_len,
            max_candidates: self.max_candidates_per_source,
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            database_path: default_database_path(),
        }
    }
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            csv_logging: false,
            csv_log_path: default_csv_log_path(),
        }
    }
}

/// Optional overrides pulled from the environment (and `.env`).
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    pub polymarket_url: Option<String>,
    pub kalshi_url: Option<String>,
    pub database_path: Option<String>,
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path))
    }

    /// Like `load`, but a missing file yields the defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            Self::load(path)
        } else {
            tracing::info!("No config at {}, using defaults", path);
            Ok(Self::default())
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch.max_attempts == 0 {
            anyhow::bail!("fetch.max_attempts must be at least 1");
        }
        if self.fetch.backoff_min_ms > self.fetch.backoff_max_ms {
            anyhow::bail!(
                "fetch.backoff_min_ms ({}) exceeds fetch.backoff_max_ms ({})",
                self.fetch.backoff_min_ms,
                self.fetch.backoff_max_ms
            );
        }
        if self.snapshot.max_items == 0 {
            anyhow::bail!("snapshot.max_items must be at least 1");
        }
        if self.snapshot.fallback_items == 0 {
            anyhow::bail!("snapshot.fallback_items must be at least 1");
        }
        if self.snapshot.fallback_items > self.snapshot.max_items {
            anyhow::bail!(
                "snapshot.fallback_items ({}) exceeds snapshot.max_items ({})",
                self.snapshot.fallback_items,
                self.snapshot.max_items
            );
        }
        if self.snapshot.max_title_len == 0 {
            anyhow::bail!("snapshot.max_title_len must be at least 1");
        }
        Ok(())
    }

    pub fn apply_env(&mut self, env: &EnvConfig) {
        if let Some(url) = &env.polymarket_url {
            self.sources.polymarket_url = url.clone();
        }
        if let Some(url) = &env.kalshi_url {
            self.sources.kalshi_url = url.clone();
        }
        if let Some(path) = &env.database_path {
            self.storage.database_path = path.clone();
        }
    }
}

impl EnvConfig {
    pub fn load() -> Self {
        dotenv::dotenv().ok();

        Self {
            polymarket_url: std::env::var("POLYMARKET_URL").ok(),
            kalshi_url: std::env::var("KALSHI_URL").ok(),
            database_path: std::env::var("FORECASTS_DB_PATH").ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = Config::from_toml("").unwrap();

        assert_eq!(config.fetch.max_attempts, 3);
        assert_eq!(config.fetch.backoff_min_ms, 250);
        assert_eq!(config.fetch.backoff_max_ms, 650);
        assert_eq!(config.snapshot.max_items, 20);
        assert_eq!(config.snapshot.fallback_items, 6);
        assert_eq!(config.snapshot.ttl_secs, 1_209_600);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
    }

    #[test]
    fn test_partial_sections() {
        let config = Config::from_toml(
            r#"
            [snapshot]
            max_items = 5

            [storage]
            backend = "memory"
            "#,
        )
        .unwrap();

        assert_eq!(config.snapshot.max_items, 5);
        assert_eq!(config.snapshot.max_title_len, 160);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.storage.database_path, "forecasts.db");
    }

    #[test]
    fn test_rejects_inverted_backoff() {
        let err = Config::from_toml("[fetch]\nbackoff_min_ms = 900\nbackoff_max_ms = 100\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_rejects_zero_attempts() {
        assert!(Config::from_toml("[fetch]\nmax_attempts = 0\n").is_err());
    }

    #[test]
    fn test_rejects_empty_fallback() {
        assert!(Config::from_toml("[snapshot]\nfallback_items = 0\n").is_err());
    }

    #[test]
    fn test_rejects_fallback_above_max_items() {
        assert!(Config::from_toml("[snapshot]\nfallback_items = 30\n").is_err());
        assert!(Config::from_toml("[snapshot]\nmax_items = 4\n").is_err());
        assert!(Config::from_toml("[snapshot]\nmax_items = 4\nfallback_items = 4\n").is_ok());
    }

    #[test]
    fn test_env_overrides() {
        let mut config = Config::default();
        config.apply_env(&EnvConfig {
            polymarket_url: Some("http://localhost:1/poly".to_string()),
            kalshi_url: None,
            database_path: Some("/tmp/x.db".to_string()),
        });

        assert_eq!(config.sources.polymarket_url, "http://localhost:1/poly");
        assert_eq!(config.sources.kalshi_url, default_kalshi_url());
        assert_eq!(config.storage.database_path, "/tmp/x.db");
    }

    #[test]
    fn test_parse_rules_follow_config() {
        let rules = SnapshotConfig::default().parse_rules();
        assert_eq!(rules.min_title_len, 12);
        assert_eq!(rules.max_title_len, 160);
        assert_eq!(rules.max_candidates, 64);
    }
}
