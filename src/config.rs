//! Optional TOML configuration for the crawler binary.
//!
//! A missing or empty file yields `Config::default()`; all fields use
//! `#[serde(default)]` so any subset of keys can be specified.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::crawler::DEFAULT_DETAIL_CONCURRENCY;
use crate::net::{
    DEFAULT_MAX_RETRIES, DEFAULT_PER_HOST_LIMIT, DEFAULT_TOTAL_TIMEOUT_SECS, DEFAULT_USER_AGENT,
};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Feed document to crawl.
    pub feed_url: String,

    /// SQLite database path; created on first run.
    pub database_path: String,

    /// Directory for CSV exports.
    pub output_dir: PathBuf,

    /// Maximum in-flight requests per host.
    pub per_host_limit: usize,

    /// Total per-request timeout (send through body read), in seconds.
    pub total_timeout_secs: u64,

    /// Retry budget per fetch.
    pub max_retries: u32,

    /// Concurrent article body fetches per cycle.
    pub detail_concurrency: usize,

    /// CSS selector for the article content container.
    pub body_selector: String,

    /// TLS certificate verification. Off by default; article sources
    /// commonly present misconfigured certificates.
    pub verify_tls: bool,

    pub user_agent: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "http://feeds.reuters.com/reuters/topNews".to_string(),
            database_path: "news.db".to_string(),
            output_dir: PathBuf::from("output"),
            per_host_limit: DEFAULT_PER_HOST_LIMIT,
            total_timeout_secs: DEFAULT_TOTAL_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            detail_concurrency: DEFAULT_DETAIL_CONCURRENCY,
            body_selector: ".StandardArticleBody_container".to_string(),
            verify_tls: false,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line info
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "no config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };
        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "config file is empty, using defaults");
            return Ok(Self::default());
        }
        Ok(toml::from_str(&content)?)
    }
}
