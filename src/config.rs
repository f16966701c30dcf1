// src/config.rs
use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::aggregate::Limits;
use crate::ingest::fetcher::{DEFAULT_USER_AGENT, MAX_BODY_BYTES};
use crate::source::MAX_SOURCES;

pub const ENV_CONFIG_PATH: &str = "FEED_CONFIG_PATH";
pub const ENV_USER_AGENT: &str = "FEED_USER_AGENT";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FEED_FETCH_TIMEOUT_SECS";
pub const ENV_MAX_TOTAL_ARTICLES: &str = "FEED_MAX_TOTAL_ARTICLES";
pub const ENV_PUBLIC_HOST: &str = "FEED_PUBLIC_HOST";

const DEFAULT_TOML_PATH: &str = "config/feed.toml";
const DEFAULT_JSON_PATH: &str = "config/feed.json";

/// Allowed range for the `s-maxage` cache hint.
const CACHE_RANGE: std::ops::RangeInclusive<u64> = 1800..=3600;
const MAX_PER_SOURCE: usize = 20;

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    10
}
fn default_max_sources() -> usize {
    MAX_SOURCES
}
fn default_per_source_limit() -> usize {
    MAX_PER_SOURCE
}
fn default_max_total_articles() -> usize {
    100
}
fn default_combined_max_age_secs() -> u64 {
    1800
}
fn default_single_max_age_secs() -> u64 {
    3600
}
fn default_max_body_bytes() -> usize {
    MAX_BODY_BYTES
}
fn default_public_host() -> String {
    "localhost:8000".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_max_sources")]
    pub max_sources: usize,
    #[serde(default = "default_per_source_limit")]
    pub per_source_limit: usize,
    #[serde(default = "default_max_total_articles")]
    pub max_total_articles: usize,
    #[serde(default = "default_combined_max_age_secs")]
    pub combined_max_age_secs: u64,
    #[serde(default = "default_single_max_age_secs")]
    pub single_max_age_secs: u64,
    /// Upper bound on one source response body.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Host used for short links when the request carries no `Host` header.
    #[serde(default = "default_public_host")]
    pub public_host: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            max_sources: default_max_sources(),
            per_source_limit: default_per_source_limit(),
            max_total_articles: default_max_total_articles(),
            combined_max_age_secs: default_combined_max_age_secs(),
            single_max_age_secs: default_single_max_age_secs(),
            max_body_bytes: default_max_body_bytes(),
            public_host: default_public_host(),
        }
    }
}

impl AppConfig {
    /// Load from an explicit path. TOML or JSON, chosen by extension.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg: AppConfig = match ext.as_str() {
            "json" => serde_json::from_str(&content)
                .with_context(|| format!("parsing json config {}", path.display()))?,
            _ => toml::from_str(&content)
                .with_context(|| format!("parsing toml config {}", path.display()))?,
        };
        Ok(cfg.sanitized())
    }

    /// Resolve config using env var + fallbacks, then apply env overrides:
    /// 1) $FEED_CONFIG_PATH
    /// 2) config/feed.toml
    /// 3) config/feed.json
    /// 4) built-in defaults
    pub fn load_default() -> Result<Self> {
        let base = if let Ok(p) = std::env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from(&pb)?
        } else if Path::new(DEFAULT_TOML_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_TOML_PATH))?
        } else if Path::new(DEFAULT_JSON_PATH).exists() {
            Self::load_from(Path::new(DEFAULT_JSON_PATH))?
        } else {
            Self::default()
        };
        Ok(base.with_env_overrides().sanitized())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Some(ua) = env_string(ENV_USER_AGENT) {
            self.user_agent = ua;
        }
        if let Some(secs) = env_parse::<u64>(ENV_FETCH_TIMEOUT_SECS) {
            self.fetch_timeout_secs = secs;
        }
        if let Some(n) = env_parse::<usize>(ENV_MAX_TOTAL_ARTICLES) {
            self.max_total_articles = n;
        }
        if let Some(host) = env_string(ENV_PUBLIC_HOST) {
            self.public_host = host;
        }
        self
    }

    /// Clamp every field into its contractual range.
    pub fn sanitized(mut self) -> Self {
        if self.user_agent.trim().is_empty() {
            self.user_agent = default_user_agent();
        }
        if self.fetch_timeout_secs == 0 {
            self.fetch_timeout_secs = default_fetch_timeout_secs();
        }
        self.max_sources = self.max_sources.clamp(1, MAX_SOURCES);
        self.per_source_limit = self.per_source_limit.clamp(1, MAX_PER_SOURCE);
        if self.max_total_articles == 0 {
            self.max_total_articles = default_max_total_articles();
        }
        self.combined_max_age_secs = self
            .combined_max_age_secs
            .clamp(*CACHE_RANGE.start(), *CACHE_RANGE.end());
        self.single_max_age_secs = self
            .single_max_age_secs
            .clamp(*CACHE_RANGE.start(), *CACHE_RANGE.end());
        if self.max_body_bytes == 0 {
            self.max_body_bytes = default_max_body_bytes();
        }
        if self.public_host.trim().is_empty() {
            self.public_host = default_public_host();
        }
        self
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn limits(&self) -> Limits {
        Limits {
            per_source: self.per_source_limit,
            total: self.max_total_articles,
            fetch_timeout: self.fetch_timeout(),
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_string(name).and_then(|v| v.parse().ok())
}
