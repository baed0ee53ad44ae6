//! Configuration loading
//!
//! All knobs live in one TOML document. `MatcherConfig::default()` is a
//! working local configuration; deployments override sections via
//! `MatcherConfig::load` or `from_toml_str`.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Top-level configuration for the matcher engine
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct MatcherConfig {
    pub database: DatabaseConfig,
    pub search: SearchConfig,
    pub inventory: InventoryConfig,
    pub lease: LeaseConfig,
    pub session: SessionConfig,
    pub ranking: RankingConfig,
}

/// Relational store (SQLite) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// sqlx connection URL
    pub url: String,
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://service_matcher.db".to_string(),
            max_connections: 5,
        }
    }
}

/// Search backend (Elasticsearch) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    pub base_url: String,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Country code -> index name; countries not listed use `default_index`
    pub country_to_index: HashMap<String, String>,
    pub default_index: String,
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        let mut country_to_index = HashMap::new();
        country_to_index.insert("gb".to_string(), "services_en".to_string());
        Self {
            base_url: "http://localhost:9200".to_string(),
            username: None,
            password: None,
            country_to_index,
            default_index: "services_en".to_string(),
            timeout_secs: 10,
        }
    }
}

impl SearchConfig {
    /// Resolve the index for a country code.
    pub fn index_for(&self, country: &str) -> &str {
        self.country_to_index
            .get(country)
            .map(String::as_str)
            .unwrap_or(&self.default_index)
    }
}

/// Remote inventory (warehouse) settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InventoryConfig {
    pub base_url: String,
    /// Caller-identifying token sent with every request
    pub token: String,
    /// Short timeout for count queries
    pub count_timeout_ms: u64,
    /// Longer timeout for batch fetch and outcome writes
    pub fetch_timeout_secs: u64,
    pub write_timeout_secs: u64,
    /// Override for the warehouse's own read-lock duration, in seconds.
    /// Set to a small value under test configurations.
    pub short_lock_secs: Option<u64>,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090/warehouse".to_string(),
            token: String::new(),
            count_timeout_ms: 1000,
            fetch_timeout_secs: 60,
            write_timeout_secs: 60,
            short_lock_secs: None,
        }
    }
}

/// Lease window for tier-1 allocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LeaseConfig {
    /// Seconds a returned record stays checked out to its reviewer.
    /// Production default one hour; test configurations shorten this
    /// (e.g. to 60) so fixtures cycle quickly.
    pub window_secs: i64,
}

impl Default for LeaseConfig {
    fn default() -> Self {
        Self { window_secs: 3600 }
    }
}

/// Review-session rollover window
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// A reviewer's session is reused if their last activity was within
    /// this many seconds; otherwise a new session row is opened.
    pub window_secs: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self { window_secs: 3600 }
    }
}

/// Candidate shortlist settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RankingConfig {
    /// Final shortlist size after dedup
    pub candidate_limit: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self { candidate_limit: 3 }
    }
}

impl MatcherConfig {
    /// Parse configuration from a TOML string.
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| Error::Config(format!("invalid config: {}", e)))
    }

    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = MatcherConfig::default();
        assert_eq!(config.lease.window_secs, 3600);
        assert_eq!(config.session.window_secs, 3600);
        assert_eq!(config.ranking.candidate_limit, 3);
        assert_eq!(config.inventory.count_timeout_ms, 1000);
        assert_eq!(config.search.index_for("gb"), "services_en");
        assert_eq!(config.search.index_for("fr"), "services_en");
    }

    #[test]
    fn test_partial_toml_overrides() {
        let config = MatcherConfig::from_toml_str(
            r#"
            [lease]
            window_secs = 60

            [inventory]
            base_url = "http://warehouse.internal/api"
            token = "abc123"
            short_lock_secs = 1

            [search.country_to_index]
            gb = "services_en"
            de = "services_de"
            "#,
        )
        .unwrap();

        assert_eq!(config.lease.window_secs, 60);
        assert_eq!(config.inventory.base_url, "http://warehouse.internal/api");
        assert_eq!(config.inventory.short_lock_secs, Some(1));
        assert_eq!(config.search.index_for("de"), "services_de");
        // Untouched sections keep their defaults
        assert_eq!(config.session.window_secs, 3600);
    }

    #[test]
    fn test_invalid_toml_is_config_error() {
        let err = MatcherConfig::from_toml_str("lease = 12").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }
}
