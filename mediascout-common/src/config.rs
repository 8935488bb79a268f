//! Configuration loading for MediaScout services
//!
//! Resolution priority: environment variables override the TOML file, which
//! overrides compiled defaults. Configuration is loaded and validated once at
//! startup and passed by reference into the service; there is no global
//! mutable configuration state.

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level service configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Bind address for the HTTP API
    #[serde(default = "default_bind")]
    pub bind: String,

    /// SQLite database path
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Maximum number of searches in PROCESSING simultaneously
    #[serde(default = "default_max_concurrent_searches")]
    pub max_concurrent_searches: usize,

    /// Event bus channel capacity
    #[serde(default = "default_event_bus_capacity")]
    pub event_bus_capacity: usize,

    /// Default per-stage timeout in seconds (overridable per search)
    #[serde(default = "default_stage_timeout_secs")]
    pub stage_timeout_secs: u64,

    /// Provider adapter settings
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// Provider adapter settings
#[derive(Debug, Clone, Deserialize)]
pub struct ProvidersConfig {
    /// LLM endpoint for query generation and contact extraction
    #[serde(default = "default_llm_endpoint")]
    pub llm_endpoint: String,

    /// LLM API key (prefer MEDIASCOUT_LLM_API_KEY env var)
    #[serde(default)]
    pub llm_api_key: Option<String>,

    /// LLM model identifier
    #[serde(default = "default_llm_model")]
    pub llm_model: String,

    /// Web search API endpoint
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,

    /// Web search API key (prefer MEDIASCOUT_SEARCH_API_KEY env var)
    #[serde(default)]
    pub search_api_key: Option<String>,

    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Minimum interval between requests to the same provider, milliseconds
    #[serde(default = "default_min_request_interval_ms")]
    pub min_request_interval_ms: u64,
}

fn default_bind() -> String {
    "127.0.0.1:5810".to_string()
}
fn default_database_path() -> PathBuf {
    PathBuf::from("mediascout.db")
}
fn default_max_concurrent_searches() -> usize {
    4
}
fn default_event_bus_capacity() -> usize {
    256
}
fn default_stage_timeout_secs() -> u64 {
    120
}
fn default_llm_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}
fn default_llm_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_search_endpoint() -> String {
    "https://serpapi.com/search".to_string()
}
fn default_request_timeout_secs() -> u64 {
    30
}
fn default_min_request_interval_ms() -> u64 {
    250
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            database_path: default_database_path(),
            max_concurrent_searches: default_max_concurrent_searches(),
            event_bus_capacity: default_event_bus_capacity(),
            stage_timeout_secs: default_stage_timeout_secs(),
            providers: ProvidersConfig::default(),
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            llm_endpoint: default_llm_endpoint(),
            llm_api_key: None,
            llm_model: default_llm_model(),
            search_endpoint: default_search_endpoint(),
            search_api_key: None,
            request_timeout_secs: default_request_timeout_secs(),
            min_request_interval_ms: default_min_request_interval_ms(),
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a TOML file, apply env overrides, validate.
    ///
    /// A missing file yields compiled defaults (env overrides still apply).
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let content = std::fs::read_to_string(p)
                    .map_err(|e| Error::Config(format!("Failed to read {}: {}", p.display(), e)))?;
                toml::from_str(&content)
                    .map_err(|e| Error::Config(format!("Failed to parse {}: {}", p.display(), e)))?
            }
            _ => Self::default(),
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(bind) = std::env::var("MEDIASCOUT_BIND") {
            self.bind = bind;
        }
        if let Ok(db) = std::env::var("MEDIASCOUT_DB") {
            self.database_path = PathBuf::from(db);
        }
        if let Ok(key) = std::env::var("MEDIASCOUT_LLM_API_KEY") {
            self.providers.llm_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("MEDIASCOUT_SEARCH_API_KEY") {
            self.providers.search_api_key = Some(key);
        }
    }

    fn validate(&self) -> Result<()> {
        if self.max_concurrent_searches == 0 {
            return Err(Error::Config(
                "max_concurrent_searches must be >= 1".to_string(),
            ));
        }
        if self.event_bus_capacity == 0 {
            return Err(Error::Config("event_bus_capacity must be >= 1".to_string()));
        }
        if self.stage_timeout_secs == 0 {
            return Err(Error::Config("stage_timeout_secs must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_valid() {
        let config = ServiceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_concurrent_searches, 4);
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = ServiceConfig::load(Some(Path::new("/nonexistent/mediascout.toml"))).unwrap();
        assert_eq!(config.bind, default_bind());
    }

    #[test]
    fn parses_partial_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "bind = \"0.0.0.0:9000\"\nmax_concurrent_searches = 8\n\n[providers]\nllm_model = \"gpt-4o\"\n"
        )
        .unwrap();

        let config = ServiceConfig::load(Some(file.path())).unwrap();
        assert_eq!(config.bind, "0.0.0.0:9000");
        assert_eq!(config.max_concurrent_searches, 8);
        assert_eq!(config.providers.llm_model, "gpt-4o");
        // Unspecified fields fall back to defaults
        assert_eq!(config.stage_timeout_secs, default_stage_timeout_secs());
    }

    #[test]
    fn rejects_zero_concurrency() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_concurrent_searches = 0").unwrap();
        assert!(ServiceConfig::load(Some(file.path())).is_err());
    }
}
