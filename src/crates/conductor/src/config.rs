//! Environment configuration
//!
//! The core is configured entirely through environment variables; the HTTP
//! edge owns any CLI surface.

use pipelines::CostTable;
use tooling::config::{get_env, get_env_or, get_env_parse_or};
use tooling::Result;

/// Runtime configuration for the conductor core
#[derive(Debug, Clone)]
pub struct ConductorConfig {
    /// Base URL of the model inference daemon
    pub model_backend_host: String,
    /// Cache service URL; None runs with a no-op cache
    pub cache_url: Option<String>,
    /// Default tracing level when RUST_LOG is unset
    pub log_level: String,
    /// Deployment environment name
    pub environment: String,
    /// Search provider API key, when configured
    pub search_api_key: Option<String>,
    /// Scraping provider API key, when configured
    pub scraping_api_key: Option<String>,
    /// Per-call provider costs
    pub costs: CostTable,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            model_backend_host: "http://localhost:11434".to_string(),
            cache_url: None,
            log_level: "info".to_string(),
            environment: "development".to_string(),
            search_api_key: None,
            scraping_api_key: None,
            costs: CostTable::default(),
        }
    }
}

impl ConductorConfig {
    /// Load configuration from the environment
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            model_backend_host: get_env_or("MODEL_BACKEND_HOST", "http://localhost:11434")?,
            cache_url: get_env("CACHE_URL")?,
            log_level: get_env_or("LOG_LEVEL", "info")?,
            environment: get_env_or("ENVIRONMENT", "development")?,
            search_api_key: get_env("BRAVE_API_KEY")?,
            scraping_api_key: get_env("SCRAPINGBEE_API_KEY")?,
            costs: CostTable {
                primary_search: get_env_parse_or("SEARCH_COST", 0.42)?,
                enhancement_fetch: get_env_parse_or("ENHANCEMENT_COST", 0.84)?,
            },
        })
    }

    /// Whether internal details may appear in error payloads
    pub fn is_production(&self) -> bool {
        self.environment == "production"
    }
}
