use serde::Deserialize;
use std::time::Duration;

use crate::services::backoff::BackoffPolicy;
use crate::services::recognizer::RecognizerSettings;

mod pipeline;

pub use pipeline::{ConfigHandle, PipelineConfig};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration from environment: {0}")]
    Env(#[from] envy::Error),

    #[error("Invalid pipeline configuration: {0}")]
    Invalid(#[from] garde::Report),
}

#[derive(Debug, Deserialize)]
pub struct AppConfig {
    /// Server bind address (e.g., "0.0.0.0:3000").
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Primary (self-hosted) recognizer endpoint,
    /// e.g. "http://localhost:8080/v1/plate-reader/"
    pub plate_api_url: String,

    /// Primary recognizer token, sent as `Authorization: Token <token>`
    #[serde(default)]
    pub plate_api_token: Option<String>,

    /// Secondary (cloud) recognizer endpoint
    #[serde(default = "default_fallback_url")]
    pub fallback_api_url: String,

    /// Secondary recognizer bearer token
    #[serde(default)]
    pub fallback_api_token: Option<String>,

    #[serde(default = "default_true")]
    pub fallback_enabled: bool,

    /// Client-side filter: candidates below this are dropped from results
    #[serde(default = "default_filter_threshold")]
    pub plate_filter_threshold: f64,

    /// Pipeline acceptance: a best candidate below this is rejected
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,

    /// Accepted region codes (comma-separated)
    #[serde(default)]
    pub regions: Vec<String>,

    #[serde(default = "default_true")]
    pub cache_enabled: bool,

    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,

    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default)]
    pub file_logging_enabled: bool,

    #[serde(default = "default_log_file_path")]
    pub log_file_path: String,

    /// Per-attempt recognizer timeout
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,

    #[serde(default = "default_true")]
    pub retry_jitter: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fallback_url() -> String {
    "https://api.platerecognizer.com/v1/plate-reader/".to_string()
}

fn default_true() -> bool {
    true
}

fn default_filter_threshold() -> f64 {
    0.5
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_cache_ttl_secs() -> u64 {
    24 * 60 * 60
}

fn default_log_file_path() -> String {
    "logs/plate-gate.log".to_string()
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_retries() -> u32 {
    3
}

fn default_initial_delay_ms() -> u64 {
    1000
}

fn default_max_delay_ms() -> u64 {
    10_000
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let config: Self = envy::from_env()?;
        garde::Validate::validate(&config.pipeline_config())?;
        Ok(config)
    }

    fn region_list(&self) -> Vec<String> {
        self.regions
            .iter()
            .map(|r| r.trim().to_lowercase())
            .filter(|r| !r.is_empty())
            .collect()
    }

    pub fn recognizer_settings(&self) -> RecognizerSettings {
        RecognizerSettings {
            primary_url: self.plate_api_url.clone(),
            primary_token: self.plate_api_token.clone(),
            fallback_url: self.fallback_api_url.clone(),
            fallback_token: self.fallback_api_token.clone(),
            fallback_enabled: self.fallback_enabled,
            threshold: self.plate_filter_threshold,
            regions: self.region_list(),
            timeout: Duration::from_millis(self.timeout_ms),
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            confidence_threshold: self.confidence_threshold,
            cache_enabled: self.cache_enabled,
            metrics_enabled: self.metrics_enabled,
            file_logging_enabled: self.file_logging_enabled,
            timeout: Duration::from_millis(self.timeout_ms),
            retry: BackoffPolicy {
                initial_delay: Duration::from_millis(self.initial_delay_ms),
                max_delay: Duration::from_millis(self.max_delay_ms),
                max_retries: self.max_retries,
                backoff_factor: self.backoff_factor,
                jitter: self.retry_jitter,
            },
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
