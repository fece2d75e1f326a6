use garde::Validate;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use super::ConfigError;
use crate::services::backoff::BackoffPolicy;

/// Configuration the recognition pipeline reads at the start of each call.
#[derive(Debug, Clone, PartialEq, Validate)]
pub struct PipelineConfig {
    /// Best candidate must reach this confidence or the call is rejected.
    #[garde(range(min = 0.0, max = 1.0))]
    pub confidence_threshold: f64,

    #[garde(skip)]
    pub cache_enabled: bool,

    #[garde(skip)]
    pub metrics_enabled: bool,

    #[garde(skip)]
    pub file_logging_enabled: bool,

    /// Per-attempt timeout.
    #[garde(custom(validate_timeout))]
    pub timeout: Duration,

    #[garde(custom(validate_policy))]
    pub retry: BackoffPolicy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.8,
            cache_enabled: true,
            metrics_enabled: true,
            file_logging_enabled: false,
            timeout: Duration::from_secs(30),
            retry: BackoffPolicy::default(),
        }
    }
}

fn validate_timeout(value: &Duration, _ctx: &()) -> garde::Result {
    if value.is_zero() {
        return Err(garde::Error::new("timeout must be at least 1 ms"));
    }
    Ok(())
}

fn validate_policy(value: &BackoffPolicy, _ctx: &()) -> garde::Result {
    if !value.backoff_factor.is_finite() || value.backoff_factor < 1.0 {
        return Err(garde::Error::new("backoff factor must be >= 1.0"));
    }
    if value.max_delay < value.initial_delay {
        return Err(garde::Error::new("max delay must not be below initial delay"));
    }
    Ok(())
}

/// Holder of the current [`PipelineConfig`].
///
/// Readers take an `Arc` snapshot; a replacement is visible to calls that
/// start after it, never to calls already running.
pub struct ConfigHandle {
    current: RwLock<Arc<PipelineConfig>>,
}

impl ConfigHandle {
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            current: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<PipelineConfig> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Validate and install a whole new configuration.
    pub fn replace(&self, config: PipelineConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::new(config);
        tracing::info!("Pipeline configuration replaced");
        Ok(())
    }
}
