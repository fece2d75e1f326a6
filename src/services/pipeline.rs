use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::{ConfigError, ConfigHandle, PipelineConfig};
use crate::models::recognition::RecognitionResult;
use crate::models::upload::ImageUpload;
use crate::services::audit_log::DurableLogger;
use crate::services::backoff::{self, BackoffError};
use crate::services::cache::ResultCache;
use crate::services::metrics::MetricsRecorder;
use crate::services::recognizer::{PlateRecognizerClient, RecognitionError, RecognizeOptions};
use crate::services::validation::{self, ValidationError};

/// Metrics operation name for single-image recognition.
pub const OPERATION_RECOGNIZE: &str = "plate_recognition";

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Non-retryable client errors, such as a missing fallback token.
    #[error(transparent)]
    Client(#[from] RecognitionError),

    #[error(transparent)]
    Recognition(#[from] BackoffError<RecognitionError>),

    #[error("Plate {plate} rejected: confidence {confidence:.2} below threshold {threshold:.2}")]
    LowConfidence {
        plate: String,
        confidence: f64,
        threshold: f64,
    },
}

pub struct RecognitionPipeline {
    client: Arc<PlateRecognizerClient>,
    cache: Arc<ResultCache>,
    metrics: Arc<MetricsRecorder>,
    audit: Arc<DurableLogger>,
    config: ConfigHandle,
}

impl RecognitionPipeline {
    pub fn new(
        client: Arc<PlateRecognizerClient>,
        cache: Arc<ResultCache>,
        metrics: Arc<MetricsRecorder>,
        audit: Arc<DurableLogger>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            client,
            cache,
            metrics,
            audit,
            config: ConfigHandle::new(config),
        }
    }

    pub fn client(&self) -> &PlateRecognizerClient {
        &self.client
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn metrics(&self) -> &MetricsRecorder {
        &self.metrics
    }

    pub fn audit(&self) -> &DurableLogger {
        &self.audit
    }

    pub fn config(&self) -> Arc<PipelineConfig> {
        self.config.snapshot()
    }

    /// Swap in a new configuration; running calls keep their snapshot.
    pub fn replace_config(&self, config: PipelineConfig) -> Result<(), ConfigError> {
        self.config.replace(config)
    }

    /// Recognize the plate in one upload.
    ///
    /// `Ok` with no candidates means no plate was found. A best candidate
    /// under the configured acceptance threshold is an error.
    pub async fn recognize(
        &self,
        upload: &ImageUpload,
        options: &RecognizeOptions,
    ) -> Result<RecognitionResult, PipelineError> {
        let config = self.config.snapshot();
        let op_id = Uuid::new_v4().to_string();

        if config.metrics_enabled {
            self.metrics.start_operation(
                &op_id,
                OPERATION_RECOGNIZE,
                json!({ "filename": upload.filename, "bytes": upload.size() })
                    .as_object()
                    .cloned(),
            );
        }

        let outcome = self.run(upload, options, &config).await;

        if config.metrics_enabled {
            let (error, metadata) = match &outcome {
                Ok(result) => (
                    None,
                    json!({
                        "plate": result.best().map(|c| c.plate.clone()),
                        "confidence": result.best().map(|c| c.confidence),
                        "source": result.source.to_string(),
                        "from_cache": result.from_cache,
                    }),
                ),
                Err(e) => (Some(e.to_string()), json!({})),
            };
            if let Err(e) = self.metrics.end_operation(
                &op_id,
                OPERATION_RECOGNIZE,
                outcome.is_ok(),
                error,
                metadata.as_object().cloned(),
            ) {
                tracing::warn!(error = %e, "Failed to record recognition metric");
            }
        }

        if config.file_logging_enabled {
            match &outcome {
                Ok(result) => {
                    self.audit
                        .info(
                            "Plate recognition completed",
                            Some(json!({
                                "filename": upload.filename,
                                "plate": result.best().map(|c| c.plate.clone()),
                                "confidence": result.best().map(|c| c.confidence),
                                "source": result.source.to_string(),
                            })),
                        )
                        .await
                }
                Err(e) => {
                    self.audit
                        .error(
                            "Plate recognition failed",
                            Some(json!({ "filename": upload.filename, "error": e.to_string() })),
                        )
                        .await
                }
            }
        }

        outcome
    }

    async fn run(
        &self,
        upload: &ImageUpload,
        options: &RecognizeOptions,
        config: &PipelineConfig,
    ) -> Result<RecognitionResult, PipelineError> {
        validation::check(upload)?;

        if config.cache_enabled {
            if let Some(mut hit) = self.cache.lookup(&upload.bytes) {
                hit.filename = upload.filename.clone();
                tracing::info!(filename = %upload.filename, "Serving recognition from cache");
                return accept(hit, config.confidence_threshold);
            }
        }

        let options = RecognizeOptions {
            filename: options
                .filename
                .clone()
                .or_else(|| Some(upload.filename.clone())),
            ..options.clone()
        };

        let result = backoff::execute_with_timeout_when(
            || self.client.recognize_with_fallback(&upload.bytes, &options),
            config.timeout,
            &config.retry,
            RecognitionError::is_retryable,
        )
        .await
        .map_err(|e| match e {
            BackoffError::Aborted { error, .. } => PipelineError::Client(error),
            other => PipelineError::Recognition(other),
        })?;

        let result = accept(result, config.confidence_threshold)?;

        if config.cache_enabled {
            self.cache.store(&upload.bytes, &result);
        }

        tracing::info!(
            filename = %upload.filename,
            plate = result.best().map(|c| c.plate.as_str()).unwrap_or(""),
            candidates = result.candidates.len(),
            source = %result.source,
            "Plate recognition complete"
        );
        Ok(result)
    }
}

/// Reject a result whose best candidate is under `threshold`.
fn accept(result: RecognitionResult, threshold: f64) -> Result<RecognitionResult, PipelineError> {
    if let Some(best) = result.best() {
        if best.confidence < threshold {
            return Err(PipelineError::LowConfidence {
                plate: best.plate.clone(),
                confidence: best.confidence,
                threshold,
            });
        }
    }
    Ok(result)
}
