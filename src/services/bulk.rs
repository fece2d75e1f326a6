use std::sync::Arc;
use std::time::Instant;

use crate::models::bulk::{BulkItemResult, BulkProcessingResult};
use crate::models::upload::ImageUpload;
use crate::services::pipeline::RecognitionPipeline;
use crate::services::recognizer::RecognizeOptions;

/// Runs a batch of uploads through the pipeline one at a time, in order.
pub struct BulkProcessor {
    pipeline: Arc<RecognitionPipeline>,
    options: RecognizeOptions,
}

impl BulkProcessor {
    pub fn new(pipeline: Arc<RecognitionPipeline>) -> Self {
        Self {
            pipeline,
            options: RecognizeOptions::default(),
        }
    }

    /// Options applied to every item (regions, camera id).
    pub fn with_options(mut self, options: RecognizeOptions) -> Self {
        self.options = options;
        self
    }

    /// Process every file sequentially. A failing item is recorded in its own
    /// slot and never stops the batch.
    pub async fn process_bulk(&self, files: &[ImageUpload]) -> BulkProcessingResult {
        if files.is_empty() {
            return BulkProcessingResult::default();
        }

        tracing::info!(count = files.len(), "Starting bulk recognition");
        let started = Instant::now();
        let mut results = Vec::with_capacity(files.len());

        for file in files {
            let options = RecognizeOptions {
                filename: Some(file.filename.clone()),
                ..self.options.clone()
            };
            let item = match self.pipeline.recognize(file, &options).await {
                Ok(result) => BulkItemResult {
                    filename: file.filename.clone(),
                    success: true,
                    result: Some(result),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(filename = %file.filename, error = %e, "Bulk item failed");
                    BulkItemResult {
                        filename: file.filename.clone(),
                        success: false,
                        result: None,
                        error: Some(e.to_string()),
                    }
                }
            };
            results.push(item);
        }

        let total_time_ms = started.elapsed().as_secs_f64() * 1000.0;
        let successful = results.iter().filter(|r| r.success).count();
        let summary = BulkProcessingResult {
            total_processed: results.len(),
            successful,
            failed: results.len() - successful,
            average_time_ms: total_time_ms / results.len() as f64,
            total_time_ms,
            results,
        };

        tracing::info!(
            total = summary.total_processed,
            successful = summary.successful,
            failed = summary.failed,
            total_time_ms = summary.total_time_ms,
            "Bulk recognition complete"
        );
        summary
    }
}
