use std::sync::Arc;

use crate::services::{bulk::BulkProcessor, pipeline::RecognitionPipeline};

/// Shared application state passed to all route handlers.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<RecognitionPipeline>,
    pub bulk: Arc<BulkProcessor>,
}

impl AppState {
    pub fn new(pipeline: RecognitionPipeline) -> Self {
        let pipeline = Arc::new(pipeline);
        Self {
            bulk: Arc::new(BulkProcessor::new(pipeline.clone())),
            pipeline,
        }
    }
}
