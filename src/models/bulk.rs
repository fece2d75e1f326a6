use serde::{Deserialize, Serialize};

use super::recognition::RecognitionResult;

/// Outcome of one file within a bulk run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub filename: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<RecognitionResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Summary over an ordered batch of images. `results` follows input order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkProcessingResult {
    pub total_processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub results: Vec<BulkItemResult>,
    pub total_time_ms: f64,
    pub average_time_ms: f64,
}
