use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One completed (successful or failed) named operation.
///
/// Rows are append-only: the metrics recorder never mutates a past entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OperationMetric {
    pub id: String,
    pub operation: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub duration_ms: f64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}
