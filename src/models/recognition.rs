use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Pixel coordinates of a detected plate within the capture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub xmin: i32,
    pub ymin: i32,
    pub xmax: i32,
    pub ymax: i32,
}

/// One detected plate from a single recognition call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionCandidate {
    /// Normalized uppercase plate string.
    pub plate: String,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vehicle_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bounding_box: Option<BoundingBox>,
}

impl RecognitionCandidate {
    pub fn new(plate: &str, confidence: f64) -> Self {
        Self {
            plate: normalize_plate(plate),
            confidence,
            region: None,
            vehicle_type: None,
            bounding_box: None,
        }
    }
}

/// Strip surrounding whitespace and uppercase a raw plate reading.
pub fn normalize_plate(raw: &str) -> String {
    raw.trim().to_uppercase()
}

/// Which layer produced a recognition result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResultSource {
    Primary,
    Fallback,
    Cache,
}

/// Outcome of one recognition call.
///
/// `candidates` keeps the detector's order; it is never re-sorted. Every
/// candidate met the client's confidence threshold when it was filtered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecognitionResult {
    pub candidates: Vec<RecognitionCandidate>,
    /// Processing time reported by the recognizer, in milliseconds.
    pub processing_time_ms: f64,
    pub filename: String,
    pub timestamp: DateTime<Utc>,
    pub source: ResultSource,
    #[serde(default)]
    pub from_cache: bool,
}

impl RecognitionResult {
    /// The first (highest-ranked by the detector) candidate, if any.
    pub fn best(&self) -> Option<&RecognitionCandidate> {
        self.candidates.first()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}
