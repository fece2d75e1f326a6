use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Map, Value};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::models::metric::OperationMetric;

pub const CSV_HEADER: &str = "Operation,Start Time,End Time,Duration (ms),Success,Error,Metadata";

#[derive(Debug, thiserror::Error)]
pub enum MetricsError {
    #[error("No active operation with id {0}")]
    UnknownOperation(String),
}

struct ActiveOperation {
    started: Instant,
    start_time: DateTime<Utc>,
    metadata: Map<String, Value>,
}

#[derive(Default)]
pub struct MetricsRecorder {
    active: DashMap<String, ActiveOperation>,
    completed: RwLock<Vec<OperationMetric>>,
}

impl MetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the start of operation `id`.
    ///
    /// Callers must keep ids unique among in-flight operations; starting an id
    /// twice replaces the earlier start.
    pub fn start_operation(&self, id: &str, name: &str, metadata: Option<Map<String, Value>>) {
        tracing::trace!(id, operation = name, "Operation started");
        self.active.insert(
            id.to_string(),
            ActiveOperation {
                started: Instant::now(),
                start_time: Utc::now(),
                metadata: metadata.unwrap_or_default(),
            },
        );
    }

    /// Close operation `id` and append its metric row.
    ///
    /// Metadata given here is merged over the metadata given at start.
    pub fn end_operation(
        &self,
        id: &str,
        name: &str,
        success: bool,
        error: Option<String>,
        metadata: Option<Map<String, Value>>,
    ) -> Result<OperationMetric, MetricsError> {
        let (_, active) = self
            .active
            .remove(id)
            .ok_or_else(|| MetricsError::UnknownOperation(id.to_string()))?;

        let elapsed = active.started.elapsed();
        let mut merged = active.metadata;
        if let Some(extra) = metadata {
            merged.extend(extra);
        }

        let metric = OperationMetric {
            id: id.to_string(),
            operation: name.to_string(),
            start_time: active.start_time,
            end_time: active.start_time
                + chrono::Duration::from_std(elapsed).unwrap_or(chrono::Duration::zero()),
            duration_ms: elapsed.as_secs_f64() * 1000.0,
            success,
            error,
            metadata: merged,
        };

        ::metrics::histogram!("plate_operation_duration_seconds", "operation" => name.to_string())
            .record(elapsed.as_secs_f64());
        ::metrics::counter!(
            "plate_operations_total",
            "operation" => name.to_string(),
            "outcome" => if success { "success" } else { "failure" }
        )
        .increment(1);

        tracing::debug!(
            id,
            operation = name,
            success,
            duration_ms = metric.duration_ms,
            "Operation completed"
        );

        self.completed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(metric.clone());
        Ok(metric)
    }

    /// Mean duration of completed `name` operations; zero when there are none.
    pub fn average_latency(&self, name: &str) -> Duration {
        let completed = self.completed.read().unwrap_or_else(PoisonError::into_inner);
        let durations: Vec<f64> = completed
            .iter()
            .filter(|m| m.operation == name)
            .map(|m| m.duration_ms)
            .collect();
        if durations.is_empty() {
            return Duration::ZERO;
        }
        let mean_ms = durations.iter().sum::<f64>() / durations.len() as f64;
        Duration::from_secs_f64(mean_ms / 1000.0)
    }

    /// Percentage (0–100) of successful `name` operations; 0 when there are none.
    pub fn success_rate(&self, name: &str) -> f64 {
        let completed = self.completed.read().unwrap_or_else(PoisonError::into_inner);
        let (total, ok) = completed
            .iter()
            .filter(|m| m.operation == name)
            .fold((0usize, 0usize), |(total, ok), m| {
                (total + 1, ok + usize::from(m.success))
            });
        if total == 0 {
            return 0.0;
        }
        ok as f64 / total as f64 * 100.0
    }

    pub fn metrics(&self) -> Vec<OperationMetric> {
        self.completed
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Drop every completed row. In-flight operations are kept.
    pub fn clear(&self) {
        self.completed
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// All completed rows as CSV, one row per metric.
    pub fn export_csv(&self) -> String {
        let completed = self.completed.read().unwrap_or_else(PoisonError::into_inner);
        let mut out = String::from(CSV_HEADER);
        out.push('\n');
        for m in completed.iter() {
            let row = [
                quote(&m.operation),
                quote(&m.start_time.to_rfc3339()),
                quote(&m.end_time.to_rfc3339()),
                format!("{:.3}", m.duration_ms),
                m.success.to_string(),
                quote(m.error.as_deref().unwrap_or("")),
                quote(&Value::Object(m.metadata.clone()).to_string()),
            ];
            out.push_str(&row.join(","));
            out.push('\n');
        }
        out
    }
}

fn quote(field: &str) -> String {
    format!("\"{}\"", field.replace('"', "\"\""))
}
