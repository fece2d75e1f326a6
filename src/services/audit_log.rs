use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use strum::{Display, EnumString};
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt;

/// Buffered entries that trigger a flush to the sink.
pub const FLUSH_THRESHOLD: usize = 10;

/// Most recent lines kept when no durable sink is available.
pub const FALLBACK_CAPACITY: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Render one persisted line:
/// `[<timestamp>] <LEVEL>: <message> | Data: <json>`.
pub fn format_line(
    timestamp: DateTime<Utc>,
    level: LogLevel,
    message: &str,
    data: Option<&serde_json::Value>,
) -> String {
    let ts = timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
    match data {
        Some(data) => format!("[{ts}] {level}: {message} | Data: {data}"),
        None => format!("[{ts}] {level}: {message}"),
    }
}

/// Lines waiting for the sink, and whether the sink still takes new ones.
#[derive(Default)]
struct Pending {
    lines: Vec<String>,
    accepting: bool,
}

/// Audit trail of recognition activity. Lines are appended to a file in
/// batches; without a sink, or after a write failure, they go to a bounded
/// in-memory list instead. Logging never fails for the caller.
pub struct DurableLogger {
    path: Option<PathBuf>,
    // Lock order: sink, then pending, then fallback.
    sink: tokio::sync::Mutex<Option<File>>,
    pending: Mutex<Pending>,
    fallback: Mutex<VecDeque<String>>,
}

impl DurableLogger {
    /// Logger without a durable sink; every line goes to the fallback list.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            sink: tokio::sync::Mutex::new(None),
            pending: Mutex::new(Pending::default()),
            fallback: Mutex::new(VecDeque::new()),
        }
    }

    /// Logger appending to `path`, creating parent directories as needed.
    pub async fn open(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        tracing::info!(path = %path.display(), "Durable log sink opened");
        Ok(Self {
            path: Some(path),
            sink: tokio::sync::Mutex::new(Some(file)),
            pending: Mutex::new(Pending {
                lines: Vec::new(),
                accepting: true,
            }),
            fallback: Mutex::new(VecDeque::new()),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn has_sink(&self) -> bool {
        self.pending().accepting
    }

    pub async fn log(&self, level: LogLevel, message: &str, data: Option<serde_json::Value>) {
        match level {
            LogLevel::Debug => tracing::debug!(audit = true, data = ?data, "{message}"),
            LogLevel::Info => tracing::info!(audit = true, data = ?data, "{message}"),
            LogLevel::Warn => tracing::warn!(audit = true, data = ?data, "{message}"),
            LogLevel::Error => tracing::error!(audit = true, data = ?data, "{message}"),
        }

        let line = format_line(Utc::now(), level, message, data.as_ref());

        let should_flush = {
            let mut pending = self.pending();
            if !pending.accepting {
                self.push_fallback(std::iter::once(line));
                return;
            }
            pending.lines.push(line);
            pending.lines.len() >= FLUSH_THRESHOLD
        };
        if should_flush {
            self.flush().await;
        }
    }

    pub async fn info(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(LogLevel::Info, message, data).await;
    }

    pub async fn error(&self, message: &str, data: Option<serde_json::Value>) {
        self.log(LogLevel::Error, message, data).await;
    }

    /// Write every buffered line to the sink.
    ///
    /// Lines that cannot be written are moved to the fallback list.
    pub async fn flush(&self) {
        let mut sink = self.sink.lock().await;
        // Taken under the sink lock so batches reach the file in order.
        let lines = std::mem::take(&mut self.pending().lines);
        if !lines.is_empty() {
            self.write_batch(&mut sink, lines).await;
        }
    }

    /// Flush remaining lines and release the sink. Later lines go to the
    /// fallback list.
    pub async fn close(&self) {
        let mut sink = self.sink.lock().await;
        let lines = {
            let mut pending = self.pending();
            pending.accepting = false;
            std::mem::take(&mut pending.lines)
        };
        if !lines.is_empty() {
            self.write_batch(&mut sink, lines).await;
        }
        if let Some(mut file) = sink.take() {
            if let Err(e) = file.sync_all().await {
                tracing::warn!(error = %e, "Failed to sync durable log on close");
            }
        }
    }

    async fn write_batch(&self, sink: &mut Option<File>, lines: Vec<String>) {
        let Some(file) = sink.as_mut() else {
            self.push_fallback(lines);
            return;
        };

        let mut chunk = lines.join("\n");
        chunk.push('\n');
        let written = async {
            file.write_all(chunk.as_bytes()).await?;
            file.flush().await
        }
        .await;

        if let Err(e) = written {
            tracing::warn!(
                error = %e,
                lines = lines.len(),
                "Failed to write durable log, keeping lines in memory"
            );
            self.push_fallback(lines);
        }
    }

    /// Snapshot of the fallback list, oldest first.
    pub fn fallback_entries(&self) -> Vec<String> {
        self.fallback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect()
    }

    pub fn buffered_len(&self) -> usize {
        self.pending().lines.len()
    }

    fn pending(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn push_fallback(&self, lines: impl IntoIterator<Item = String>) {
        let mut fallback = self.fallback.lock().unwrap_or_else(PoisonError::into_inner);
        fallback.extend(lines);
        while fallback.len() > FALLBACK_CAPACITY {
            fallback.pop_front();
        }
    }
}
