//! Progress reporting: batches of [`SyncLogEntry`] forwarded to a log sink.

use chrono::{DateTime, Utc};
use refsync_core::{SyncLogEntry, SyncLogType};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("log sink unavailable: {0}")]
    Unavailable(String),
}

/// Destination for sync log entries. A batch is accepted or rejected as a
/// whole; the sink assigns timestamps.
pub trait LogSink: Send + Sync {
    fn send_batch(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError>;
}

/// One stored log line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub entry: SyncLogEntry,
}

/// Appends entries to a JSONL file, one [`LogRecord`] per line.
pub struct JsonlLogSink {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonlLogSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl LogSink for JsonlLogSink {
    fn send_batch(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError> {
        let timestamp = Utc::now();
        let mut buf = Vec::new();
        for entry in entries {
            let record = LogRecord {
                timestamp,
                entry: entry.clone(),
            };
            serde_json::to_writer(&mut buf, &record)?;
            buf.push(b'\n');
        }

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| SinkError::Unavailable("jsonl sink lock poisoned".to_string()))?;
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        // One write per batch keeps a batch contiguous in the file.
        file.write_all(&buf)?;
        file.flush()?;
        Ok(())
    }
}

/// Forwards entries to `tracing`, for deployments without a log file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogSink;

impl LogSink for TracingLogSink {
    fn send_batch(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError> {
        for entry in entries {
            match entry.log_type {
                SyncLogType::Info => info!(job_id = entry.job_id, "{}", entry.message),
                SyncLogType::Warning => warn!(job_id = entry.job_id, "{}", entry.message),
                SyncLogType::Error => error!(job_id = entry.job_id, "{}", entry.message),
            }
        }
        Ok(())
    }
}

/// Keeps entries in memory.
#[derive(Debug, Default)]
pub struct MemoryLogSink {
    records: Mutex<Vec<LogRecord>>,
}

impl MemoryLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records
            .lock()
            .map(|records| records.clone())
            .unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<String> {
        self.records()
            .into_iter()
            .map(|record| record.entry.message)
            .collect()
    }
}

impl LogSink for MemoryLogSink {
    fn send_batch(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError> {
        let timestamp = Utc::now();
        let mut records = self
            .records
            .lock()
            .map_err(|_| SinkError::Unavailable("memory sink lock poisoned".to_string()))?;
        records.extend(entries.iter().cloned().map(|entry| LogRecord { timestamp, entry }));
        Ok(())
    }
}

/// Sends progress batches for jobs. Failures are returned, never swallowed.
#[derive(Clone)]
pub struct ProgressReporter {
    sink: Arc<dyn LogSink>,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self { sink }
    }

    pub fn report(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError> {
        if entries.is_empty() {
            return Ok(());
        }
        self.sink.send_batch(entries)?;
        debug!(count = entries.len(), "Sent sync log batch");
        Ok(())
    }

    /// Like [`report`](Self::report), but a failure is only logged. Used for
    /// entries written after the job outcome is already decided.
    pub fn report_best_effort(&self, entries: &[SyncLogEntry]) {
        if let Err(e) = self.report(entries) {
            warn!("Failed to send sync log batch: {e}");
        }
    }
}
