use serde::{Deserialize, Serialize};

/// Severity of a sync log entry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncLogType {
    Info,
    Warning,
    Error,
}

impl SyncLogType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Info => "INFO",
            Self::Warning => "WARNING",
            Self::Error => "ERROR",
        }
    }
}

impl std::fmt::Display for SyncLogType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress record for a job. The timestamp is assigned by the sink.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncLogEntry {
    pub job_id: i64,
    #[serde(rename = "type")]
    pub log_type: SyncLogType,
    pub message: String,
}

impl SyncLogEntry {
    pub fn info(job_id: i64, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_type: SyncLogType::Info,
            message: message.into(),
        }
    }

    pub fn warning(job_id: i64, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_type: SyncLogType::Warning,
            message: message.into(),
        }
    }

    pub fn error(job_id: i64, message: impl Into<String>) -> Self {
        Self {
            job_id,
            log_type: SyncLogType::Error,
            message: message.into(),
        }
    }
}
