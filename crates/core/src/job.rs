use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Returned when a status or sync type label stored in the queue is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind}: {value:?}")]
pub struct ParseEnumError {
    pub kind: &'static str,
    pub value: String,
}

/// Lifecycle status of a queued sync job.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    Pending,
    Running,
    Done,
    Failed,
}

impl JobStatus {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Done => "DONE",
            Self::Failed => "FAILED",
        }
    }

    /// `DONE` and `FAILED` are never left again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "RUNNING" => Ok(Self::Running),
            "DONE" => Ok(Self::Done),
            "FAILED" => Ok(Self::Failed),
            other => Err(ParseEnumError {
                kind: "job status",
                value: other.to_string(),
            }),
        }
    }
}

/// Kind of synchronization a job asks for.
///
/// Only `GIT_REFS` has a handler in this worker; other labels are carried
/// through unchanged so the dispatcher can reject them with a useful message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SyncType {
    GitRefs,
    Other(String),
}

impl SyncType {
    pub const GIT_REFS: &'static str = "GIT_REFS";

    pub fn as_str(&self) -> &str {
        match self {
            Self::GitRefs => Self::GIT_REFS,
            Self::Other(label) => label,
        }
    }
}

impl std::fmt::Display for SyncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for SyncType {
    fn from(s: &str) -> Self {
        if s == Self::GIT_REFS {
            Self::GitRefs
        } else {
            Self::Other(s.to_string())
        }
    }
}

impl Serialize for SyncType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SyncType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Self::from(label.as_str()))
    }
}

/// One unit of queued work: sync `repo` (identified by `repo_id`) with the
/// given sync type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncJob {
    pub id: i64,
    pub repo_id: String,
    /// Clone URL or local path of the repository.
    pub repo: String,
    pub sync_type: SyncType,
    pub status: JobStatus,
}
