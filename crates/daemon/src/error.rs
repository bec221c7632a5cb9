use refsync_core::SyncJob;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Why a sync job failed. Every variant names the job and repository; the
/// underlying cause is available through `source()`.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("job {job_id} (repo {repo_id}): provisioning workspace failed")]
    Provision {
        job_id: i64,
        repo_id: String,
        #[source]
        source: BoxError,
    },

    #[error("job {job_id} (repo {repo_id}): reading refs failed")]
    Extraction {
        job_id: i64,
        repo_id: String,
        #[source]
        source: BoxError,
    },

    #[error("job {job_id} (repo {repo_id}): storing refs failed")]
    Reconciliation {
        job_id: i64,
        repo_id: String,
        #[source]
        source: BoxError,
    },

    #[error("job {job_id} (repo {repo_id}): sending sync logs failed")]
    Report {
        job_id: i64,
        repo_id: String,
        #[source]
        source: BoxError,
    },

    #[error("job {job_id} (repo {repo_id}): no handler for sync type {sync_type}")]
    UnsupportedSyncType {
        job_id: i64,
        repo_id: String,
        sync_type: String,
    },
}

impl SyncError {
    pub fn provision(job: &SyncJob, source: impl Into<BoxError>) -> Self {
        Self::Provision {
            job_id: job.id,
            repo_id: job.repo_id.clone(),
            source: source.into(),
        }
    }

    pub fn extraction(job: &SyncJob, source: impl Into<BoxError>) -> Self {
        Self::Extraction {
            job_id: job.id,
            repo_id: job.repo_id.clone(),
            source: source.into(),
        }
    }

    pub fn reconciliation(job: &SyncJob, source: impl Into<BoxError>) -> Self {
        Self::Reconciliation {
            job_id: job.id,
            repo_id: job.repo_id.clone(),
            source: source.into(),
        }
    }

    pub fn report(job: &SyncJob, source: impl Into<BoxError>) -> Self {
        Self::Report {
            job_id: job.id,
            repo_id: job.repo_id.clone(),
            source: source.into(),
        }
    }

    pub fn job_id(&self) -> i64 {
        match self {
            Self::Provision { job_id, .. }
            | Self::Extraction { job_id, .. }
            | Self::Reconciliation { job_id, .. }
            | Self::Report { job_id, .. }
            | Self::UnsupportedSyncType { job_id, .. } => *job_id,
        }
    }

    /// Short stage label, used in log fields.
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Provision { .. } => "provision",
            Self::Extraction { .. } => "extraction",
            Self::Reconciliation { .. } => "reconciliation",
            Self::Report { .. } => "report",
            Self::UnsupportedSyncType { .. } => "dispatch",
        }
    }
}

/// Render an error and all of its causes on one line, `outer: inner: root`.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
