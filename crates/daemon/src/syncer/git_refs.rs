use refsync_core::{Cancellation, SyncJob, SyncLogEntry};
use refsync_git_native::{Workspace, extract_refs};
use refsync_local_db::SyncDb;
use tracing::{info, info_span, warn};

use crate::credentials::CredentialSource;
use crate::error::SyncError;
use crate::provision::Provisioner;
use crate::reporter::{ProgressReporter, SinkError};

/// Result of a successful `GIT_REFS` job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    pub job_id: i64,
    pub ref_count: usize,
    /// Set when the workspace could not be removed. The job is still `DONE`.
    pub cleanup_warning: Option<String>,
}

/// Mirrors every ref of a job's repository into `git_refs`.
///
/// One call handles one job: provision a workspace, read its refs, replace
/// the stored set and mark the job `DONE` in one transaction. The workspace
/// is removed on every path.
pub struct GitRefsSyncer<'a> {
    db: &'a SyncDb,
    provisioner: &'a dyn Provisioner,
    credentials: &'a dyn CredentialSource,
    reporter: &'a ProgressReporter,
}

impl<'a> GitRefsSyncer<'a> {
    pub fn new(
        db: &'a SyncDb,
        provisioner: &'a dyn Provisioner,
        credentials: &'a dyn CredentialSource,
        reporter: &'a ProgressReporter,
    ) -> Self {
        Self {
            db,
            provisioner,
            credentials,
            reporter,
        }
    }

    pub fn handle(&self, job: &SyncJob, cancel: &Cancellation) -> Result<SyncOutcome, SyncError> {
        let span = info_span!("git_refs_sync", job_id = job.id, repo_id = %job.repo_id);
        let _enter = span.enter();

        let token = self
            .credentials
            .access_token(job)
            .map_err(|e| SyncError::provision(job, e))?;
        let workspace = self
            .provisioner
            .provision(&job.repo, token.as_deref(), cancel)
            .map_err(|e| SyncError::provision(job, e))?;

        let result = self.run(job, &workspace, cancel);

        let workspace_path = workspace.path().display().to_string();
        let cleanup_warning = match workspace.cleanup() {
            Ok(()) => None,
            Err(e) => {
                let message = format!("failed to remove workspace {workspace_path}: {e}");
                warn!("{message}");
                Some(message)
            }
        };

        let ref_count = result?;
        Ok(SyncOutcome {
            job_id: job.id,
            ref_count,
            cleanup_warning,
        })
    }

    fn run(
        &self,
        job: &SyncJob,
        workspace: &Workspace,
        cancel: &Cancellation,
    ) -> Result<usize, SyncError> {
        self.reporter
            .report(&[SyncLogEntry::info(
                job.id,
                format!("starting {} sync for {}", job.sync_type, job.repo),
            )])
            .map_err(|e| SyncError::report(job, e))?;

        cancel.check().map_err(|e| SyncError::extraction(job, e))?;
        let refs = extract_refs(workspace.repo()).map_err(|e| SyncError::extraction(job, e))?;
        info!("retrieved refs: {}", refs.len());

        let finished = SyncLogEntry::info(
            job.id,
            format!("finished {} sync for {}", job.sync_type, job.repo),
        );
        let outcome = self
            .db
            .replace_refs(&job.repo_id, &refs, job.id, cancel, |staged| {
                info!("sent batch of {} refs", staged.inserted);
                self.reporter.report(std::slice::from_ref(&finished))?;
                Ok(())
            })
            .map_err(|e| {
                if e.is::<SinkError>() {
                    SyncError::report(job, e)
                } else {
                    SyncError::reconciliation(job, e)
                }
            })?;

        Ok(outcome.inserted)
    }
}
