use anyhow::Result;
use refsync_core::{Cancellation, JobStatus, SyncJob, SyncLogEntry, SyncType};
use refsync_git_native::ProvisionOptions;
use refsync_local_db::SyncDb;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::config::WorkerConfig;
use crate::credentials::{CredentialSource, StaticToken};
use crate::error::{SyncError, error_chain};
use crate::provision::{CloneProvisioner, Provisioner};
use crate::reporter::{JsonlLogSink, LogSink, ProgressReporter, TracingLogSink};
use crate::syncer::{GitRefsSyncer, SyncOutcome};

/// Everything needed to run jobs: the queue database, the workspace
/// provisioner, credentials and the log reporter.
pub struct Worker {
    config: WorkerConfig,
    db: Arc<SyncDb>,
    provisioner: Arc<dyn Provisioner>,
    credentials: Arc<dyn CredentialSource>,
    reporter: ProgressReporter,
}

impl Worker {
    pub fn new(
        config: WorkerConfig,
        db: Arc<SyncDb>,
        provisioner: Arc<dyn Provisioner>,
        credentials: Arc<dyn CredentialSource>,
        reporter: ProgressReporter,
    ) -> Self {
        Self {
            config,
            db,
            provisioner,
            credentials,
            reporter,
        }
    }

    /// Build a worker from config: bare clones under `[git] clone_path`,
    /// the static token when configured (else the database), and a JSONL
    /// sink when `[logs] path` is set (else tracing).
    pub fn from_config(config: WorkerConfig) -> Result<Self> {
        let db = Arc::new(SyncDb::open_with_timeout(
            &config.database.path,
            config.database.busy_timeout(),
        )?);
        let provisioner = Arc::new(CloneProvisioner::new(ProvisionOptions {
            clone_root: config.git.clone_path.clone(),
        }));
        let credentials: Arc<dyn CredentialSource> = match &config.credentials.token {
            Some(token) => Arc::new(StaticToken(Some(token.clone()))),
            None => Arc::clone(&db) as Arc<dyn CredentialSource>,
        };
        let sink: Arc<dyn LogSink> = match &config.logs.path {
            Some(path) => Arc::new(JsonlLogSink::new(path)),
            None => Arc::new(TracingLogSink),
        };
        Ok(Self::new(
            config,
            db,
            provisioner,
            credentials,
            ProgressReporter::new(sink),
        ))
    }

    pub fn db(&self) -> &SyncDb {
        &self.db
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// How long a job's connection waits on another writer's lock: the time
    /// left before the job's deadline, never less than the configured
    /// `busy_timeout`.
    ///
    /// rusqlite only takes a plain `fn` as busy handler, so the deadline is
    /// applied by sizing the timeout rather than checked inside the handler.
    pub fn job_busy_timeout(&self, cancel: &Cancellation) -> Duration {
        let configured = self.config.database.busy_timeout();
        cancel
            .deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
            .map_or(configured, |remaining| remaining.max(configured))
    }

    /// Dispatch `job` to the handler for its sync type.
    ///
    /// Each job gets its own connection so a long ref transaction never
    /// holds the queue connection.
    pub fn process_job(
        &self,
        job: &SyncJob,
        cancel: &Cancellation,
    ) -> Result<SyncOutcome, SyncError> {
        match &job.sync_type {
            SyncType::GitRefs => {
                let db = SyncDb::open_with_timeout(self.db.path(), self.job_busy_timeout(cancel))
                    .map_err(|e| SyncError::reconciliation(job, e))?;
                GitRefsSyncer::new(
                    &db,
                    self.provisioner.as_ref(),
                    self.credentials.as_ref(),
                    &self.reporter,
                )
                .handle(job, cancel)
            }
            SyncType::Other(label) => Err(SyncError::UnsupportedSyncType {
                job_id: job.id,
                repo_id: job.repo_id.clone(),
                sync_type: label.clone(),
            }),
        }
    }

    /// Run `job` and record its outcome.
    ///
    /// A successful job is already `DONE`. A failed one gets an `ERROR` log
    /// entry and is marked `FAILED`; a cleanup warning gets a `WARNING` entry.
    pub fn execute_job(
        &self,
        job: &SyncJob,
        cancel: &Cancellation,
    ) -> Result<SyncOutcome, SyncError> {
        let result = self.process_job(job, cancel);
        match &result {
            Ok(outcome) => {
                info!(
                    job_id = job.id,
                    repo_id = %job.repo_id,
                    refs = outcome.ref_count,
                    "Sync job done"
                );
                if let Some(warning) = &outcome.cleanup_warning {
                    self.reporter
                        .report_best_effort(&[SyncLogEntry::warning(job.id, warning.clone())]);
                }
            }
            Err(e) => {
                let chain = error_chain(e);
                error!(job_id = job.id, stage = e.stage(), "Sync job failed: {chain}");
                self.reporter
                    .report_best_effort(&[SyncLogEntry::error(job.id, chain)]);
                self.mark_failed(job.id);
            }
        }
        result
    }

    fn mark_failed(&self, job_id: i64) {
        if let Err(e) = self.db.set_job_status(job_id, JobStatus::Failed) {
            error!(job_id, "Could not mark job failed: {e:#}");
        }
    }
}

/// Jobs finished by one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub done: usize,
    pub failed: usize,
}

/// Poll the queue and run up to `worker.concurrency` jobs at once until
/// shutdown is signalled. With `once`, return as soon as the queue is empty
/// and every started job has finished.
///
/// On shutdown, running jobs are cancelled and awaited.
pub async fn run_scheduler(
    worker: Arc<Worker>,
    mut shutdown: watch::Receiver<bool>,
    once: bool,
) -> RunStats {
    let settings = worker.config().worker.clone();
    let concurrency = settings.concurrency.max(1);
    let job_timeout = settings.job_timeout();

    let mut stats = RunStats::default();
    let mut running: JoinSet<bool> = JoinSet::new();
    let mut tick = tokio::time::interval(settings.poll_interval());
    let mut drained = false;

    loop {
        tokio::select! {
            _ = tick.tick() => {
                drained =
                    spawn_ready_jobs(&worker, &mut running, concurrency, job_timeout, &shutdown)
                        .await;
            }

            Some(joined) = running.join_next() => {
                record(&mut stats, joined);
                drained =
                    spawn_ready_jobs(&worker, &mut running, concurrency, job_timeout, &shutdown)
                        .await;
            }

            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!("Scheduler shutting down");
                    break;
                }
            }
        }

        if once && drained && running.is_empty() {
            debug!("Queue drained");
            break;
        }
    }

    // Job tasks watch the same shutdown channel and cancel themselves.
    while let Some(joined) = running.join_next().await {
        record(&mut stats, joined);
    }
    info!(done = stats.done, failed = stats.failed, "Scheduler stopped");
    stats
}

/// Start pending jobs until the concurrency limit is reached. Returns `true`
/// when the queue had no pending job left.
///
/// Dequeuing may wait on the database lock, so it runs on the blocking pool.
async fn spawn_ready_jobs(
    worker: &Arc<Worker>,
    running: &mut JoinSet<bool>,
    concurrency: usize,
    job_timeout: Duration,
    shutdown: &watch::Receiver<bool>,
) -> bool {
    while running.len() < concurrency {
        let queue = Arc::clone(worker);
        let dequeued = match tokio::task::spawn_blocking(move || queue.db().dequeue_job()).await {
            Ok(dequeued) => dequeued,
            Err(e) => {
                error!("Dequeue task failed: {e}");
                return false;
            }
        };
        match dequeued {
            Ok(Some(job)) => {
                debug!(job_id = job.id, sync_type = %job.sync_type, "Dequeued job");
                running.spawn(run_job(
                    Arc::clone(worker),
                    job,
                    job_timeout,
                    shutdown.clone(),
                ));
            }
            Ok(None) => return true,
            Err(e) => {
                error!("Failed to dequeue job: {e:#}");
                return false;
            }
        }
    }
    false
}

/// Run one job on the blocking pool, cancelling it at its deadline or on
/// shutdown. Returns whether the job succeeded.
async fn run_job(
    worker: Arc<Worker>,
    job: SyncJob,
    timeout: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> bool {
    let job_id = job.id;
    let cancel = Cancellation::new().with_timeout(timeout);
    let job_cancel = cancel.clone();
    let job_worker = Arc::clone(&worker);
    let mut handle = tokio::task::spawn_blocking(move || {
        job_worker.execute_job(&job, &job_cancel).is_ok()
    });

    let joined = tokio::select! {
        joined = &mut handle => joined,
        _ = tokio::time::sleep(timeout) => {
            warn!(job_id, "Job deadline reached, cancelling");
            cancel.cancel();
            handle.await
        }
        _ = shutdown_requested(&mut shutdown) => {
            info!(job_id, "Cancelling job for shutdown");
            cancel.cancel();
            handle.await
        }
    };

    match joined {
        Ok(ok) => ok,
        Err(e) => {
            error!(job_id, "Job task panicked: {e}");
            worker.mark_failed(job_id);
            false
        }
    }
}

async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    if shutdown.wait_for(|stop| *stop).await.is_err() {
        // Sender gone: nobody can ask for shutdown any more.
        std::future::pending::<()>().await;
    }
}

fn record(stats: &mut RunStats, joined: Result<bool, tokio::task::JoinError>) {
    match joined {
        Ok(true) => stats.done += 1,
        Ok(false) => stats.failed += 1,
        Err(e) => {
            error!("Job supervisor task failed: {e}");
            stats.failed += 1;
        }
    }
}
