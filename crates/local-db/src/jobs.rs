//! Repositories and the sync job queue.

use anyhow::{Context, Result, bail};
use refsync_core::{JobStatus, SyncJob, SyncType};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params, params_from_iter};
use sea_query::{Expr, Order, Query, SqliteQueryBuilder};

use crate::SyncDb;
use crate::tables::{Repos, SyncJobs};
use crate::values::{Built, values_to_sql};

const NOW: &str = "strftime('%Y-%m-%dT%H:%M:%fZ', 'now')";

/// Select a job joined with its repository locator.
fn select_job() -> sea_query::SelectStatement {
    Query::select()
        .column((SyncJobs::Table, SyncJobs::Id))
        .column((SyncJobs::Table, SyncJobs::RepoId))
        .column((Repos::Table, Repos::Repo))
        .column((SyncJobs::Table, SyncJobs::SyncType))
        .column((SyncJobs::Table, SyncJobs::Status))
        .from(SyncJobs::Table)
        .inner_join(
            Repos::Table,
            Expr::col((Repos::Table, Repos::Id)).equals((SyncJobs::Table, SyncJobs::RepoId)),
        )
        .to_owned()
}

pub fn get_job(job_id: i64) -> Built {
    select_job()
        .and_where(Expr::col((SyncJobs::Table, SyncJobs::Id)).eq(job_id))
        .build(SqliteQueryBuilder)
}

/// Oldest pending job, FIFO by creation time then id.
pub fn next_pending_job() -> Built {
    select_job()
        .and_where(Expr::col((SyncJobs::Table, SyncJobs::Status)).eq(JobStatus::Pending.as_str()))
        .order_by((SyncJobs::Table, SyncJobs::CreatedAt), Order::Asc)
        .order_by((SyncJobs::Table, SyncJobs::Id), Order::Asc)
        .limit(1)
        .build(SqliteQueryBuilder)
}

/// Set `status`; terminal statuses also stamp `done_at`, `RUNNING` stamps `started_at`.
pub fn set_status(job_id: i64, status: JobStatus) -> Built {
    let mut update = Query::update();
    update
        .table(SyncJobs::Table)
        .value(SyncJobs::Status, status.as_str());
    match status {
        JobStatus::Running => {
            update.value(SyncJobs::StartedAt, Expr::cust(NOW));
        }
        JobStatus::Done | JobStatus::Failed => {
            update.value(SyncJobs::DoneAt, Expr::cust(NOW));
        }
        JobStatus::Pending => {}
    }
    update
        .and_where(Expr::col(SyncJobs::Id).eq(job_id))
        .build(SqliteQueryBuilder)
}

pub fn get_repo_locator(repo_id: &str) -> Built {
    Query::select()
        .column(Repos::Repo)
        .from(Repos::Table)
        .and_where(Expr::col(Repos::Id).eq(repo_id))
        .build(SqliteQueryBuilder)
}

fn row_to_job(row: &rusqlite::Row) -> rusqlite::Result<SyncJob> {
    let sync_type: String = row.get(3)?;
    let status: String = row.get(4)?;
    let status = status.parse::<JobStatus>().map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
    })?;
    Ok(SyncJob {
        id: row.get(0)?,
        repo_id: row.get(1)?,
        repo: row.get(2)?,
        sync_type: SyncType::from(sync_type.as_str()),
        status,
    })
}

/// Update a job's status on `conn`, which may be an open transaction.
///
/// Fails when no job has `job_id`, so a status write never silently misses.
pub fn set_job_status_on(conn: &Connection, job_id: i64, status: JobStatus) -> Result<()> {
    let (sql, values) = set_status(job_id, status);
    let updated = conn.execute(&sql, params_from_iter(values_to_sql(&values)?))?;
    if updated == 0 {
        bail!("sync job {job_id} not found");
    }
    Ok(())
}

impl SyncDb {
    // ── Repositories ───────────────────────────────────────────────────

    pub fn upsert_repo(&self, repo_id: &str, locator: &str) -> Result<()> {
        self.conn().execute(
            "INSERT INTO repos (id, repo) VALUES (?1, ?2) \
             ON CONFLICT(id) DO UPDATE SET repo = excluded.repo",
            params![repo_id, locator],
        )?;
        Ok(())
    }

    pub fn repo_locator(&self, repo_id: &str) -> Result<Option<String>> {
        let (sql, values) = get_repo_locator(repo_id);
        let locator = self
            .conn()
            .query_row(&sql, params_from_iter(values_to_sql(&values)?), |row| {
                row.get(0)
            })
            .optional()?;
        Ok(locator)
    }

    // ── Queue ──────────────────────────────────────────────────────────

    /// Queue a job for `repo_id`; returns the new job id.
    pub fn enqueue_job(&self, repo_id: &str, sync_type: &SyncType) -> Result<i64> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO sync_jobs (repo_id, sync_type, status) VALUES (?1, ?2, ?3)",
            params![repo_id, sync_type.as_str(), JobStatus::Pending.as_str()],
        )
        .with_context(|| format!("enqueue {sync_type} job for repo {repo_id}"))?;
        Ok(conn.last_insert_rowid())
    }

    /// Claim the oldest pending job, moving it to `RUNNING`.
    ///
    /// Select and update run in one immediate transaction, so two workers
    /// never claim the same job.
    pub fn dequeue_job(&self) -> Result<Option<SyncJob>> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let (sql, values) = next_pending_job();
        let job = tx
            .query_row(&sql, params_from_iter(values_to_sql(&values)?), row_to_job)
            .optional()?;
        let Some(mut job) = job else {
            tx.commit()?;
            return Ok(None);
        };
        set_job_status_on(&tx, job.id, JobStatus::Running)?;
        tx.commit()?;
        job.status = JobStatus::Running;
        Ok(Some(job))
    }

    pub fn get_job(&self, job_id: i64) -> Result<Option<SyncJob>> {
        let (sql, values) = get_job(job_id);
        let job = self
            .conn()
            .query_row(&sql, params_from_iter(values_to_sql(&values)?), row_to_job)
            .optional()?;
        Ok(job)
    }

    pub fn set_job_status(&self, job_id: i64, status: JobStatus) -> Result<()> {
        set_job_status_on(&self.conn(), job_id, status)
    }
}
