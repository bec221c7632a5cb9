//! Stored git refs and the all-or-nothing ref set replacement.

use anyhow::{Context, Result};
use refsync_core::{Cancellation, GitRef, JobStatus, RefKind};
use rusqlite::{Connection, TransactionBehavior, params, params_from_iter};
use sea_query::{Expr, Func, Order, Query, SqliteQueryBuilder};
use tracing::{debug, warn};

use crate::SyncDb;
use crate::jobs::set_job_status_on;
use crate::tables::GitRefs;
use crate::values::{Built, values_to_sql};

/// Rows inserted between two cancellation checks during the bulk insert.
pub const CANCEL_CHECK_INTERVAL: usize = 500;

const INSERT_REF: &str = "INSERT INTO git_refs \
     (repo_id, full_name, name, hash, remote, target, type, tag_commit_hash) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Row counts of a staged replacement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaceOutcome {
    pub deleted: usize,
    pub inserted: usize,
}

pub fn delete_repo_refs(repo_id: &str) -> Built {
    Query::delete()
        .from_table(GitRefs::Table)
        .and_where(Expr::col(GitRefs::RepoId).eq(repo_id))
        .build(SqliteQueryBuilder)
}

pub fn list_repo_refs(repo_id: &str) -> Built {
    Query::select()
        .columns([
            GitRefs::FullName,
            GitRefs::Name,
            GitRefs::Hash,
            GitRefs::Remote,
            GitRefs::Target,
            GitRefs::Type,
            GitRefs::TagCommitHash,
        ])
        .from(GitRefs::Table)
        .and_where(Expr::col(GitRefs::RepoId).eq(repo_id))
        .order_by(GitRefs::FullName, Order::Asc)
        .build(SqliteQueryBuilder)
}

pub fn count_repo_refs(repo_id: &str) -> Built {
    Query::select()
        .expr(Func::count(Expr::col(GitRefs::FullName)))
        .from(GitRefs::Table)
        .and_where(Expr::col(GitRefs::RepoId).eq(repo_id))
        .build(SqliteQueryBuilder)
}

fn row_to_git_ref(row: &rusqlite::Row) -> rusqlite::Result<GitRef> {
    let kind: Option<String> = row.get(5)?;
    let kind = kind
        .map(|k| k.parse::<RefKind>())
        .transpose()
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;
    Ok(GitRef {
        full_name: row.get(0)?,
        name: row.get(1)?,
        hash: row.get(2)?,
        remote: row.get(3)?,
        target: row.get(4)?,
        kind,
        tag_commit_hash: row.get(6)?,
    })
}

/// Bulk-load `refs` through one cached statement. Absent fields bind as NULL.
fn insert_refs(
    conn: &Connection,
    repo_id: &str,
    refs: &[GitRef],
    cancel: &Cancellation,
) -> Result<usize> {
    let mut stmt = conn.prepare_cached(INSERT_REF)?;
    for (i, r) in refs.iter().enumerate() {
        if i > 0 && i % CANCEL_CHECK_INTERVAL == 0 {
            cancel.check()?;
        }
        stmt.execute(params![
            repo_id,
            &r.full_name,
            &r.name,
            &r.hash,
            &r.remote,
            &r.target,
            r.kind.as_ref().map(RefKind::as_str),
            &r.tag_commit_hash,
        ])
        .with_context(|| format!("insert ref {}", r.full_name))?;
    }
    Ok(refs.len())
}

fn stage_replacement(
    conn: &Connection,
    repo_id: &str,
    refs: &[GitRef],
    job_id: i64,
    cancel: &Cancellation,
) -> Result<ReplaceOutcome> {
    cancel.check()?;
    let (sql, values) = delete_repo_refs(repo_id);
    let deleted = conn
        .execute(&sql, params_from_iter(values_to_sql(&values)?))
        .with_context(|| format!("delete refs of repo {repo_id}"))?;

    let inserted = insert_refs(conn, repo_id, refs, cancel)?;
    debug!(repo_id, deleted, inserted, "Staged ref replacement");

    set_job_status_on(conn, job_id, JobStatus::Done)?;
    Ok(ReplaceOutcome { deleted, inserted })
}

impl SyncDb {
    /// Replace every stored ref of `repo_id` with `refs` and mark `job_id`
    /// `DONE`, all in one immediate transaction.
    ///
    /// `before_commit` runs after the rows and the status are staged; if it
    /// fails, or `cancel` fires, everything is rolled back. It must not use
    /// this `SyncDb`, whose connection is held for the whole transaction.
    ///
    /// On failure the error from the failing step is returned; a failed
    /// rollback is only logged.
    pub fn replace_refs<F>(
        &self,
        repo_id: &str,
        refs: &[GitRef],
        job_id: i64,
        cancel: &Cancellation,
        before_commit: F,
    ) -> Result<ReplaceOutcome>
    where
        F: FnOnce(&ReplaceOutcome) -> Result<()>,
    {
        let mut conn = self.conn();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .with_context(|| format!("begin ref replacement for repo {repo_id}"))?;

        let staged = stage_replacement(&tx, repo_id, refs, job_id, cancel).and_then(|outcome| {
            before_commit(&outcome)?;
            cancel.check()?;
            Ok(outcome)
        });

        match staged {
            Ok(outcome) => {
                tx.commit()
                    .with_context(|| format!("commit ref replacement for repo {repo_id}"))?;
                Ok(outcome)
            }
            Err(e) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!(repo_id, "Could not roll back ref replacement: {rollback_err}");
                }
                Err(e)
            }
        }
    }

    /// Stored refs of `repo_id`, ordered by full name.
    pub fn list_refs(&self, repo_id: &str) -> Result<Vec<GitRef>> {
        let (sql, values) = list_repo_refs(repo_id);
        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(params_from_iter(values_to_sql(&values)?), row_to_git_ref)?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row?);
        }
        Ok(result)
    }

    pub fn count_refs(&self, repo_id: &str) -> Result<usize> {
        let (sql, values) = count_repo_refs(repo_id);
        let count: i64 =
            self.conn()
                .query_row(&sql, params_from_iter(values_to_sql(&values)?), |row| {
                    row.get(0)
                })?;
        Ok(count as usize)
    }
}
