pub mod credentials;
pub mod jobs;
pub mod migrations;
pub mod refs;
pub mod tables;
pub mod values;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

pub use refs::ReplaceOutcome;

/// Default time a connection waits for another writer before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// SQLite store holding repositories, the sync job queue, credentials and
/// the synced git refs.
///
/// Thread-safe: wraps the connection in a Mutex so it can be shared via
/// `Arc<SyncDb>`. Jobs running in parallel should each open their own
/// `SyncDb` on the same path; WAL mode lets readers proceed while one of them
/// holds the write transaction.
pub struct SyncDb {
    conn: Mutex<Connection>,
    path: PathBuf,
}

impl SyncDb {
    /// Open (or create) the database at `path` and apply pending migrations.
    pub fn open_path(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create dir for {}", path.display()))?;
            }
        }
        let conn =
            Connection::open(path).with_context(|| format!("open db {}", path.display()))?;
        conn.busy_timeout(busy_timeout)?;
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().expect("sync db mutex poisoned")
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_and_schema() {
        let (_dir, db) = test_support::test_db();
        let tables: Vec<String> = {
            let conn = db.conn();
            let mut stmt = conn
                .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
                .unwrap();
            stmt.query_map([], |row| row.get(0))
                .unwrap()
                .collect::<rusqlite::Result<_>>()
                .unwrap()
        };
        for table in ["git_refs", "repos", "service_auth_credentials", "sync_jobs"] {
            assert!(tables.iter().any(|t| t == table), "missing table {table}");
        }
    }

    #[test]
    fn test_reopen_keeps_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sync.db");
        {
            let db = SyncDb::open_path(&path).unwrap();
            db.upsert_repo("r1", "https://github.com/acme/widgets").unwrap();
        }
        let db = SyncDb::open_path(&path).unwrap();
        assert_eq!(
            db.repo_locator("r1").unwrap().as_deref(),
            Some("https://github.com/acme/widgets")
        );
    }
}
