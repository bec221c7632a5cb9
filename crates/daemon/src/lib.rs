//! Worker that mirrors the git refs of queued repositories into SQLite.
//!
//! Jobs are read from the `sync_jobs` queue in [`refsync_local_db::SyncDb`]
//! and dispatched by sync type; `GIT_REFS` jobs run through
//! [`syncer::GitRefsSyncer`].

pub mod config;
pub mod credentials;
pub mod error;
pub mod provision;
pub mod reporter;
pub mod scheduler;
pub mod syncer;

pub use error::{SyncError, error_chain};
pub use scheduler::{RunStats, Worker, run_scheduler};
pub use syncer::{GitRefsSyncer, SyncOutcome};
