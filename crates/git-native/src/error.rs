use std::path::PathBuf;

use refsync_core::Interrupted;

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("not a git repository: {0}")]
    NotARepo(PathBuf),

    #[error("invalid repository locator: {0}")]
    InvalidLocator(String),

    #[error("git error: {0}")]
    Gix(Box<dyn std::error::Error + Send + Sync>),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("interrupted: {0}")]
    Interrupted(#[from] Interrupted),
}

pub type Result<T> = std::result::Result<T, GitError>;
