use std::path::{Path, PathBuf};

use gix::Repository;
use refsync_core::Cancellation;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use crate::error::{GitError, Result};
use crate::ops::gix_err;
use crate::url::{authenticated_url, redact_url};
use crate::WORKSPACE_PREFIX;

/// Where and how workspaces are created.
#[derive(Debug, Clone, Default)]
pub struct ProvisionOptions {
    /// Parent directory for workspaces. `None` uses the system temp dir.
    pub clone_root: Option<PathBuf>,
}

/// A disposable bare clone living in its own temp directory.
///
/// The directory is removed exactly once: by [`Workspace::cleanup`] when the
/// caller wants to observe failures, otherwise when the value is dropped.
pub struct Workspace {
    repo: Option<Repository>,
    dir: Option<TempDir>,
    path: PathBuf,
}

impl std::fmt::Debug for Workspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Workspace").field("path", &self.path).finish()
    }
}

impl Workspace {
    /// Create a temp directory and bare-clone `locator` into it.
    ///
    /// `token`, when present, authenticates HTTP(S) clones. The clone polls
    /// `cancel` and gives up once it is cancelled; the directory is removed on
    /// every failure path before returning.
    pub fn provision(
        opts: &ProvisionOptions,
        locator: &str,
        token: Option<&str>,
        cancel: &Cancellation,
    ) -> Result<Self> {
        cancel.check()?;

        let dir = create_temp_dir(opts.clone_root.as_deref())?;
        let path = dir.path().to_path_buf();
        let url = authenticated_url(locator, token);
        debug!(path = %path.display(), url = %redact_url(&url), "Cloning into workspace");

        let repo = match clone_bare(&url, &path, cancel) {
            Ok(repo) => repo,
            Err(e) => {
                if let Err(cleanup_err) = dir.close() {
                    warn!(
                        "Failed to remove workspace {} after clone error: {cleanup_err}",
                        path.display()
                    );
                }
                return Err(e);
            }
        };

        info!(path = %path.display(), "Provisioned workspace");
        Ok(Self {
            repo: Some(repo),
            dir: Some(dir),
            path,
        })
    }

    /// Use an already-open repository with a caller-owned temp directory.
    pub fn from_parts(repo: Repository, dir: TempDir) -> Self {
        let path = dir.path().to_path_buf();
        Self {
            repo: Some(repo),
            dir: Some(dir),
            path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn repo(&self) -> &Repository {
        self.repo
            .as_ref()
            .expect("workspace repository is only released by cleanup")
    }

    /// Release the repository handle and remove the directory.
    pub fn cleanup(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        drop(self.repo.take());
        match self.dir.take() {
            Some(dir) => {
                dir.close()?;
                debug!(path = %self.path.display(), "Removed workspace");
                Ok(())
            }
            None => Ok(()),
        }
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            warn!("Failed to remove workspace {}: {e}", self.path.display());
        }
    }
}

fn create_temp_dir(root: Option<&Path>) -> Result<TempDir> {
    let mut builder = tempfile::Builder::new();
    builder.prefix(WORKSPACE_PREFIX);
    let dir = match root {
        Some(root) => {
            std::fs::create_dir_all(root)?;
            builder.tempdir_in(root)?
        }
        None => builder.tempdir()?,
    };
    Ok(dir)
}

fn clone_bare(url: &str, path: &Path, cancel: &Cancellation) -> Result<Repository> {
    let parsed = gix::url::parse(url.into())
        .map_err(|e| GitError::InvalidLocator(format!("{}: {e}", redact_url(url))))?;
    let mut prepare = gix::prepare_clone_bare(parsed, path).map_err(gix_err)?;
    let result = prepare.fetch_only(gix::progress::Discard, cancel.flag());
    cancel.check()?;
    let (repo, _outcome) = result.map_err(gix_err)?;
    Ok(repo)
}
