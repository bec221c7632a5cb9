use refsync_core::Cancellation;
use refsync_git_native::{GitError, ProvisionOptions, Workspace};

/// Produces a disposable workspace for a repository locator.
pub trait Provisioner: Send + Sync {
    fn provision(
        &self,
        locator: &str,
        token: Option<&str>,
        cancel: &Cancellation,
    ) -> Result<Workspace, GitError>;
}

/// Bare-clones the repository into a fresh temp directory.
#[derive(Debug, Clone, Default)]
pub struct CloneProvisioner {
    pub options: ProvisionOptions,
}

impl CloneProvisioner {
    pub fn new(options: ProvisionOptions) -> Self {
        Self { options }
    }
}

impl Provisioner for CloneProvisioner {
    fn provision(
        &self,
        locator: &str,
        token: Option<&str>,
        cancel: &Cancellation,
    ) -> Result<Workspace, GitError> {
        Workspace::provision(&self.options, locator, token, cancel)
    }
}
