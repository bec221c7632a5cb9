use anyhow::Result;
use refsync_core::SyncJob;
use refsync_local_db::SyncDb;
use refsync_local_db::credentials::GITHUB_PAT;

/// Supplies the access token used to clone a job's repository.
///
/// `Ok(None)` means no token is configured and the clone is attempted
/// anonymously. Tokens are looked up per job and never cached here.
pub trait CredentialSource: Send + Sync {
    fn access_token(&self, job: &SyncJob) -> Result<Option<String>>;
}

/// Newest GitHub token stored in the database.
impl CredentialSource for SyncDb {
    fn access_token(&self, _job: &SyncJob) -> Result<Option<String>> {
        self.latest_credential(GITHUB_PAT)
    }
}

/// A fixed token, e.g. from the worker config.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(pub Option<String>);

impl CredentialSource for StaticToken {
    fn access_token(&self, _job: &SyncJob) -> Result<Option<String>> {
        Ok(self.0.clone())
    }
}
