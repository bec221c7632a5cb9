pub mod error;
pub mod ops;
pub mod refs;
pub mod url;
pub mod workspace;

#[cfg(any(test, feature = "testing"))]
pub mod test_utils;

pub use error::{GitError, Result};
pub use refs::extract_refs;
pub use url::authenticated_url;
pub use workspace::{ProvisionOptions, Workspace};

/// Username paired with an access token in authenticated clone URLs.
pub const TOKEN_USERNAME: &str = "x-access-token";

/// Prefix of every provisioned workspace directory.
pub const WORKSPACE_PREFIX: &str = "refsync-repo-";
