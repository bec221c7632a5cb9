pub mod cancel;
pub mod git_ref;
pub mod job;
pub mod sync_log;

pub use cancel::{Cancellation, Interrupted};
pub use git_ref::{GitRef, RefKind};
pub use job::{JobStatus, ParseEnumError, SyncJob, SyncType};
pub use sync_log::{SyncLogEntry, SyncLogType};

#[cfg(any(test, feature = "testing"))]
pub mod testing;
