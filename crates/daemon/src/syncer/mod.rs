//! Job handlers, one per sync type.

pub mod git_refs;

pub use git_refs::{GitRefsSyncer, SyncOutcome};
