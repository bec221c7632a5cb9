use crate::{GitRef, JobStatus, RefKind, SyncJob, SyncType};

/// Local branch `refs/heads/<name>` at `hash`.
pub fn branch(name: &str, hash: &str) -> GitRef {
    GitRef {
        full_name: format!("refs/heads/{name}"),
        name: name.to_string(),
        hash: Some(hash.to_string()),
        remote: None,
        target: None,
        kind: Some(RefKind::Branch),
        tag_commit_hash: None,
    }
}

/// Remote-tracking ref `refs/remotes/<remote>/<name>` at `hash`.
pub fn remote_branch(remote: &str, name: &str, hash: &str) -> GitRef {
    GitRef {
        full_name: format!("refs/remotes/{remote}/{name}"),
        name: format!("{remote}/{name}"),
        hash: Some(hash.to_string()),
        remote: Some(remote.to_string()),
        target: None,
        kind: Some(RefKind::Remote),
        tag_commit_hash: None,
    }
}

/// Tag `refs/tags/<name>` whose ref points at `hash` and peels to `commit`.
pub fn tag(name: &str, hash: &str, commit: &str) -> GitRef {
    GitRef {
        full_name: format!("refs/tags/{name}"),
        name: name.to_string(),
        hash: Some(hash.to_string()),
        remote: None,
        target: None,
        kind: Some(RefKind::Tag),
        tag_commit_hash: Some(commit.to_string()),
    }
}

/// Symbolic ref `full_name` pointing at `target`.
pub fn symbolic(full_name: &str, name: &str, target: &str) -> GitRef {
    GitRef {
        full_name: full_name.to_string(),
        name: name.to_string(),
        hash: None,
        remote: None,
        target: Some(target.to_string()),
        kind: None,
        tag_commit_hash: None,
    }
}

/// A running `GIT_REFS` job.
pub fn git_refs_job(id: i64, repo_id: &str, repo: &str) -> SyncJob {
    SyncJob {
        id,
        repo_id: repo_id.to_string(),
        repo: repo.to_string(),
        sync_type: SyncType::GitRefs,
        status: JobStatus::Running,
    }
}
