use std::path::Path;

use gix::{ObjectId, Repository};

use crate::error::{GitError, Result};

/// Wrap any gix-compatible error into [`GitError::Gix`].
pub fn gix_err(e: impl std::error::Error + Send + Sync + 'static) -> GitError {
    GitError::Gix(Box::new(e))
}

/// Open a git repository (bare or not) at `repo_path`.
///
/// Returns [`GitError::NotARepo`] when the directory does not look like a
/// repository at all.
pub fn open_repo(repo_path: &Path) -> Result<Repository> {
    let repo = gix::open(repo_path).map_err(|e| {
        if repo_path.join(".git").exists() || repo_path.join("HEAD").exists() {
            gix_err(e)
        } else {
            GitError::NotARepo(repo_path.to_path_buf())
        }
    })?;
    Ok(repo)
}

/// Follow tag objects starting at `id` and return the commit they end at.
///
/// Returns `None` when the chain ends at a tree or blob, or when an object
/// along the way is missing from the repository.
pub fn peel_to_commit_id(repo: &Repository, id: ObjectId) -> Option<ObjectId> {
    let object = repo.try_find_object(id).ok()??;
    let peeled = object.peel_tags_to_end().ok()?;
    (peeled.kind == gix::object::Kind::Commit).then_some(peeled.id)
}

/// Pick the remote a remote-tracking short name (e.g. `upstream/feature/x`)
/// belongs to: the longest configured remote name that prefixes it, or the
/// first path segment when none matches.
pub fn remote_for_short_name(short_name: &str, remotes: &[String]) -> Option<String> {
    let configured = remotes
        .iter()
        .filter(|remote| {
            short_name
                .strip_prefix(remote.as_str())
                .is_some_and(|rest| rest.starts_with('/'))
        })
        .max_by_key(|remote| remote.len());
    if let Some(remote) = configured {
        return Some(remote.clone());
    }
    short_name
        .split_once('/')
        .map(|(first, _)| first.to_string())
        .filter(|first| !first.is_empty())
}
