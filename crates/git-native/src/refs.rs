use std::collections::HashSet;

use gix::Repository;
use gix::refs::{Category, TargetRef};
use refsync_core::{GitRef, RefKind};
use tracing::{debug, warn};

use crate::error::{GitError, Result};
use crate::ops::{self, gix_err};

/// Read every reference under `refs/` from `repo`, in the order the ref store
/// yields them.
///
/// Tags get `tag_commit_hash` set to the commit reached by peeling the tag
/// chain. When the chain does not end at a commit (a tag of a tree or blob, or
/// a tag object missing from the clone) the ref's own `hash` is used instead,
/// so the value is the best available commit, not a guaranteed one.
///
/// Symbolic refs whose target does not exist (e.g. `origin/HEAD` of a clone
/// of an empty repository, pointing at an unborn branch) are skipped. An
/// empty repository therefore yields an empty list.
pub fn extract_refs(repo: &Repository) -> Result<Vec<GitRef>> {
    let remotes: Vec<String> = repo
        .remote_names()
        .iter()
        .map(|name| name.to_string())
        .collect();

    let platform = repo.references().map_err(gix_err)?;
    let mut seen = HashSet::new();
    let mut refs = Vec::new();

    for reference in platform.all().map_err(gix_err)? {
        let reference = reference.map_err(GitError::Gix)?;
        if is_dangling_symbolic(repo, &reference)? {
            debug!(
                full_name = %reference.name().as_bstr(),
                "Skipping symbolic ref to unborn target"
            );
            continue;
        }
        let git_ref = to_git_ref(repo, &reference, &remotes);
        if !seen.insert(git_ref.full_name.clone()) {
            warn!(full_name = %git_ref.full_name, "Skipping duplicate reference");
            continue;
        }
        refs.push(git_ref);
    }

    debug!(count = refs.len(), "Extracted references");
    Ok(refs)
}

fn is_dangling_symbolic(repo: &Repository, reference: &gix::Reference<'_>) -> Result<bool> {
    let TargetRef::Symbolic(target) = reference.target() else {
        return Ok(false);
    };
    let target = target.as_bstr().to_string();
    let found = repo.try_find_reference(target.as_str()).map_err(gix_err)?;
    Ok(found.is_none())
}

fn to_git_ref(repo: &Repository, reference: &gix::Reference<'_>, remotes: &[String]) -> GitRef {
    let name = reference.name();
    let full_name = name.as_bstr().to_string();
    let short_name = name.shorten().to_string();

    let kind = match name.category() {
        Some(Category::LocalBranch) => Some(RefKind::Branch),
        Some(Category::RemoteBranch) => Some(RefKind::Remote),
        Some(Category::Tag) => Some(RefKind::Tag),
        Some(Category::Note) => Some(RefKind::Note),
        _ => None,
    };

    let (hash, target) = match reference.target() {
        TargetRef::Object(id) => (Some(id.to_owned()), None),
        TargetRef::Symbolic(target) => (None, Some(target.as_bstr().to_string())),
    };

    let remote = match kind {
        Some(RefKind::Remote) => ops::remote_for_short_name(&short_name, remotes),
        _ => None,
    };

    let tag_commit_hash = match kind {
        Some(RefKind::Tag) => hash
            .and_then(|id| ops::peel_to_commit_id(repo, id))
            .or(hash)
            .map(|id| id.to_string()),
        _ => None,
    };

    GitRef {
        full_name,
        name: short_name,
        hash: hash.map(|id| id.to_string()),
        remote,
        target,
        kind,
        tag_commit_hash,
    }
}
