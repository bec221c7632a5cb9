use std::path::Path;

/// Run `git` in `dir` and return trimmed stdout. Panics on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .env("GIT_AUTHOR_DATE", "2024-01-01T00:00:00Z")
        .env("GIT_COMMITTER_DATE", "2024-01-01T00:00:00Z")
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn git {args:?}: {e}"));
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize an empty git repository (no commits) on branch `main`.
pub fn init_empty_repo(dir: &Path) {
    git(dir, &["init", "--initial-branch=main"]);
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test"]);
    git(dir, &["config", "tag.gpgSign", "false"]);
    git(dir, &["config", "commit.gpgSign", "false"]);
}

/// Initialize a git repository with one commit on `main`; returns its id.
pub fn init_test_repo(dir: &Path) -> String {
    init_empty_repo(dir);
    commit_file(dir, "README", "test repo", "init")
}

/// Write `name` with `body`, commit it, and return the new commit id.
pub fn commit_file(dir: &Path, name: &str, body: &str, message: &str) -> String {
    std::fs::write(dir.join(name), body).expect("write fixture file");
    git(dir, &["add", "."]);
    git(dir, &["commit", "-m", message]);
    git(dir, &["rev-parse", "HEAD"])
}

/// Create annotated tag `name` at HEAD; returns `(tag_object_id, commit_id)`.
pub fn annotated_tag(dir: &Path, name: &str) -> (String, String) {
    git(dir, &["tag", "-a", name, "-m", &format!("release {name}")]);
    let tag_object = git(dir, &["rev-parse", &format!("refs/tags/{name}")]);
    let commit = git(dir, &["rev-parse", &format!("refs/tags/{name}^{{commit}}")]);
    (tag_object, commit)
}

/// Create lightweight tag `name` at HEAD; returns the commit id.
pub fn lightweight_tag(dir: &Path, name: &str) -> String {
    git(dir, &["tag", name]);
    git(dir, &["rev-parse", &format!("refs/tags/{name}")])
}
