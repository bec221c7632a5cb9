use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use refsync_core::{
    Cancellation, GitRef, JobStatus, RefKind, SyncJob, SyncLogEntry, SyncLogType, SyncType,
};
use refsync_daemon::config::WorkerConfig;
use refsync_daemon::credentials::StaticToken;
use refsync_daemon::provision::CloneProvisioner;
use refsync_daemon::reporter::{LogSink, MemoryLogSink, ProgressReporter, SinkError};
use refsync_daemon::{GitRefsSyncer, RunStats, SyncError, SyncOutcome, Worker, run_scheduler};
use refsync_git_native::test_utils::{
    annotated_tag, commit_file, git, init_empty_repo, init_test_repo, lightweight_tag,
};
use refsync_git_native::{ProvisionOptions, WORKSPACE_PREFIX};
use refsync_local_db::SyncDb;
use tempfile::TempDir;
use tokio::sync::watch;

/// Source repo, database and clone root for one test.
struct Env {
    _root: TempDir,
    source: PathBuf,
    clone_root: PathBuf,
    db: SyncDb,
}

impl Env {
    fn new() -> Self {
        let root = tempfile::tempdir().unwrap();
        let source = root.path().join("source");
        std::fs::create_dir_all(&source).unwrap();
        let clone_root = root.path().join("clones");
        std::fs::create_dir_all(&clone_root).unwrap();
        let db = SyncDb::open_path(&root.path().join("sync.db")).unwrap();
        Self {
            _root: root,
            source,
            clone_root,
            db,
        }
    }

    fn locator(&self) -> String {
        self.source.to_str().unwrap().to_string()
    }

    fn provisioner(&self) -> CloneProvisioner {
        CloneProvisioner::new(ProvisionOptions {
            clone_root: Some(self.clone_root.clone()),
        })
    }

    /// Register the source repo under `repo_id` and claim a fresh job for it.
    fn claim_job(&self, repo_id: &str, sync_type: SyncType) -> SyncJob {
        self.db.upsert_repo(repo_id, &self.locator()).unwrap();
        self.db.enqueue_job(repo_id, &sync_type).unwrap();
        self.db.dequeue_job().unwrap().unwrap()
    }

    fn leftover_workspaces(&self) -> Vec<PathBuf> {
        std::fs::read_dir(&self.clone_root)
            .unwrap()
            .map(|entry| entry.unwrap().path())
            .collect()
    }

    fn status(&self, job_id: i64) -> JobStatus {
        self.db.get_job(job_id).unwrap().unwrap().status
    }
}

/// Fails on batches containing a message with `prefix`.
struct RejectingSink {
    prefix: &'static str,
    inner: MemoryLogSink,
}

impl LogSink for RejectingSink {
    fn send_batch(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError> {
        if entries.iter().any(|e| e.message.starts_with(self.prefix)) {
            return Err(SinkError::Unavailable("log store rejected batch".to_string()));
        }
        self.inner.send_batch(entries)
    }
}

/// Removes every workspace under `clone_root` when the completion log
/// arrives, so the syncer's own cleanup finds nothing to delete.
struct WorkspaceWipingSink {
    clone_root: PathBuf,
    inner: MemoryLogSink,
}

impl LogSink for WorkspaceWipingSink {
    fn send_batch(&self, entries: &[SyncLogEntry]) -> Result<(), SinkError> {
        if entries.iter().any(|e| e.message.starts_with("finished")) {
            for entry in std::fs::read_dir(&self.clone_root)? {
                let path = entry?.path();
                let is_workspace = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(WORKSPACE_PREFIX));
                if is_workspace {
                    std::fs::remove_dir_all(&path)?;
                }
            }
        }
        self.inner.send_batch(entries)
    }
}

fn sync(env: &Env, job: &SyncJob, reporter: &ProgressReporter) -> Result<SyncOutcome, SyncError> {
    let provisioner = env.provisioner();
    let creds = StaticToken::default();
    GitRefsSyncer::new(&env.db, &provisioner, &creds, reporter).handle(job, &Cancellation::new())
}

fn find<'a>(refs: &'a [GitRef], full_name: &str) -> &'a GitRef {
    refs.iter()
        .find(|r| r.full_name == full_name)
        .unwrap_or_else(|| panic!("missing {full_name}"))
}

/// main -> second commit, release -> first commit, annotated v1.0 on the
/// first commit, lightweight v1.1 on the second. Returns
/// `(first_commit, second_commit, v1.1_commit)`.
fn seed_tagged_repo(dir: &Path) -> (String, String, String) {
    init_test_repo(dir);
    let (_tag_object, tagged_commit) = annotated_tag(dir, "v1.0");
    let head = commit_file(dir, "CHANGES", "second", "second commit");
    let light = lightweight_tag(dir, "v1.1");
    git(dir, &["branch", "release", &tagged_commit]);
    (tagged_commit, head, light)
}

#[test]
fn full_sync_mirrors_refs_and_resolves_tags() {
    let env = Env::new();
    let (tagged_commit, head, light) = seed_tagged_repo(&env.source);
    let job = env.claim_job("repo-1", SyncType::GitRefs);
    let sink = Arc::new(MemoryLogSink::new());
    let reporter = ProgressReporter::new(sink.clone());

    let outcome = sync(&env, &job, &reporter).unwrap();
    assert_eq!(outcome.cleanup_warning, None);
    assert_eq!(env.status(job.id), JobStatus::Done);

    let refs = env.db.list_refs("repo-1").unwrap();
    assert_eq!(outcome.ref_count, refs.len());
    let unique: HashSet<&str> = refs.iter().map(|r| r.full_name.as_str()).collect();
    assert_eq!(unique.len(), refs.len());

    let main = find(&refs, "refs/heads/main");
    assert_eq!(main.kind, Some(RefKind::Branch));
    assert_eq!(main.hash.as_deref(), Some(head.as_str()));
    assert_eq!(main.remote, None);
    assert_eq!(main.target, None);
    assert_eq!(main.tag_commit_hash, None);

    let release: Vec<&GitRef> = refs
        .iter()
        .filter(|r| r.full_name.ends_with("/release"))
        .collect();
    assert!(!release.is_empty());
    for r in release {
        assert_eq!(r.hash.as_deref(), Some(tagged_commit.as_str()));
    }

    let v10 = find(&refs, "refs/tags/v1.0");
    assert_eq!(v10.kind, Some(RefKind::Tag));
    assert_ne!(v10.hash.as_deref(), Some(tagged_commit.as_str()));
    assert_eq!(v10.tag_commit_hash.as_deref(), Some(tagged_commit.as_str()));

    let v11 = find(&refs, "refs/tags/v1.1");
    assert_eq!(v11.hash.as_deref(), Some(light.as_str()));
    assert_eq!(v11.tag_commit_hash.as_deref(), Some(light.as_str()));

    let locator = env.locator();
    assert_eq!(
        sink.messages(),
        vec![
            format!("starting GIT_REFS sync for {locator}"),
            format!("finished GIT_REFS sync for {locator}"),
        ]
    );
    assert!(env.leftover_workspaces().is_empty());
}

#[test]
fn resync_is_idempotent_and_drops_stale_refs() {
    let env = Env::new();
    seed_tagged_repo(&env.source);
    let reporter = ProgressReporter::new(Arc::new(MemoryLogSink::new()));

    let first_job = env.claim_job("repo-1", SyncType::GitRefs);
    sync(&env, &first_job, &reporter).unwrap();
    let first = env.db.list_refs("repo-1").unwrap();

    let second_job = env.claim_job("repo-1", SyncType::GitRefs);
    sync(&env, &second_job, &reporter).unwrap();
    assert_eq!(env.db.list_refs("repo-1").unwrap(), first);

    git(&env.source, &["branch", "-D", "release"]);
    let third_job = env.claim_job("repo-1", SyncType::GitRefs);
    let outcome = sync(&env, &third_job, &reporter).unwrap();
    let after = env.db.list_refs("repo-1").unwrap();
    assert_eq!(outcome.ref_count, after.len());
    assert!(after.len() < first.len());
    assert!(after.iter().all(|r| !r.full_name.ends_with("/release")));
}

#[test]
fn empty_repository_syncs_to_zero_refs() {
    let env = Env::new();
    init_empty_repo(&env.source);
    let job = env.claim_job("repo-1", SyncType::GitRefs);
    env.db
        .replace_refs(
            "repo-1",
            &[refsync_core::testing::branch(
                "gone",
                "2222222222222222222222222222222222222222",
            )],
            job.id,
            &Cancellation::new(),
            |_| Ok(()),
        )
        .unwrap();
    env.db.set_job_status(job.id, JobStatus::Running).unwrap();

    let reporter = ProgressReporter::new(Arc::new(MemoryLogSink::new()));
    let outcome = sync(&env, &job, &reporter).unwrap();

    assert_eq!(outcome.ref_count, 0);
    assert!(env.db.list_refs("repo-1").unwrap().is_empty());
    assert_eq!(env.db.count_refs("repo-1").unwrap(), 0);
    assert_eq!(env.status(job.id), JobStatus::Done);
}

#[test]
fn completion_log_failure_keeps_previous_refs() {
    let env = Env::new();
    seed_tagged_repo(&env.source);
    let ok_reporter = ProgressReporter::new(Arc::new(MemoryLogSink::new()));
    let first_job = env.claim_job("repo-1", SyncType::GitRefs);
    sync(&env, &first_job, &ok_reporter).unwrap();
    let before = env.db.list_refs("repo-1").unwrap();

    git(&env.source, &["branch", "extra"]);
    let sink = Arc::new(RejectingSink {
        prefix: "finished",
        inner: MemoryLogSink::new(),
    });
    let reporter = ProgressReporter::new(sink.clone());
    let job = env.claim_job("repo-1", SyncType::GitRefs);

    let err = sync(&env, &job, &reporter).unwrap_err();
    assert!(matches!(err, SyncError::Report { job_id, .. } if job_id == job.id));
    assert_eq!(env.db.list_refs("repo-1").unwrap(), before);
    assert_eq!(env.status(job.id), JobStatus::Running);
    assert_eq!(sink.inner.messages().len(), 1);
    assert!(env.leftover_workspaces().is_empty());
}

#[test]
fn cleanup_failure_is_only_a_warning() {
    let env = Env::new();
    seed_tagged_repo(&env.source);
    let sink = Arc::new(WorkspaceWipingSink {
        clone_root: env.clone_root.clone(),
        inner: MemoryLogSink::new(),
    });
    let reporter = ProgressReporter::new(sink.clone());
    let job = env.claim_job("repo-1", SyncType::GitRefs);

    let outcome = sync(&env, &job, &reporter).unwrap();
    let warning = outcome.cleanup_warning.expect("cleanup warning");
    assert!(warning.contains("failed to remove workspace"), "got: {warning}");
    assert_eq!(env.status(job.id), JobStatus::Done);
    assert_eq!(env.db.count_refs("repo-1").unwrap(), outcome.ref_count);
}

#[test]
fn worker_marks_provision_failure_failed() {
    let root = tempfile::tempdir().unwrap();
    let mut config = WorkerConfig::default();
    config.database.path = root.path().join("sync.db");
    config.git.clone_path = Some(root.path().join("clones"));
    let db = Arc::new(SyncDb::open_path(&config.database.path).unwrap());
    let sink = Arc::new(MemoryLogSink::new());
    let worker = Worker::new(
        config,
        db.clone(),
        Arc::new(CloneProvisioner::new(ProvisionOptions {
            clone_root: Some(root.path().join("clones")),
        })),
        Arc::new(StaticToken::default()),
        ProgressReporter::new(sink.clone()),
    );

    db.upsert_repo("repo-1", root.path().join("missing").to_str().unwrap())
        .unwrap();
    db.replace_refs(
        "repo-1",
        &[refsync_core::testing::branch(
            "main",
            "3333333333333333333333333333333333333333",
        )],
        db.enqueue_job("repo-1", &SyncType::GitRefs).unwrap(),
        &Cancellation::new(),
        |_| Ok(()),
    )
    .unwrap();
    db.enqueue_job("repo-1", &SyncType::GitRefs).unwrap();
    let job = db.dequeue_job().unwrap().unwrap();

    let err = worker.execute_job(&job, &Cancellation::new()).unwrap_err();
    assert_eq!(err.stage(), "provision");
    assert_eq!(db.get_job(job.id).unwrap().unwrap().status, JobStatus::Failed);
    assert_eq!(db.count_refs("repo-1").unwrap(), 1);

    let records = sink.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].entry.log_type, SyncLogType::Error);
    assert!(records[0].entry.message.starts_with(&format!("job {} (repo repo-1)", job.id)));

    let clones = root.path().join("clones");
    let leftovers = std::fs::read_dir(&clones).map(|d| d.count()).unwrap_or(0);
    assert_eq!(leftovers, 0);
}

#[test]
fn job_waits_out_another_repos_write_transaction() {
    let env = Env::new();
    seed_tagged_repo(&env.source);
    let db_path = env.db.path().to_path_buf();
    let job_a = env.claim_job("repo-a", SyncType::GitRefs);
    let job_b = env.claim_job("repo-b", SyncType::GitRefs);

    let mut config = WorkerConfig::default();
    config.database.path = db_path.clone();
    config.database.busy_timeout_ms = 50;
    config.git.clone_path = Some(env.clone_root.clone());
    let worker = Worker::new(
        config.clone(),
        Arc::new(SyncDb::open_with_timeout(&db_path, config.database.busy_timeout()).unwrap()),
        Arc::new(env.provisioner()),
        Arc::new(StaticToken::default()),
        ProgressReporter::new(Arc::new(MemoryLogSink::new())),
    );

    // Hold repo-a's write transaction well past the configured busy timeout.
    let (locked_tx, locked_rx) = mpsc::channel();
    let holder = std::thread::spawn(move || {
        let other = SyncDb::open_path(&db_path).unwrap();
        other
            .replace_refs("repo-a", &[], job_a.id, &Cancellation::new(), |_| {
                locked_tx.send(()).unwrap();
                std::thread::sleep(Duration::from_millis(1500));
                Ok(())
            })
            .unwrap();
    });
    locked_rx.recv().unwrap();

    let cancel = Cancellation::new().with_timeout(Duration::from_secs(30));
    let outcome = worker.execute_job(&job_b, &cancel).unwrap();
    holder.join().unwrap();

    assert!(outcome.ref_count >= 4);
    assert_eq!(env.status(job_b.id), JobStatus::Done);
    assert_eq!(env.db.count_refs("repo-b").unwrap(), outcome.ref_count);
    assert!(env.leftover_workspaces().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn scheduler_drains_queue_and_writes_jsonl_logs() {
    let env = Env::new();
    seed_tagged_repo(&env.source);
    let db_path = env.db.path().to_path_buf();
    let log_path = env.clone_root.parent().unwrap().join("logs").join("sync.jsonl");

    env.db.upsert_repo("good", &env.locator()).unwrap();
    let good_job = env.db.enqueue_job("good", &SyncType::GitRefs).unwrap();
    env.db.upsert_repo("odd", &env.locator()).unwrap();
    let odd_job = env
        .db
        .enqueue_job("odd", &SyncType::from("GITHUB_ISSUES"))
        .unwrap();

    let mut config = WorkerConfig::default();
    config.database.path = db_path;
    config.git.clone_path = Some(env.clone_root.clone());
    config.worker.concurrency = 2;
    config.worker.poll_interval_secs = 1;
    config.logs.path = Some(log_path.clone());

    let worker = Arc::new(Worker::from_config(config).unwrap());
    let (_shutdown_tx, shutdown_rx) = watch::channel(false);
    let stats = run_scheduler(worker, shutdown_rx, true).await;

    assert_eq!(stats, RunStats { done: 1, failed: 1 });
    assert_eq!(env.status(good_job), JobStatus::Done);
    assert_eq!(env.status(odd_job), JobStatus::Failed);
    assert!(env.db.count_refs("good").unwrap() >= 4);
    assert_eq!(env.db.count_refs("odd").unwrap(), 0);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let lines: Vec<serde_json::Value> = log
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    let for_job = |id: i64| {
        lines
            .iter()
            .filter(|l| l["job_id"] == id)
            .map(|l| {
                let kind = l["type"].as_str().unwrap().to_string();
                (kind, l["message"].as_str().unwrap().to_string())
            })
            .collect::<Vec<_>>()
    };
    let good = for_job(good_job);
    assert_eq!(good.len(), 2);
    assert!(good.iter().all(|(kind, _)| kind == "INFO"));
    assert!(good[1].1.starts_with("finished GIT_REFS sync"));

    let odd = for_job(odd_job);
    assert_eq!(odd.len(), 1);
    assert_eq!(odd[0].0, "ERROR");
    assert!(odd[0].1.contains("no handler for sync type GITHUB_ISSUES"));
    assert!(env.leftover_workspaces().is_empty());
}
