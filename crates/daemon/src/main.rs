use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use refsync_core::SyncType;
use refsync_daemon::{Worker, config, run_scheduler};
use refsync_local_db::SyncDb;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "refsync-daemon",
    version,
    about = "Sync git refs of queued repositories into SQLite"
)]
struct Cli {
    /// Worker config file (default: ~/.config/refsync/worker.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll the queue and run sync jobs until SIGINT/SIGTERM
    Run {
        /// Exit once the queue is empty
        #[arg(long)]
        once: bool,
    },
    /// Register a repository and queue a sync job for it
    Enqueue {
        /// Repository id (default: a new UUID)
        #[arg(long)]
        repo_id: Option<String>,
        /// Clone URL or local path
        #[arg(long)]
        locator: String,
        #[arg(long, default_value = SyncType::GIT_REFS)]
        sync_type: String,
    },
    /// Print the stored refs of a repository as JSON
    Refs {
        #[arg(long)]
        repo_id: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("refsync_daemon=info".parse().expect("static directive"))
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!("refsync-daemon fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let cfg = config::load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Run { once } => run_worker(cfg, once).await,
        Command::Enqueue {
            repo_id,
            locator,
            sync_type,
        } => {
            let db = open_db(&cfg)?;
            let repo_id = repo_id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
            db.upsert_repo(&repo_id, &locator)?;
            let job_id = db.enqueue_job(&repo_id, &SyncType::from(sync_type.as_str()))?;
            println!("{}", serde_json::json!({ "job_id": job_id, "repo_id": repo_id }));
            Ok(())
        }
        Command::Refs { repo_id } => {
            let db = open_db(&cfg)?;
            let refs = db.list_refs(&repo_id)?;
            println!("{}", serde_json::to_string_pretty(&refs)?);
            Ok(())
        }
    }
}

fn open_db(cfg: &config::WorkerConfig) -> Result<SyncDb> {
    SyncDb::open_with_timeout(&cfg.database.path, cfg.database.busy_timeout())
        .with_context(|| format!("Failed to open database {}", cfg.database.path.display()))
}

async fn run_worker(cfg: config::WorkerConfig, once: bool) -> Result<()> {
    info!("refsync-daemon starting");
    info!(
        db = %cfg.database.path.display(),
        concurrency = cfg.worker.concurrency,
        "Worker configured"
    );

    let worker = Arc::new(Worker::from_config(cfg)?);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let scheduler_handle = tokio::spawn(run_scheduler(worker, shutdown_rx, once));

    if once {
        let stats = scheduler_handle.await?;
        info!(done = stats.done, failed = stats.failed, "Queue drained");
    } else {
        wait_for_shutdown().await?;
        info!("Shutdown signal received, stopping...");
        let _ = shutdown_tx.send(true);
        scheduler_handle.await?;
    }

    info!("refsync-daemon stopped");
    Ok(())
}

/// Wait for SIGTERM or SIGINT
async fn wait_for_shutdown() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut sigterm = signal(SignalKind::terminate()).context("Failed to register SIGTERM")?;
        let mut sigint = signal(SignalKind::interrupt()).context("Failed to register SIGINT")?;
        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM"),
            _ = sigint.recv() => info!("Received SIGINT"),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c()
            .await
            .context("Failed to register Ctrl+C handler")?;
        info!("Received Ctrl+C");
    }
    Ok(())
}
