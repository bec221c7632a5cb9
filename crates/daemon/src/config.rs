use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable that overrides `[git] clone_path`.
pub const CLONE_PATH_ENV: &str = "GIT_CLONE_PATH";

/// Top-level worker configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkerConfig {
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub git: GitSettings,
    #[serde(default)]
    pub worker: WorkerSettings,
    #[serde(default)]
    pub logs: LogSettings,
    #[serde(default)]
    pub credentials: CredentialSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_path")]
    pub path: PathBuf,
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
        }
    }
}

impl DatabaseSettings {
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_millis(self.busy_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GitSettings {
    /// Parent directory for clone workspaces. Unset means the system temp dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clone_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerSettings {
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_job_timeout")]
    pub job_timeout_secs: u64,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
            poll_interval_secs: default_poll_interval(),
            job_timeout_secs: default_job_timeout(),
        }
    }
}

impl WorkerSettings {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn job_timeout(&self) -> Duration {
        Duration::from_secs(self.job_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LogSettings {
    /// JSONL file receiving sync log entries. Unset sends them to tracing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CredentialSettings {
    /// Static access token. When set, the database is not consulted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

fn default_database_path() -> PathBuf {
    config_dir()
        .map(|dir| dir.join("sync.db"))
        .unwrap_or_else(|_| PathBuf::from("sync.db"))
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_concurrency() -> usize {
    1
}

fn default_poll_interval() -> u64 {
    5
}

fn default_job_timeout() -> u64 {
    600
}

/// Get the config directory path
pub fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .context("Could not determine home directory")?;
    Ok(PathBuf::from(home).join(".config").join("refsync"))
}

/// Get the worker config file path
pub fn config_path() -> Result<PathBuf> {
    Ok(config_dir()?.join("worker.toml"))
}

/// Load worker config from `path`, or from the default location.
///
/// A missing file yields the defaults. `GIT_CLONE_PATH` overrides
/// `[git] clone_path` either way.
pub fn load_config(path: Option<&Path>) -> Result<WorkerConfig> {
    let path = match path {
        Some(path) => path.to_path_buf(),
        None => config_path()?,
    };
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read worker config at {}", path.display()))?;
        parse_config(&content)
            .with_context(|| format!("Failed to parse worker config at {}", path.display()))?
    } else {
        WorkerConfig::default()
    };
    apply_env_overrides(&mut config, std::env::var(CLONE_PATH_ENV).ok());
    Ok(config)
}

pub fn parse_config(content: &str) -> Result<WorkerConfig> {
    let config: WorkerConfig = toml::from_str(content)?;
    anyhow::ensure!(
        config.worker.concurrency > 0,
        "worker.concurrency must be at least 1"
    );
    Ok(config)
}

fn apply_env_overrides(config: &mut WorkerConfig, clone_path: Option<String>) {
    if let Some(clone_path) = clone_path.filter(|p| !p.trim().is_empty()) {
        config.git.clone_path = Some(PathBuf::from(clone_path));
    }
}
