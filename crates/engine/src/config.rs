//! TOML run configuration
//!
//! One file describes everything a run needs: the watched roots, the
//! storage backends, and the scheduler tuning knobs. Every field has a
//! sensible default so a minimal config is just a list of watches.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config [{path}]: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config [{path}]: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Watched directory roots, one `[[watch]]` table each
    #[serde(default, rename = "watch")]
    pub watches: Vec<WatchConfig>,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub watcher: WatcherConfig,
    /// Name of the reserved bookkeeping directory inside each watch root
    #[serde(default = "default_snapshot_dir")]
    pub snapshot_dir: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watches: Vec::new(),
            storage: StorageConfig::default(),
            scheduler: SchedulerConfig::default(),
            watcher: WatcherConfig::default(),
            snapshot_dir: default_snapshot_dir(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// The watches that are switched on.
    pub fn active_watches(&self) -> impl Iterator<Item = &WatchConfig> {
        self.watches.iter().filter(|w| w.active)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatchConfig {
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    pub local: Option<LocalStorageConfig>,
    pub remote: Option<RemoteStorageConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LocalStorageConfig {
    #[serde(default = "default_true")]
    pub active: bool,
    /// Destination root the watched trees are mirrored under
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteStorageConfig {
    #[serde(default = "default_true")]
    pub active: bool,
    /// Top-level remote folder everything lives under
    #[serde(default = "default_remote_folder")]
    pub folder: String,
    /// Sleep a few random milliseconds per remote call
    #[serde(default)]
    pub simulate_latency: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Concurrent transfer ceiling
    #[serde(default = "default_max_in_progress")]
    pub max_in_progress: usize,
    /// Advisory high-water mark for the pending buffer
    #[serde(default = "default_max_buffered")]
    pub max_buffered: usize,
    /// Seconds between dispatch cycles; also the coalescing window
    #[serde(default = "default_flush_interval_secs")]
    pub flush_interval_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_in_progress: default_max_in_progress(),
            max_buffered: default_max_buffered(),
            flush_interval_secs: default_flush_interval_secs(),
        }
    }
}

impl SchedulerConfig {
    pub fn flush_interval(&self) -> Duration {
        Duration::from_secs(self.flush_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Native,
    Poll,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WatcherConfig {
    #[serde(default = "default_backend")]
    pub backend: BackendKind,
    /// Poll backend scan interval; ignored by the native backend
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Forward events whose subject is a directory
    #[serde(default)]
    pub report_directories: bool,
    /// Extra temporary-file patterns to drop (`*suffix`, `prefix*`, exact)
    #[serde(default)]
    pub blacklist: Vec<String>,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            poll_interval_secs: default_poll_interval_secs(),
            report_directories: false,
            blacklist: Vec::new(),
        }
    }
}

impl WatcherConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }
}

fn default_true() -> bool {
    true
}

fn default_snapshot_dir() -> String {
    arca_snapshot::DEFAULT_SNAPSHOT_DIR.to_string()
}

fn default_remote_folder() -> String {
    "arca".to_string()
}

fn default_max_in_progress() -> usize {
    5
}

fn default_max_buffered() -> usize {
    1000
}

fn default_flush_interval_secs() -> u64 {
    5
}

fn default_backend() -> BackendKind {
    BackendKind::Native
}

fn default_poll_interval_secs() -> u64 {
    2
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_config_parses() {
        let cfg: Config = toml::from_str(
            r#"
            snapshot_dir = ".arca"

            [[watch]]
            path = "/data/photos"

            [[watch]]
            path = "/data/docs"
            active = false

            [storage.local]
            path = "/backup"

            [storage.remote]
            folder = "my-backups"
            simulate_latency = true

            [scheduler]
            max_in_progress = 3
            flush_interval_secs = 10

            [watcher]
            backend = "poll"
            blacklist = ["*.log", "cache*"]
            "#,
        )
        .unwrap();

        assert_eq!(cfg.watches.len(), 2);
        assert_eq!(cfg.active_watches().count(), 1);
        assert_eq!(cfg.snapshot_dir, ".arca");
        assert_eq!(cfg.storage.local.as_ref().unwrap().path, PathBuf::from("/backup"));
        assert!(cfg.storage.local.as_ref().unwrap().active);
        assert_eq!(cfg.storage.remote.as_ref().unwrap().folder, "my-backups");
        assert_eq!(cfg.scheduler.max_in_progress, 3);
        assert_eq!(cfg.scheduler.max_buffered, 1000);
        assert_eq!(cfg.scheduler.flush_interval(), Duration::from_secs(10));
        assert_eq!(cfg.watcher.backend, BackendKind::Poll);
        assert_eq!(cfg.watcher.blacklist, vec!["*.log", "cache*"]);
    }

    #[test]
    fn empty_config_gets_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert!(cfg.watches.is_empty());
        assert!(cfg.storage.local.is_none());
        assert_eq!(cfg.scheduler.max_in_progress, 5);
        assert_eq!(cfg.scheduler.flush_interval(), Duration::from_secs(5));
        assert_eq!(cfg.snapshot_dir, ".snapshot");
        assert_eq!(cfg.watcher.backend, BackendKind::Native);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
