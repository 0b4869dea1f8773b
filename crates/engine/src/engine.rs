//! Engine assembly: wires the watcher, scheduler, snapshot stores,
//! router, and storage registry into one running pipeline.

use crate::config::{BackendKind, Config, ConfigError};
use crate::router::{dispatch_capacity, TransferRouter};
use crate::scheduler::EventScheduler;
use arca_core::event::watch_name;
use arca_core::{BackupStatus, Message, Progress};
use arca_snapshot::{seed, SnapshotStore};
use arca_storage::{LocalProvider, MemoryClient, RemoteProvider, StorageRegistry};
use arca_watcher::{DirectoryWatcher, EventFilter, Watch, WatcherBackend};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{error, info, warn};

/// Broadcast capacity for progress, status, and message streams. Slow
/// subscribers lag and drop; they never block the pipeline.
const STREAM_CAPACITY: usize = 256;

/// Capacity for the router-to-scheduler completion queue.
const COMPLETION_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("no watch root could be established")]
    NoWatchRoots,
}

/// An assembled but not yet running engine. Subscriptions taken here stay
/// valid across [`Engine::start`].
pub struct Engine {
    config: Config,
    registry: Arc<StorageRegistry>,
    progress: broadcast::Sender<Progress>,
    status: broadcast::Sender<BackupStatus>,
    messages: broadcast::Sender<Message>,
}

impl Engine {
    pub fn new(config: Config) -> Self {
        let (progress, _) = broadcast::channel(STREAM_CAPACITY);
        let (status, _) = broadcast::channel(STREAM_CAPACITY);
        let (messages, _) = broadcast::channel(STREAM_CAPACITY);
        Self {
            config,
            registry: Arc::new(StorageRegistry::new()),
            progress,
            status,
            messages,
        }
    }

    pub fn from_config_file(path: &Path) -> Result<Self, EngineError> {
        Ok(Self::new(Config::load(path)?))
    }

    pub fn subscribe_progress(&self) -> broadcast::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<BackupStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.messages.subscribe()
    }

    pub fn registry(&self) -> &Arc<StorageRegistry> {
        &self.registry
    }

    fn register_providers(&self) {
        if let Some(local) = &self.config.storage.local {
            if local.active {
                let provider = LocalProvider::new(&local.path, self.progress.clone());
                if let Err(e) = self.registry.register(Arc::new(provider)) {
                    warn!("local provider not registered: {e}");
                }
            }
        }
        if let Some(remote) = &self.config.storage.remote {
            if remote.active {
                let client = MemoryClient::new(remote.simulate_latency);
                let provider = RemoteProvider::new(
                    "remote",
                    client,
                    remote.folder.clone(),
                    self.progress.clone(),
                );
                if let Err(e) = self.registry.register(Arc::new(provider)) {
                    warn!("remote provider not registered: {e}");
                }
            }
        }
    }

    /// Open the snapshot store for one root and build its startup backlog.
    /// A previously-known root resubmits its stored entries; a brand new
    /// root is walked live.
    fn seed_root(&self, root: &Path) -> Option<(Arc<SnapshotStore>, Vec<arca_core::FileEvent>)> {
        if !root.is_dir() {
            error!(root = %root.display(), "watch root is not a directory");
            let _ = self.messages.send(Message::error(
                format!("watch root [{}] is not a directory", root.display()),
                watch_name(root),
            ));
            return None;
        }
        let known = SnapshotStore::exists(root, &self.config.snapshot_dir);
        let store = match SnapshotStore::open_named(root, &self.config.snapshot_dir) {
            Ok(s) => Arc::new(s),
            Err(e) => {
                error!(root = %root.display(), "snapshot store unavailable: {e}");
                let _ = self
                    .messages
                    .send(Message::error(e.to_string(), watch_name(root)));
                return None;
            }
        };
        let backlog = if known {
            seed::backlog(&store).unwrap_or_else(|e| {
                warn!(root = %root.display(), "backlog seeding failed: {e}");
                Vec::new()
            })
        } else {
            seed::rescan(&store)
        };
        info!(
            root = %root.display(),
            known,
            backlog = backlog.len(),
            "watch root ready"
        );
        Some((store, backlog))
    }

    /// Bring the pipeline up: set up providers, seed backlogs, establish
    /// watches, and spawn the scheduler and router loops. A root that
    /// fails to watch is reported and skipped; the run continues with the
    /// rest. With zero usable roots there is nothing to run.
    pub async fn start(self) -> Result<RunningEngine, EngineError> {
        self.register_providers();
        self.registry.setup_all(&self.messages).await;
        if self.registry.is_empty() {
            warn!("no storage providers active, events will complete as no-ops");
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (dispatch_tx, dispatch_rx) = mpsc::channel(dispatch_capacity(&self.config.scheduler));
        let (completion_tx, completion_rx) = mpsc::channel(COMPLETION_CAPACITY);

        let scheduler = Arc::new(EventScheduler::new(
            self.config.scheduler.max_in_progress,
            self.config.scheduler.max_buffered,
            self.config.scheduler.flush_interval(),
            dispatch_tx,
            self.status.clone(),
        ));

        let mut snapshots: HashMap<PathBuf, Arc<SnapshotStore>> = HashMap::new();
        for watch in self.config.active_watches() {
            let Some((store, backlog)) = self.seed_root(&watch.path) else {
                continue;
            };
            for event in backlog {
                scheduler.enqueue(event);
            }
            snapshots.insert(watch.path.clone(), store);
        }

        let backend = match self.config.watcher.backend {
            BackendKind::Native => WatcherBackend::Native,
            BackendKind::Poll => WatcherBackend::Poll {
                interval: self.config.watcher.poll_interval(),
            },
        };
        let filter = EventFilter::new(&self.config.snapshot_dir)
            .with_blacklist(self.config.watcher.blacklist.clone())
            .with_directories(self.config.watcher.report_directories);
        let mut watcher = DirectoryWatcher::new(event_tx, self.messages.clone(), filter, backend);
        for root in snapshots.keys() {
            if let Err(e) = watcher.start_watching(root) {
                error!(root = %root.display(), "cannot watch: {e}");
                let _ = self
                    .messages
                    .send(Message::error(e.to_string(), watch_name(root)));
            }
        }
        if snapshots.is_empty() {
            return Err(EngineError::NoWatchRoots);
        }

        let router = Arc::new(TransferRouter::new(
            Arc::clone(&self.registry),
            snapshots,
            completion_tx,
            self.messages.clone(),
        ));

        let scheduler_task = tokio::spawn({
            let scheduler = Arc::clone(&scheduler);
            async move { scheduler.run(event_rx, completion_rx).await }
        });
        let router_task = tokio::spawn(router.run(dispatch_rx));

        info!(watches = watcher.active_watches(), "engine running");
        Ok(RunningEngine {
            watcher,
            scheduler,
            registry: self.registry,
            progress: self.progress,
            status: self.status,
            messages: self.messages,
            tasks: vec![scheduler_task, router_task],
        })
    }
}

/// A live pipeline. Dropping it tears down the watches; [`shutdown`]
/// additionally aborts the background loops.
///
/// [`shutdown`]: RunningEngine::shutdown
pub struct RunningEngine {
    watcher: DirectoryWatcher,
    scheduler: Arc<EventScheduler>,
    registry: Arc<StorageRegistry>,
    progress: broadcast::Sender<Progress>,
    status: broadcast::Sender<BackupStatus>,
    messages: broadcast::Sender<Message>,
    tasks: Vec<tokio::task::JoinHandle<()>>,
}

impl std::fmt::Debug for RunningEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunningEngine").finish_non_exhaustive()
    }
}

impl RunningEngine {
    pub fn subscribe_progress(&self) -> broadcast::Receiver<Progress> {
        self.progress.subscribe()
    }

    pub fn subscribe_status(&self) -> broadcast::Receiver<BackupStatus> {
        self.status.subscribe()
    }

    pub fn subscribe_messages(&self) -> broadcast::Receiver<Message> {
        self.messages.subscribe()
    }

    pub fn registry(&self) -> &Arc<StorageRegistry> {
        &self.registry
    }

    pub fn active_watches(&self) -> usize {
        self.watcher.active_watches()
    }

    pub fn pending_files(&self) -> usize {
        self.scheduler.pending_len()
    }

    pub fn files_done(&self) -> usize {
        self.scheduler.files_done()
    }

    pub fn shutdown(self) {
        for task in self.tasks {
            task.abort();
        }
        info!("engine stopped");
    }
}
