//! Directory watching for the Arca backup engine
//!
//! Wraps the platform change-notification facility behind one seam, the
//! [`Watch`] trait. Raw notifications are normalized into
//! [`arca_core::FileEvent`]s, enriched with stat data, filtered, and
//! delivered on an output queue. Recursive coverage of new subdirectories
//! is handled by the underlying backend; the reserved snapshot directory
//! and temporary files never produce events.

pub mod filter;
mod normalize;

pub use filter::EventFilter;

use arca_core::{Action, FileEvent, Message};
use notify::event::{CreateKind, EventKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, PollWatcher, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, trace};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch root [{0}] is not a directory")]
    NotADirectory(PathBuf),
    #[error("failed to establish watch on [{path}]: {source}")]
    Subscribe {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },
}

/// Which change-notification facility backs a watch.
#[derive(Debug, Clone, Copy)]
pub enum WatcherBackend {
    /// The platform-native facility (inotify, FSEvents, ReadDirectoryChangesW)
    Native,
    /// Portable polling fallback
    Poll { interval: Duration },
}

/// The directory-watch capability: one live, non-blocking subscription per
/// call, delivering events until the underlying subscription is lost.
/// Loss is terminal for that watch; callers must reissue `start_watching`.
pub trait Watch: Send {
    fn start_watching(&mut self, root: &Path) -> Result<(), WatchError>;
}

enum Backend {
    Native(RecommendedWatcher),
    Poll(PollWatcher),
}

/// Watches directory trees and emits normalized file events.
///
/// Ordering is preserved per source directory but not globally across
/// roots; each subscription runs on its own execution context.
pub struct DirectoryWatcher {
    out: mpsc::UnboundedSender<FileEvent>,
    messages: broadcast::Sender<Message>,
    filter: EventFilter,
    backend: WatcherBackend,
    // Live subscriptions; dropping a handle tears the watch down.
    active: Vec<Backend>,
}

impl DirectoryWatcher {
    pub fn new(
        out: mpsc::UnboundedSender<FileEvent>,
        messages: broadcast::Sender<Message>,
        filter: EventFilter,
        backend: WatcherBackend,
    ) -> Self {
        Self {
            out,
            messages,
            filter,
            backend,
            active: Vec::new(),
        }
    }

    /// Number of live subscriptions held by this watcher.
    pub fn active_watches(&self) -> usize {
        self.active.len()
    }
}

impl Watch for DirectoryWatcher {
    fn start_watching(&mut self, root: &Path) -> Result<(), WatchError> {
        if !root.is_dir() {
            return Err(WatchError::NotADirectory(root.to_path_buf()));
        }

        let handler = EventPump {
            root: root.to_path_buf(),
            watch_name: arca_core::event::watch_name(root),
            out: self.out.clone(),
            messages: self.messages.clone(),
            filter: self.filter.clone(),
        };

        let subscribe = |source: notify::Error| WatchError::Subscribe {
            path: root.to_path_buf(),
            source,
        };

        let mut backend = match self.backend {
            WatcherBackend::Native => {
                let watcher =
                    RecommendedWatcher::new(handler, Config::default()).map_err(subscribe)?;
                Backend::Native(watcher)
            }
            WatcherBackend::Poll { interval } => {
                let config = Config::default().with_poll_interval(interval);
                let watcher = PollWatcher::new(handler, config).map_err(subscribe)?;
                Backend::Poll(watcher)
            }
        };

        match &mut backend {
            Backend::Native(w) => w.watch(root, RecursiveMode::Recursive),
            Backend::Poll(w) => w.watch(root, RecursiveMode::Recursive),
        }
        .map_err(subscribe)?;

        info!(root = %root.display(), "watching");
        self.active.push(backend);
        Ok(())
    }
}

/// Per-subscription notify handler. Runs on the backend's own thread;
/// stats happen here, off the async runtime.
struct EventPump {
    root: PathBuf,
    watch_name: String,
    out: mpsc::UnboundedSender<FileEvent>,
    messages: broadcast::Sender<Message>,
    filter: EventFilter,
}

impl notify::EventHandler for EventPump {
    fn handle_event(&mut self, res: notify::Result<notify::Event>) {
        match res {
            Ok(raw) => self.pump(raw),
            Err(e) => {
                // Terminal for this subscription; surfaced, never restarted.
                error!(root = %self.root.display(), "watch subscription error: {e}");
                let _ = self.messages.send(Message::error(
                    format!("watch error on [{}]: {e}", self.root.display()),
                    self.watch_name.clone(),
                ));
            }
        }
    }
}

impl EventPump {
    fn pump(&self, raw: notify::Event) {
        // A combined rename carries both ends in one notification.
        if let EventKind::Modify(ModifyKind::Name(RenameMode::Both)) = raw.kind {
            if raw.paths.len() == 2 {
                self.emit(&raw.paths[0], Action::RenamedFrom, false);
                self.emit(&raw.paths[1], Action::RenamedTo, false);
                return;
            }
        }

        let action = normalize::map_kind(&raw.kind);
        if action == Action::Invalid {
            trace!(kind = ?raw.kind, "dropping unrecognized notification");
            return;
        }

        let dir_hint = matches!(
            raw.kind,
            EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder)
        );
        for path in &raw.paths {
            self.emit(path, action, dir_hint);
        }
    }

    fn emit(&self, path: &Path, action: Action, dir_hint: bool) {
        let is_dir = dir_hint || path.is_dir();
        if self.filter.should_drop(&self.root, path, is_dir) {
            trace!(path = %path.display(), "filtered");
            return;
        }
        let Some(event) = normalize::build_event(&self.root, path, action) else {
            return;
        };
        debug!(
            path = %event.absolute_path.display(),
            action = event.action.as_str(),
            "file event"
        );
        let _ = self.out.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::{timeout, Duration};

    fn watcher(out: mpsc::UnboundedSender<FileEvent>) -> DirectoryWatcher {
        let (messages, _) = broadcast::channel(16);
        DirectoryWatcher::new(
            out,
            messages,
            EventFilter::new(".snapshot"),
            WatcherBackend::Native,
        )
    }

    async fn next_event(
        rx: &mut mpsc::UnboundedReceiver<FileEvent>,
        secs: u64,
    ) -> Option<FileEvent> {
        timeout(Duration::from_secs(secs), rx.recv()).await.ok()?
    }

    #[tokio::test]
    async fn file_creation_is_reported() {
        let tmp = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut w = watcher(tx);
        w.start_watching(tmp.path()).unwrap();

        let path = tmp.path().join("a.txt");
        fs::write(&path, b"hello").unwrap();

        let ev = next_event(&mut rx, 10).await.expect("no event received");
        assert_eq!(ev.absolute_path, path);
        assert!(ev.action.has_content());
        assert_eq!(ev.watch_name, arca_core::event::watch_name(tmp.path()));
    }

    #[tokio::test]
    async fn new_subdirectories_are_covered() {
        let tmp = TempDir::new().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut w = watcher(tx);
        w.start_watching(tmp.path()).unwrap();

        let sub = tmp.path().join("sub");
        fs::create_dir(&sub).unwrap();
        // Give the backend a moment to extend coverage.
        tokio::time::sleep(Duration::from_millis(500)).await;
        let inner = sub.join("b.txt");
        fs::write(&inner, b"inner").unwrap();

        loop {
            let ev = next_event(&mut rx, 10).await.expect("no event for subdirectory file");
            if ev.absolute_path == inner {
                assert_eq!(ev.relative_path, Path::new("sub/b.txt"));
                break;
            }
        }
    }

    #[tokio::test]
    async fn snapshot_directory_produces_no_events() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join(".snapshot")).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut w = watcher(tx);
        w.start_watching(tmp.path()).unwrap();

        fs::write(tmp.path().join(".snapshot/db"), b"bookkeeping").unwrap();
        fs::write(tmp.path().join("visible.txt"), b"user data").unwrap();

        // Every event that arrives must be for the user file.
        let ev = next_event(&mut rx, 10).await.expect("no event received");
        assert_eq!(ev.absolute_path, tmp.path().join("visible.txt"));
        while let Ok(Some(ev)) = timeout(Duration::from_secs(1), rx.recv()).await {
            assert!(!ev.absolute_path.starts_with(tmp.path().join(".snapshot")));
        }
    }

    #[test]
    fn missing_root_is_an_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut w = watcher(tx);
        let err = w.start_watching(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, WatchError::NotADirectory(_)));
    }
}
