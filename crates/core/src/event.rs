//! File change events emitted by directory watchers

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// What happened to a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    /// File created
    Added,
    /// File deleted
    Removed,
    /// File content changed (includes close-after-write)
    Modified,
    /// File moved away from this path
    RenamedFrom,
    /// File moved to this path
    RenamedTo,
    /// Unrecognized raw notification; never forwarded past the watcher
    Invalid,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Added => "added",
            Action::Removed => "removed",
            Action::Modified => "modified",
            Action::RenamedFrom | Action::RenamedTo => "renamed",
            Action::Invalid => "invalid",
        }
    }

    /// Whether the path still exists and carries content worth transferring.
    pub fn has_content(&self) -> bool {
        matches!(self, Action::Added | Action::Modified | Action::RenamedTo)
    }
}

/// A normalized file change notification.
///
/// `absolute_path` is always a descendant of `directory_path` (the watch
/// root). Events with [`Action::Invalid`] are dropped by the watcher and
/// never reach the scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileEvent {
    /// Correlation id, carried through progress reports
    pub id: Uuid,
    pub absolute_path: PathBuf,
    /// Path relative to the watch root
    pub relative_path: PathBuf,
    /// The watch root this event belongs to
    pub directory_path: PathBuf,
    /// Base name of the watch root, used to re-root files at the destination
    pub watch_name: String,
    pub action: Action,
    pub size: u64,
    pub mime_type: String,
    pub timestamp: DateTime<Utc>,
}

impl FileEvent {
    /// Build an event for `absolute_path` under the watch root `root`.
    ///
    /// Returns `None` when the path is not a descendant of the root.
    pub fn new(
        root: &Path,
        absolute_path: &Path,
        action: Action,
        size: u64,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let relative_path = absolute_path.strip_prefix(root).ok()?.to_path_buf();
        Some(Self {
            id: Uuid::new_v4(),
            absolute_path: absolute_path.to_path_buf(),
            relative_path,
            directory_path: root.to_path_buf(),
            watch_name: watch_name(root),
            action,
            size,
            mime_type: guess_mime(absolute_path),
            timestamp,
        })
    }

    /// File name portion of the path.
    pub fn file_name(&self) -> String {
        self.absolute_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Display name for a watch root (its base directory name).
pub fn watch_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.to_string_lossy().into_owned())
}

/// Best-effort mime type from the file extension.
pub fn guess_mime(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}
