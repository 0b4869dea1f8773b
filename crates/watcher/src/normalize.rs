//! Raw notification normalization and per-event enrichment

use arca_core::{Action, FileEvent, Signature};
use chrono::{DateTime, Utc};
use notify::event::{AccessKind, AccessMode, EventKind, ModifyKind, RenameMode};
use std::path::Path;
use tracing::{debug, warn};

/// Map a raw notification kind onto the uniform action set. Anything we do
/// not recognize becomes [`Action::Invalid`] and is dropped by the caller.
pub(crate) fn map_kind(kind: &EventKind) -> Action {
    match kind {
        EventKind::Create(_) => Action::Added,
        EventKind::Remove(_) => Action::Removed,
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => Action::RenamedFrom,
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => Action::RenamedTo,
        EventKind::Modify(ModifyKind::Data(_)) | EventKind::Modify(ModifyKind::Any) => {
            Action::Modified
        }
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => Action::Modified,
        _ => Action::Invalid,
    }
}

/// Build the enriched event for one raw notification.
///
/// Stats the path to obtain size and modification time. For `Removed` and
/// `RenamedFrom` the stat is skipped since the path no longer exists. A
/// stat failure drops the event: without it there is no reliable signature.
pub(crate) fn build_event(root: &Path, path: &Path, action: Action) -> Option<FileEvent> {
    let (size, timestamp) = match action {
        Action::Removed | Action::RenamedFrom => (0, Utc::now()),
        _ => {
            let meta = match std::fs::metadata(path) {
                Ok(m) => m,
                Err(e) => {
                    debug!(path = %path.display(), "dropping event, stat failed: {e}");
                    return None;
                }
            };
            let sig = Signature::from_metadata(&meta);
            let ts = DateTime::<Utc>::from_timestamp(sig.mtime, 0).unwrap_or_else(Utc::now);
            (sig.size, ts)
        }
    };

    let ev = FileEvent::new(root, path, action, size, timestamp);
    if ev.is_none() {
        warn!(
            path = %path.display(),
            root = %root.display(),
            "dropping event outside its watch root"
        );
    }
    ev
}
