//! Startup backlog generation
//!
//! After a restart, every previously tracked file is resubmitted as a
//! synthetic `Added` event. No diff against a live rescan happens here;
//! downstream providers are expected to tolerate re-transfer of unchanged
//! files. A brand new root with pre-existing files is handled by
//! [`rescan`] instead, which walks the live tree.

use crate::store::{SnapshotError, SnapshotStore};
use arca_core::{Action, FileEvent, Signature};
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Synthesize one `Added` event per stored entry, the startup backlog for
/// a previously-known root. Corrupt entries are skipped with a warning;
/// they never abort the seeding pass.
pub fn backlog(store: &SnapshotStore) -> Result<Vec<FileEvent>, SnapshotError> {
    let mut events = Vec::new();
    for item in store.enumerate() {
        let (path, sig) = match item {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping snapshot entry: {e}");
                continue;
            }
        };
        if let Some(ev) = synthesize(store, &path, &sig) {
            events.push(ev);
        }
    }
    debug!(
        root = %store.root().display(),
        count = events.len(),
        "seeded startup backlog"
    );
    Ok(events)
}

/// Walk the live tree and synthesize `Added` events for files the store
/// does not know about, or whose signature no longer matches. Used when a
/// watch is first established over a root with no snapshot history.
pub fn rescan(store: &SnapshotStore) -> Vec<FileEvent> {
    let mut events = Vec::new();
    let walker = WalkDir::new(store.root())
        .follow_links(false)
        .into_iter()
        .filter_entry(|e| !store.is_reserved(e.path()));

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!("rescan: {e}");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let meta = match entry.metadata() {
            Ok(m) => m,
            Err(e) => {
                warn!(path = %entry.path().display(), "rescan stat failed: {e}");
                continue;
            }
        };
        let sig = Signature::from_metadata(&meta);
        match store.get(entry.path()) {
            Ok(Some(known)) if known == sig => continue,
            Ok(_) => {}
            Err(e) => {
                warn!(path = %entry.path().display(), "rescan lookup failed: {e}");
            }
        }
        if let Some(ev) = synthesize(store, entry.path(), &sig) {
            events.push(ev);
        }
    }
    debug!(
        root = %store.root().display(),
        count = events.len(),
        "rescan complete"
    );
    events
}

fn synthesize(store: &SnapshotStore, path: &std::path::Path, sig: &Signature) -> Option<FileEvent> {
    let timestamp = DateTime::<Utc>::from_timestamp(sig.mtime, 0).unwrap_or_else(Utc::now);
    let ev = FileEvent::new(store.root(), path, Action::Added, sig.size, timestamp);
    if ev.is_none() {
        warn!(path = %path.display(), "stored path escapes its watch root, skipping");
    }
    ev
}
