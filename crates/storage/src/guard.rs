//! In-flight transfer guard
//!
//! Keyed by `(absolute path, provider name)`. This sits below the
//! scheduler's global concurrency ceiling: the scheduler bounds total
//! concurrent transfers, the guard rejects the narrower case of the same
//! file being resubmitted to the same provider while its transfer is
//! still active (duplicate native notifications do this).

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::warn;

#[derive(Debug, Default)]
pub struct InProgressGuard {
    active: DashMap<(PathBuf, String), Instant>,
}

impl InProgressGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a transfer start. Returns `false` (and warns) when a
    /// transfer for the same file and provider is already active.
    /// Check and insert happen under one shard lock, so two racing
    /// callers can never both be admitted.
    pub fn start(&self, path: &Path, provider: &str) -> bool {
        let key = (path.to_path_buf(), provider.to_string());
        match self.active.entry(key) {
            Entry::Occupied(_) => {
                warn!(
                    path = %path.display(),
                    provider,
                    "transfer already in progress, rejecting duplicate"
                );
                false
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
                true
            }
        }
    }

    /// Mark the transfer finished, releasing the slot.
    pub fn finish(&self, path: &Path, provider: &str) {
        self.active
            .remove(&(path.to_path_buf(), provider.to_string()));
    }

    /// Number of transfers currently in flight across all providers.
    pub fn total_in_flight(&self) -> usize {
        self.active.len()
    }
}
