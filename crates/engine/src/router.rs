//! Transfer routing: dispatched events fan out to every registered
//! provider and collapse back into exactly one completion per file.
//!
//! Content-bearing actions are stored on all providers concurrently; the
//! snapshot signature is recorded only when every provider succeeds, so a
//! partially backed-up file is retried wholesale on the next pass.
//! Removals drop the snapshot entry and complete immediately without
//! touching any provider.

use crate::config::SchedulerConfig;
use arca_core::{Action, FileEvent, Message, Signature, TransferOutcome};
use arca_snapshot::SnapshotStore;
use arca_storage::{StorageProvider, StorageRegistry};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, warn};

pub struct TransferRouter {
    registry: Arc<StorageRegistry>,
    /// Snapshot store per watch root, keyed by the root path
    snapshots: HashMap<PathBuf, Arc<SnapshotStore>>,
    completions: mpsc::Sender<TransferOutcome>,
    messages: broadcast::Sender<Message>,
}

impl TransferRouter {
    pub fn new(
        registry: Arc<StorageRegistry>,
        snapshots: HashMap<PathBuf, Arc<SnapshotStore>>,
        completions: mpsc::Sender<TransferOutcome>,
        messages: broadcast::Sender<Message>,
    ) -> Self {
        Self {
            registry,
            snapshots,
            completions,
            messages,
        }
    }

    /// Consume dispatched events until the scheduler closes the queue.
    /// Each file is handled on its own task so one slow transfer never
    /// stalls the rest of the batch.
    pub async fn run(self: Arc<Self>, mut dispatched: mpsc::Receiver<FileEvent>) {
        while let Some(event) = dispatched.recv().await {
            let router = Arc::clone(&self);
            tokio::spawn(async move { router.handle(event).await });
        }
        debug!("dispatch queue closed, router stopping");
    }

    pub async fn handle(&self, event: FileEvent) {
        let success = match event.action {
            Action::Removed | Action::RenamedFrom => self.forget(&event),
            action if action.has_content() => self.transfer(&event).await,
            other => {
                warn!(action = other.as_str(), "unroutable action, completing as no-op");
                true
            }
        };
        let outcome = TransferOutcome {
            absolute_path: event.absolute_path,
            success,
        };
        if self.completions.send(outcome).await.is_err() {
            warn!("scheduler gone, dropping completion");
        }
    }

    /// The file no longer exists at this path; drop its snapshot entry.
    /// A failed delete is logged, not fatal: the stale entry resolves
    /// itself when the backlog re-stats the path.
    fn forget(&self, event: &FileEvent) -> bool {
        if let Some(store) = self.snapshots.get(&event.directory_path) {
            if let Err(e) = store.delete(&event.absolute_path) {
                warn!(path = %event.absolute_path.display(), "snapshot delete failed: {e}");
            }
        }
        true
    }

    async fn transfer(&self, event: &FileEvent) -> bool {
        let providers = self.registry.get_all();
        if providers.is_empty() {
            debug!("no storage providers registered, nothing to store");
            return true;
        }

        let attempts = providers
            .iter()
            .map(|provider| self.store_on(Arc::clone(provider), event));
        let all_ok = futures::future::join_all(attempts)
            .await
            .into_iter()
            .all(|ok| ok);

        if all_ok {
            self.record(event);
        }
        all_ok
    }

    /// Store one file on one provider under the duplication guard. A
    /// rejected duplicate counts as success: the transfer already running
    /// covers this event.
    async fn store_on(&self, provider: Arc<dyn StorageProvider>, event: &FileEvent) -> bool {
        let guard = self.registry.guard();
        if !guard.start(&event.absolute_path, provider.name()) {
            return true;
        }
        let result = provider.store(event).await;
        guard.finish(&event.absolute_path, provider.name());

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(
                    provider = provider.name(),
                    path = %event.absolute_path.display(),
                    "store failed: {e}"
                );
                let _ = self
                    .messages
                    .send(Message::error(e.to_string(), provider.name()));
                false
            }
        }
    }

    fn record(&self, event: &FileEvent) {
        let Some(store) = self.snapshots.get(&event.directory_path) else {
            return;
        };
        let signature = Signature::new(event.timestamp.timestamp(), event.size);
        if let Err(e) = store.put(&event.absolute_path, &signature) {
            warn!(path = %event.absolute_path.display(), "snapshot update failed: {e}");
        }
    }
}

/// Capacity for the dispatch queue feeding the router; sized to the
/// concurrency ceiling so the scheduler backpressures instead of queueing
/// a second batch.
pub fn dispatch_capacity(scheduler: &SchedulerConfig) -> usize {
    scheduler.max_in_progress.max(1)
}
