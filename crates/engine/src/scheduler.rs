//! Event scheduling: coalescing, timed dispatch, bounded concurrency
//!
//! Incoming events land in a pending map keyed by absolute path, so a
//! burst of writes to one file collapses to its latest event. A timer
//! flushes the map every cycle; during a flush, dispatch blocks whenever
//! the number of in-flight transfers reaches the ceiling and resumes the
//! same batch as completions arrive. Exactly one completion per dispatched
//! file keeps the accounting honest.

use arca_core::{BackupStatus, FileEvent, Status, TransferOutcome};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

pub struct EventScheduler {
    /// Latest pending event per absolute path
    pending: Mutex<HashMap<PathBuf, FileEvent>>,
    in_progress: AtomicUsize,
    done: AtomicUsize,
    max_in_progress: usize,
    max_buffered: usize,
    flush_interval: Duration,
    downstream: mpsc::Sender<FileEvent>,
    status: broadcast::Sender<BackupStatus>,
}

impl EventScheduler {
    pub fn new(
        max_in_progress: usize,
        max_buffered: usize,
        flush_interval: Duration,
        downstream: mpsc::Sender<FileEvent>,
        status: broadcast::Sender<BackupStatus>,
    ) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            in_progress: AtomicUsize::new(0),
            done: AtomicUsize::new(0),
            max_in_progress: max_in_progress.max(1),
            max_buffered,
            flush_interval,
            downstream,
            status,
        }
    }

    /// Buffer one event, replacing any pending event for the same path.
    pub fn enqueue(&self, event: FileEvent) {
        let mut pending = self.pending.lock();
        if pending.len() >= self.max_buffered && !pending.contains_key(&event.absolute_path) {
            // Advisory only; coalescing keeps the map bounded by the
            // number of distinct changed paths.
            warn!(buffered = pending.len(), "pending buffer above high-water mark");
        }
        pending.insert(event.absolute_path.clone(), event);
    }

    pub fn pending_len(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn in_flight(&self) -> usize {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn files_done(&self) -> usize {
        self.done.load(Ordering::Acquire)
    }

    /// Drive the scheduler until the event source closes: buffer incoming
    /// events, account completions, and flush on every timer tick.
    pub async fn run(
        &self,
        mut events: mpsc::UnboundedReceiver<FileEvent>,
        mut completions: mpsc::Receiver<TransferOutcome>,
    ) {
        let mut tick = tokio::time::interval(self.flush_interval);
        tick.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // interval fires immediately; swallow that so the first real
        // cycle waits a full window.
        tick.tick().await;

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    self.dispatch_cycle(&mut completions).await;
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.enqueue(event),
                        None => break,
                    }
                }
                maybe_outcome = completions.recv() => {
                    match maybe_outcome {
                        Some(outcome) => self.on_completion(&outcome),
                        None => break,
                    }
                }
            }
        }
        debug!("event source closed, scheduler stopping");
    }

    /// Flush the pending map: dispatch each buffered event downstream,
    /// never letting in-flight transfers exceed the ceiling. At the
    /// ceiling the batch holds and resumes as completions arrive. A quiet
    /// cycle publishes nothing.
    async fn dispatch_cycle(&self, completions: &mut mpsc::Receiver<TransferOutcome>) {
        let batch: Vec<PathBuf> = self.pending.lock().keys().cloned().collect();
        if batch.is_empty() {
            return;
        }
        debug!(files = batch.len(), "dispatch cycle");

        for path in batch {
            while self.in_flight() >= self.max_in_progress {
                match completions.recv().await {
                    Some(outcome) => self.on_completion(&outcome),
                    None => return,
                }
            }
            // Events that arrived since the snapshot replaced the entry;
            // whatever is current now is what ships.
            let Some(event) = self.pending.lock().remove(&path) else {
                continue;
            };
            self.in_progress.fetch_add(1, Ordering::AcqRel);
            self.publish(Status::Uploading);
            if self.downstream.send(event).await.is_err() {
                warn!("dispatch queue closed, stopping cycle");
                return;
            }
        }
        self.publish(Status::Waiting);
    }

    /// Release one concurrency slot. The counter never underflows even if
    /// a stray completion arrives.
    fn on_completion(&self, outcome: &TransferOutcome) {
        let _ = self
            .in_progress
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |v| v.checked_sub(1));
        if outcome.success {
            self.done.fetch_add(1, Ordering::AcqRel);
        } else {
            warn!(path = %outcome.absolute_path.display(), "transfer reported failure");
        }
    }

    fn publish(&self, status: Status) {
        let report = match status {
            Status::Waiting => BackupStatus::waiting(),
            Status::Uploading => BackupStatus {
                total_files: self.pending_len(),
                files_in_progress: self.in_flight(),
                files_done: self.files_done(),
                status: Status::Uploading,
            },
        };
        let _ = self.status.send(report);
    }
}
