//! The provider contract

use arca_core::{FileEvent, Progress};
use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::broadcast;

/// Progress fan-out. Sending never blocks; with no subscribers the report
/// is simply dropped.
pub type ProgressSink = broadcast::Sender<Progress>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("provider name must not be empty")]
    EmptyName,
    #[error("provider [{0}] is already registered")]
    Duplicate(String),
    #[error("missing provider setting [{0}]")]
    MissingSetting(&'static str),
    #[error("source [{path}]: {source}")]
    Source {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("destination [{path}]: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("remote: {0}")]
    Remote(String),
}

/// A pluggable backup destination.
///
/// `setup` runs once at startup: `Ok(true)` activates the provider,
/// `Ok(false)` marks it unconfigured for this run (not an error), and
/// `Err` reports an activation failure. `store` runs once per dispatched
/// event that reaches an active provider; there is no retry in this
/// contract and no timeout, so a `store` that never returns starves one
/// scheduler slot.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn setup(&self) -> Result<bool, StorageError>;

    async fn store(&self, event: &FileEvent) -> Result<(), StorageError>;
}
