//! Local filesystem provider
//!
//! Streams the source file in fixed-size chunks to a destination derived
//! by stripping the watch root and re-rooting under the configured backup
//! path: `<backup>/<watch name>/<relative path>`.

use crate::chunked::{copy_chunked, percent};
use crate::provider::{ProgressSink, StorageError, StorageProvider};
use arca_core::{FileEvent, Progress};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::{debug, info};

pub const PROVIDER_NAME: &str = "local";

pub struct LocalProvider {
    name: String,
    backup_path: PathBuf,
    progress: ProgressSink,
}

impl LocalProvider {
    pub fn new(backup_path: impl Into<PathBuf>, progress: ProgressSink) -> Self {
        Self {
            name: PROVIDER_NAME.to_string(),
            backup_path: backup_path.into(),
            progress,
        }
    }

    fn destination(&self, event: &FileEvent) -> PathBuf {
        self.backup_path
            .join(&event.watch_name)
            .join(&event.relative_path)
    }
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self) -> Result<bool, StorageError> {
        tokio::fs::create_dir_all(&self.backup_path)
            .await
            .map_err(|source| StorageError::Destination {
                path: self.backup_path.clone(),
                source,
            })?;
        info!(path = %self.backup_path.display(), "local provider ready");
        Ok(true)
    }

    async fn store(&self, event: &FileEvent) -> Result<(), StorageError> {
        let to = self.destination(event);
        debug!(
            from = %event.absolute_path.display(),
            to = %to.display(),
            "local store"
        );

        let progress = self.progress.clone();
        let report = |written, total| {
            let _ = progress.send(Progress {
                storage_name: self.name.clone(),
                file_name: event.file_name(),
                absolute_path: event.absolute_path.clone(),
                id: event.id,
                percent: percent(written, total),
            });
        };
        copy_chunked(&event.absolute_path, &to, report).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_core::Action;
    use chrono::Utc;
    use tempfile::TempDir;
    use tokio::sync::broadcast;

    fn event_for(root: &std::path::Path, path: &std::path::Path, size: u64) -> FileEvent {
        FileEvent::new(root, path, Action::Added, size, Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn stores_under_watch_name_and_relative_path() {
        let src_root = TempDir::new().unwrap();
        let dst_root = TempDir::new().unwrap();
        std::fs::create_dir_all(src_root.path().join("photos")).unwrap();
        let file = src_root.path().join("photos/a.jpg");
        std::fs::write(&file, b"jpeg bytes").unwrap();

        let (progress, _) = broadcast::channel(64);
        let provider = LocalProvider::new(dst_root.path(), progress);
        provider.setup().await.unwrap();

        let ev = event_for(src_root.path(), &file, 10);
        provider.store(&ev).await.unwrap();

        let expected = dst_root
            .path()
            .join(&ev.watch_name)
            .join("photos/a.jpg");
        assert_eq!(std::fs::read(expected).unwrap(), b"jpeg bytes");
    }

    #[tokio::test]
    async fn progress_sequence_ends_at_one_hundred() {
        let src_root = TempDir::new().unwrap();
        let dst_root = TempDir::new().unwrap();
        let file = src_root.path().join("a.bin");
        std::fs::write(&file, vec![1u8; 4096]).unwrap();

        let (progress, mut rx) = broadcast::channel(64);
        let provider = LocalProvider::new(dst_root.path(), progress);
        provider.setup().await.unwrap();

        let ev = event_for(src_root.path(), &file, 4096);
        provider.store(&ev).await.unwrap();

        let mut last = None;
        while let Ok(p) = rx.try_recv() {
            assert_eq!(p.storage_name, "local");
            assert_eq!(p.id, ev.id);
            if let Some(prev) = last {
                assert!(p.percent >= prev);
            }
            last = Some(p.percent);
        }
        assert_eq!(last, Some(100.0));
    }

    #[tokio::test]
    async fn missing_source_surfaces_an_error() {
        let src_root = TempDir::new().unwrap();
        let dst_root = TempDir::new().unwrap();
        let file = src_root.path().join("gone.txt");
        std::fs::write(&file, b"x").unwrap();
        let ev = event_for(src_root.path(), &file, 1);
        std::fs::remove_file(&file).unwrap();

        let (progress, _) = broadcast::channel(4);
        let provider = LocalProvider::new(dst_root.path(), progress);
        provider.setup().await.unwrap();

        assert!(provider.store(&ev).await.is_err());
    }
}
