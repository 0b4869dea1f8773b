//! Remote provider: folder-mirroring, single-shot uploads
//!
//! Mirrors the relative path of each file as a remote folder hierarchy,
//! then creates-or-updates one remote object named after the file. The
//! object is uploaded as a single unit; there is no chunked resume.
//! Folder resolution is serialized by one mutex so that several files in
//! a newly created directory uploading concurrently cannot race each
//! other into duplicate folders. The wire protocol lives behind
//! [`RemoteClient`].

use crate::provider::{ProgressSink, StorageError, StorageProvider};
use arca_core::{FileEvent, Progress};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Minimal remote filesystem surface a provider needs: folder lookup,
/// folder creation, and whole-object upload.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Id of the folder `name` under `parent` (`None` = top level), if any.
    async fn find_folder(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<Option<String>, StorageError>;

    /// Create folder `name` under `parent` and return its id.
    async fn create_folder(&self, parent: Option<&str>, name: &str)
        -> Result<String, StorageError>;

    /// Create or update the object `name` inside `folder`.
    async fn upload(
        &self,
        folder: &str,
        name: &str,
        mime_type: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError>;
}

#[derive(Default)]
struct FolderState {
    root_id: Option<String>,
    /// Resolved folder ids keyed by path relative to the remote root
    resolved: HashMap<PathBuf, String>,
}

pub struct RemoteProvider<C> {
    name: String,
    client: C,
    /// Name of the top-level remote folder everything lives under
    root_folder: String,
    // One lock for all folder resolution; see module docs.
    state: Mutex<FolderState>,
    progress: ProgressSink,
}

impl<C: RemoteClient> RemoteProvider<C> {
    pub fn new(
        name: impl Into<String>,
        client: C,
        root_folder: impl Into<String>,
        progress: ProgressSink,
    ) -> Self {
        Self {
            name: name.into(),
            client,
            root_folder: root_folder.into(),
            state: Mutex::new(FolderState::default()),
            progress,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    async fn find_or_create(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<String, StorageError> {
        if let Some(id) = self.client.find_folder(parent, name).await? {
            return Ok(id);
        }
        self.client.create_folder(parent, name).await
    }

    /// Resolve (lazily creating) the folder chain for one file:
    /// `<root folder>/<watch name>/<relative dir components...>`.
    async fn resolve_folder(&self, event: &FileEvent) -> Result<String, StorageError> {
        let mut state = self.state.lock().await;

        let root_id = match &state.root_id {
            Some(id) => id.clone(),
            None => {
                let id = self.find_or_create(None, &self.root_folder).await?;
                state.root_id = Some(id.clone());
                id
            }
        };

        let mut chain = PathBuf::from(&event.watch_name);
        if let Some(parent) = event.relative_path.parent() {
            chain.push(parent);
        }

        let mut current = root_id;
        let mut resolved_so_far = PathBuf::new();
        for component in chain.components() {
            let name: &Path = component.as_ref();
            resolved_so_far.push(name);
            if let Some(id) = state.resolved.get(&resolved_so_far) {
                current = id.clone();
                continue;
            }
            let id = self
                .find_or_create(Some(&current), &name.to_string_lossy())
                .await?;
            state.resolved.insert(resolved_so_far.clone(), id.clone());
            current = id;
        }
        Ok(current)
    }
}

#[async_trait]
impl<C: RemoteClient> StorageProvider for RemoteProvider<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn setup(&self) -> Result<bool, StorageError> {
        let id = self.find_or_create(None, &self.root_folder).await?;
        self.state.lock().await.root_id = Some(id);
        info!(provider = %self.name, folder = %self.root_folder, "remote provider ready");
        Ok(true)
    }

    async fn store(&self, event: &FileEvent) -> Result<(), StorageError> {
        let data = tokio::fs::read(&event.absolute_path)
            .await
            .map_err(|source| StorageError::Source {
                path: event.absolute_path.clone(),
                source,
            })?;

        let folder = self.resolve_folder(event).await?;
        let file_name = event.file_name();
        debug!(
            provider = %self.name,
            file = %file_name,
            folder = %folder,
            bytes = data.len(),
            "remote upload"
        );
        self.client
            .upload(&folder, &file_name, &event.mime_type, data)
            .await?;

        let _ = self.progress.send(Progress {
            storage_name: self.name.clone(),
            file_name,
            absolute_path: event.absolute_path.clone(),
            id: event.id,
            percent: 100.0,
        });
        Ok(())
    }
}
