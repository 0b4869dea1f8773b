//! In-memory remote client
//!
//! Backs the remote provider in tests and in runs without real
//! credentials. Optionally sleeps a random few milliseconds per call to
//! shake out ordering assumptions, mirroring the latency of a real
//! service.

use crate::provider::StorageError;
use crate::remote::RemoteClient;
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Clone)]
struct FolderRecord {
    id: String,
    parent: Option<String>,
    name: String,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    folders: Vec<FolderRecord>,
    /// `(folder id, object name) -> content`
    objects: HashMap<(String, String), Vec<u8>>,
}

pub struct MemoryClient {
    inner: Mutex<Inner>,
    simulate_latency: bool,
}

impl MemoryClient {
    pub fn new(simulate_latency: bool) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            simulate_latency,
        }
    }

    async fn latency(&self) {
        if self.simulate_latency {
            let millis = rand::thread_rng().gen_range(2..20);
            tokio::time::sleep(Duration::from_millis(millis)).await;
        }
    }

    /// How many folders carry this name, across all parents. A correctly
    /// serialized provider never produces more than one per parent.
    pub fn folder_count(&self, name: &str) -> usize {
        self.inner
            .lock()
            .folders
            .iter()
            .filter(|f| f.name == name)
            .count()
    }

    pub fn object_count(&self) -> usize {
        self.inner.lock().objects.len()
    }

    /// Content of the uniquely-named object `name`, wherever it lives.
    pub fn object_data(&self, name: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .objects
            .iter()
            .find(|((_, n), _)| n == name)
            .map(|(_, data)| data.clone())
    }
}

#[async_trait]
impl RemoteClient for MemoryClient {
    async fn find_folder(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<Option<String>, StorageError> {
        self.latency().await;
        let inner = self.inner.lock();
        Ok(inner
            .folders
            .iter()
            .find(|f| f.parent.as_deref() == parent && f.name == name)
            .map(|f| f.id.clone()))
    }

    async fn create_folder(
        &self,
        parent: Option<&str>,
        name: &str,
    ) -> Result<String, StorageError> {
        self.latency().await;
        let mut inner = self.inner.lock();
        inner.next_id += 1;
        let id = format!("folder-{}", inner.next_id);
        // No uniqueness enforcement: like a real drive, racing creators
        // would end up with duplicate folders.
        inner.folders.push(FolderRecord {
            id: id.clone(),
            parent: parent.map(str::to_string),
            name: name.to_string(),
        });
        Ok(id)
    }

    async fn upload(
        &self,
        folder: &str,
        name: &str,
        _mime_type: &str,
        data: Vec<u8>,
    ) -> Result<(), StorageError> {
        self.latency().await;
        let mut inner = self.inner.lock();
        if !inner.folders.iter().any(|f| f.id == folder) {
            return Err(StorageError::Remote(format!(
                "upload into unknown folder [{folder}]"
            )));
        }
        inner
            .objects
            .insert((folder.to_string(), name.to_string()), data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn folders_are_scoped_to_their_parent() {
        let client = MemoryClient::new(false);
        let a = client.create_folder(None, "a").await.unwrap();
        let b = client.create_folder(None, "b").await.unwrap();
        client.create_folder(Some(&a), "sub").await.unwrap();

        assert_eq!(client.find_folder(Some(&a), "sub").await.unwrap().is_some(), true);
        assert!(client.find_folder(Some(&b), "sub").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn upload_requires_an_existing_folder() {
        let client = MemoryClient::new(false);
        let err = client.upload("nope", "a.txt", "text/plain", vec![1]).await;
        assert!(err.is_err());

        let id = client.create_folder(None, "root").await.unwrap();
        client.upload(&id, "a.txt", "text/plain", vec![1]).await.unwrap();
        assert_eq!(client.object_data("a.txt"), Some(vec![1]));
    }
}
