//! Named provider registry
//!
//! An explicit object owned by the engine instance; no process-global
//! state. Registration order is preserved and the first registration
//! under a name wins.

use crate::guard::InProgressGuard;
use crate::provider::{StorageError, StorageProvider};
use arca_core::Message;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{error, info, warn};

pub struct StorageRegistry {
    providers: RwLock<Vec<Arc<dyn StorageProvider>>>,
    guard: InProgressGuard,
}

impl Default for StorageRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageRegistry {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(Vec::new()),
            guard: InProgressGuard::new(),
        }
    }

    /// Register a provider under its own name.
    ///
    /// An empty name is a programming error and is rejected. A duplicate
    /// name is rejected with a warning; the first registration stays in
    /// place and the process continues.
    pub fn register(&self, provider: Arc<dyn StorageProvider>) -> Result<(), StorageError> {
        let name = provider.name().to_string();
        if name.is_empty() {
            error!("refusing to register a provider with an empty name");
            return Err(StorageError::EmptyName);
        }

        let mut providers = self.providers.write();
        if providers.iter().any(|p| p.name() == name) {
            warn!(provider = %name, "duplicate registration ignored, first wins");
            return Err(StorageError::Duplicate(name));
        }

        info!(provider = %name, "storage provider registered");
        providers.push(provider);
        Ok(())
    }

    /// Remove a provider from the active set.
    pub fn unregister(&self, name: &str) {
        self.providers.write().retain(|p| p.name() != name);
    }

    /// Every currently registered provider, in registration order.
    pub fn get_all(&self) -> Vec<Arc<dyn StorageProvider>> {
        self.providers.read().clone()
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn StorageProvider>> {
        self.providers.read().iter().find(|p| p.name() == name).cloned()
    }

    pub fn len(&self) -> usize {
        self.providers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.read().is_empty()
    }

    pub fn guard(&self) -> &InProgressGuard {
        &self.guard
    }

    /// Run `setup` on every registered provider. Unconfigured providers
    /// are dropped for the run; activation failures are dropped too and
    /// reported on the message stream. One provider failing never affects
    /// another.
    pub async fn setup_all(&self, messages: &broadcast::Sender<Message>) {
        for provider in self.get_all() {
            let name = provider.name().to_string();
            match provider.setup().await {
                Ok(true) => info!(provider = %name, "storage provider ready"),
                Ok(false) => {
                    info!(provider = %name, "storage provider not configured, skipping");
                    self.unregister(&name);
                }
                Err(e) => {
                    error!(provider = %name, "storage provider setup failed: {e}");
                    let _ = messages.send(Message::error(e.to_string(), name.clone()));
                    self.unregister(&name);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arca_core::FileEvent;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct TestProvider {
        name: String,
        setup_active: bool,
        setup_fails: bool,
        stores: AtomicUsize,
    }

    impl TestProvider {
        fn named(name: &str) -> Arc<Self> {
            Arc::new(Self {
                name: name.to_string(),
                setup_active: true,
                setup_fails: false,
                stores: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl StorageProvider for TestProvider {
        fn name(&self) -> &str {
            &self.name
        }

        async fn setup(&self) -> Result<bool, StorageError> {
            if self.setup_fails {
                return Err(StorageError::MissingSetting("credentials"));
            }
            Ok(self.setup_active)
        }

        async fn store(&self, _event: &FileEvent) -> Result<(), StorageError> {
            self.stores.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn empty_name_is_rejected() {
        let registry = StorageRegistry::new();
        let err = registry.register(TestProvider::named("")).unwrap_err();
        assert!(matches!(err, StorageError::EmptyName));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn duplicate_registration_keeps_the_first() {
        let registry = StorageRegistry::new();
        let first = TestProvider::named("local");
        let second = TestProvider::named("local");
        registry.register(first.clone()).unwrap();
        let err = registry.register(second.clone()).unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(_)));
        assert_eq!(registry.len(), 1);

        // Storing through the registry reaches the first instance only.
        let ev = FileEvent::new(
            std::path::Path::new("/data"),
            std::path::Path::new("/data/a.txt"),
            arca_core::Action::Added,
            1,
            chrono::Utc::now(),
        )
        .unwrap();
        registry.get("local").unwrap().store(&ev).await.unwrap();
        assert_eq!(first.stores.load(Ordering::SeqCst), 1);
        assert_eq!(second.stores.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn setup_drops_unconfigured_providers() {
        let registry = StorageRegistry::new();
        registry.register(TestProvider::named("active")).unwrap();
        registry
            .register(Arc::new(TestProvider {
                name: "inactive".into(),
                setup_active: false,
                setup_fails: false,
                stores: AtomicUsize::new(0),
            }))
            .unwrap();

        let (messages, _) = broadcast::channel(4);
        registry.setup_all(&messages).await;

        assert_eq!(registry.len(), 1);
        assert!(registry.get("active").is_some());
        assert!(registry.get("inactive").is_none());
    }

    #[tokio::test]
    async fn setup_failure_only_affects_that_provider() {
        let registry = StorageRegistry::new();
        registry
            .register(Arc::new(TestProvider {
                name: "broken".into(),
                setup_active: true,
                setup_fails: true,
                stores: AtomicUsize::new(0),
            }))
            .unwrap();
        registry.register(TestProvider::named("healthy")).unwrap();

        let (messages, mut rx) = broadcast::channel(4);
        registry.setup_all(&messages).await;

        assert_eq!(registry.len(), 1);
        assert!(registry.get("healthy").is_some());
        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.source, "broken");
    }
}
