//! Chooses the document store at startup.
//!
//! Each storage crate exposes one [`RepositoryFactory`]. The binary
//! registers all of them and opens whichever store the user named.

use std::collections::BTreeMap;

use async_trait::async_trait;

use super::repository::{DocumentRepository, RepositoryError};

/// Which store to open, and where.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbConfig {
    /// Lowercase backend name, `sqlite` or `memory`.
    pub backend: String,
    /// Where the backend keeps its documents. For SQLite a file path or
    /// `:memory:`; ignored by the in-memory store.
    pub location: String,
}

impl DbConfig {
    /// Backend names are matched case-insensitively.
    pub fn new(
        backend: &str,
        location: impl Into<String>,
    ) -> Self {
        Self {
            backend: backend.trim().to_ascii_lowercase(),
            location: location.into(),
        }
    }

    /// A store that lives as long as the process.
    pub fn in_memory() -> Self {
        Self::new("memory", "")
    }
}

#[async_trait]
pub trait RepositoryFactory: Send + Sync {
    /// Name accepted by `--backend`.
    fn backend_name(&self) -> &'static str;

    /// Opens the store at `config.location`, bringing its schema up to date.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn DocumentRepository>, RepositoryError>;
}

/// Known stores by backend name.
#[derive(Default)]
pub struct RepositoryRegistry {
    factories: BTreeMap<&'static str, Box<dyn RepositoryFactory>>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a store. A later factory with the same name wins.
    pub fn with(
        mut self,
        factory: impl RepositoryFactory + 'static,
    ) -> Self {
        self.factories.insert(factory.backend_name(), Box::new(factory));
        self
    }

    /// Registered backend names in alphabetical order.
    pub fn backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Opens the store `config` names.
    ///
    /// Fails with [`RepositoryError::Configuration`] when nothing is
    /// registered under that name, and otherwise passes on whatever the
    /// factory returns.
    pub async fn open(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn DocumentRepository>, RepositoryError> {
        let Some(factory) = self.factories.get(config.backend.as_str()) else {
            return Err(RepositoryError::Configuration(format!(
                "no '{}' store; choose one of: {}",
                config.backend,
                self.backends().join(", ")
            )));
        };
        factory.create(config).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::db::memory::MemoryRepository;

    /// Remembers every location it was asked to open.
    struct RecordingFactory {
        name: &'static str,
        opened: Arc<Mutex<Vec<String>>>,
    }

    impl RecordingFactory {
        fn new(name: &'static str) -> (Self, Arc<Mutex<Vec<String>>>) {
            let opened = Arc::new(Mutex::new(Vec::new()));
            (
                Self {
                    name,
                    opened: opened.clone(),
                },
                opened,
            )
        }
    }

    #[async_trait]
    impl RepositoryFactory for RecordingFactory {
        fn backend_name(&self) -> &'static str {
            self.name
        }

        async fn create(
            &self,
            config: &DbConfig,
        ) -> Result<Box<dyn DocumentRepository>, RepositoryError> {
            self.opened.lock().unwrap().push(config.location.clone());
            Ok(Box::new(MemoryRepository::new()))
        }
    }

    struct LockedFileFactory;

    #[async_trait]
    impl RepositoryFactory for LockedFileFactory {
        fn backend_name(&self) -> &'static str {
            "sqlite"
        }

        async fn create(
            &self,
            config: &DbConfig,
        ) -> Result<Box<dyn DocumentRepository>, RepositoryError> {
            Err(RepositoryError::Connection(format!("{} is locked", config.location)))
        }
    }

    // =========================================================================
    // config tests
    // =========================================================================

    #[test]
    fn backend_name_is_normalised() {
        let config = DbConfig::new(" SQLite ", "chantier.db");

        assert_eq!(config.backend, "sqlite");
        assert_eq!(config.location, "chantier.db");
    }

    #[test]
    fn in_memory_config_targets_memory_backend() {
        assert_eq!(DbConfig::in_memory().backend, "memory");
    }

    // =========================================================================
    // registry tests
    // =========================================================================

    #[test]
    fn backends_are_listed_alphabetically() {
        let registry = RepositoryRegistry::new()
            .with(RecordingFactory::new("sqlite").0)
            .with(RecordingFactory::new("memory").0);

        assert_eq!(registry.backends(), vec!["memory", "sqlite"]);
    }

    #[tokio::test]
    async fn location_reaches_only_the_named_store() {
        let (sqlite, sqlite_opened) = RecordingFactory::new("sqlite");
        let (memory, memory_opened) = RecordingFactory::new("memory");
        let registry = RepositoryRegistry::new().with(sqlite).with(memory);

        let repo = registry.open(&DbConfig::new("SQLITE", "devis.db")).await;

        assert!(repo.is_ok());
        assert_eq!(*sqlite_opened.lock().unwrap(), vec!["devis.db".to_string()]);
        assert!(memory_opened.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn later_registration_replaces_earlier() {
        let (first, first_opened) = RecordingFactory::new("sqlite");
        let (second, second_opened) = RecordingFactory::new("sqlite");
        let registry = RepositoryRegistry::new().with(first).with(second);

        registry.open(&DbConfig::new("sqlite", "a.db")).await.unwrap();

        assert_eq!(registry.backends(), vec!["sqlite"]);
        assert!(first_opened.lock().unwrap().is_empty());
        assert_eq!(second_opened.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn unknown_store_lists_the_choices() {
        let registry = RepositoryRegistry::new()
            .with(RecordingFactory::new("sqlite").0)
            .with(RecordingFactory::new("memory").0);

        match registry.open(&DbConfig::new("postgres", "")).await {
            Err(RepositoryError::Configuration(msg)) => {
                assert_eq!(msg, "no 'postgres' store; choose one of: memory, sqlite");
            }
            Err(other) => panic!("expected a configuration error, got {other:?}"),
            Ok(_) => panic!("expected a configuration error, got a store"),
        }
    }

    #[tokio::test]
    async fn store_failure_is_passed_on() {
        let registry = RepositoryRegistry::new().with(LockedFileFactory);

        let result = registry.open(&DbConfig::new("sqlite", "devis.db")).await;

        assert!(matches!(
            result,
            Err(RepositoryError::Connection(msg)) if msg == "devis.db is locked"
        ));
    }
}
