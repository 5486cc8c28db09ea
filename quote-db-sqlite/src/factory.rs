use async_trait::async_trait;

use quote_core::db::{DbConfig, DocumentRepository, RepositoryError, RepositoryFactory};

use crate::repository::SqliteRepository;

/// [`RepositoryFactory`] for SQLite.
///
/// Register this with a [`quote_core::db::RepositoryRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use quote_core::db::RepositoryRegistry;
/// use quote_db_sqlite::SqliteRepositoryFactory;
///
/// let registry = RepositoryRegistry::new().with(SqliteRepositoryFactory);
/// assert_eq!(registry.backends(), vec!["sqlite"]);
/// ```
pub struct SqliteRepositoryFactory;

#[async_trait]
impl RepositoryFactory for SqliteRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the database described by `config.location` and bring
    /// its schema up to date.
    ///
    /// Accepted values:
    /// * A bare file path, e.g. `"quotebook.db"`. Created if missing.
    /// * `":memory:"`, an ephemeral database.
    async fn create(
        &self,
        config: &DbConfig,
    ) -> Result<Box<dyn DocumentRepository>, RepositoryError> {
        let repo = SqliteRepository::new(&config.location).await?;
        repo.run_migrations().await?;
        Ok(Box::new(repo))
    }
}

#[cfg(test)]
mod tests {
    use quote_core::db::{DbConfig, RepositoryFactory};

    use super::SqliteRepositoryFactory;

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteRepositoryFactory.backend_name(), "sqlite");
    }

    #[tokio::test]
    async fn creates_in_memory_repository() {
        let config = DbConfig::new("sqlite", ":memory:");

        let repo = SqliteRepositoryFactory.create(&config).await;

        match repo {
            Ok(repo) => assert!(repo.list_documents(None).await.unwrap().is_empty()),
            Err(e) => panic!("failed to create in-memory repository: {e}"),
        }
    }
}
