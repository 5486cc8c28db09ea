use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Document, DocumentKind};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The document number is already taken. Callers regenerate the number
    /// against a fresh snapshot and try again.
    #[error("Document number already in use: {0}")]
    NumberCollision(String),

    /// A uniqueness rule other than the number was violated, such as a
    /// second deposit invoice for the same quote.
    #[error("Conflicting write: {0}")]
    Conflict(String),
}

/// Document storage.
///
/// Implementations must reject a duplicate `number` with
/// [`RepositoryError::NumberCollision`] and must apply both writes of
/// [`commit_derivation`](Self::commit_derivation) or neither.
#[async_trait]
pub trait DocumentRepository: Send + Sync {
    async fn get_document(&self, id: &str) -> Result<Document, RepositoryError>;

    async fn find_by_number(&self, number: &str) -> Result<Option<Document>, RepositoryError>;

    /// Every document, or only those of `kind`, in insertion order.
    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<Document>, RepositoryError>;

    async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError>;

    async fn update_document(&self, document: &Document) -> Result<(), RepositoryError>;

    /// Inserts a derived invoice and stores the updated source quote
    /// atomically.
    async fn commit_derivation(
        &self,
        quote: &Document,
        invoice: &Document,
    ) -> Result<(), RepositoryError>;
}
