//! Process-local document store.
//!
//! Applies the same uniqueness rules as the SQL backends, so it can stand
//! in for them in tests and in throwaway sessions.

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::debug;

use super::factory::{DbConfig, RepositoryFactory};
use super::repository::{DocumentRepository, RepositoryError};
use crate::models::{Document, DocumentKind, InvoiceKind};

#[derive(Debug, Default)]
pub struct MemoryRepository {
    documents: Mutex<Vec<Document>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository pre-filled with `documents`, for tests.
    pub fn with_documents(documents: Vec<Document>) -> Self {
        Self {
            documents: Mutex::new(documents),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Document>> {
        self.documents.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn check_insert(
    documents: &[Document],
    new: &Document,
) -> Result<(), RepositoryError> {
    if documents.iter().any(|d| d.number == new.number) {
        return Err(RepositoryError::NumberCollision(new.number.clone()));
    }
    if documents.iter().any(|d| d.id == new.id) {
        return Err(RepositoryError::Conflict(format!("id {} already exists", new.id)));
    }
    let Some(link) = new.link() else {
        return Ok(());
    };
    let same_quote = documents
        .iter()
        .filter_map(Document::link)
        .filter(|other| other.source_quote_id == link.source_quote_id);

    for other in same_quote {
        if link.kind == InvoiceKind::Deposit && other.kind == InvoiceKind::Deposit {
            return Err(RepositoryError::Conflict(format!(
                "quote {} already has a deposit invoice",
                link.source_quote_id
            )));
        }
        if link.kind.is_final() && other.kind.is_final() {
            return Err(RepositoryError::Conflict(format!(
                "quote {} already has a final invoice",
                link.source_quote_id
            )));
        }
    }
    Ok(())
}

fn position(
    documents: &[Document],
    id: &str,
) -> Result<usize, RepositoryError> {
    documents
        .iter()
        .position(|d| d.id == id)
        .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
}

fn check_update(
    documents: &[Document],
    index: usize,
    updated: &Document,
) -> Result<(), RepositoryError> {
    let taken = documents
        .iter()
        .enumerate()
        .any(|(i, d)| i != index && d.number == updated.number);
    if taken {
        return Err(RepositoryError::NumberCollision(updated.number.clone()));
    }
    Ok(())
}

#[async_trait]
impl DocumentRepository for MemoryRepository {
    async fn get_document(&self, id: &str) -> Result<Document, RepositoryError> {
        let documents = self.lock();
        let index = position(&documents, id)?;
        Ok(documents[index].clone())
    }

    async fn find_by_number(&self, number: &str) -> Result<Option<Document>, RepositoryError> {
        Ok(self.lock().iter().find(|d| d.number == number).cloned())
    }

    async fn list_documents(
        &self,
        kind: Option<DocumentKind>,
    ) -> Result<Vec<Document>, RepositoryError> {
        Ok(self
            .lock()
            .iter()
            .filter(|d| kind.is_none_or(|k| d.kind() == k))
            .cloned()
            .collect())
    }

    async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError> {
        let mut documents = self.lock();
        check_insert(&documents, document)?;
        documents.push(document.clone());
        debug!(number = %document.number, "document inserted");
        Ok(())
    }

    async fn update_document(&self, document: &Document) -> Result<(), RepositoryError> {
        let mut documents = self.lock();
        let index = position(&documents, &document.id)?;
        check_update(&documents, index, document)?;
        documents[index] = document.clone();
        Ok(())
    }

    async fn commit_derivation(
        &self,
        quote: &Document,
        invoice: &Document,
    ) -> Result<(), RepositoryError> {
        // Both checks run before either write so a failure leaves the store
        // untouched.
        let mut documents = self.lock();
        let index = position(&documents, &quote.id)?;
        check_update(&documents, index, quote)?;
        check_insert(&documents, invoice)?;

        documents[index] = quote.clone();
        documents.push(invoice.clone());
        debug!(quote = %quote.number, invoice = %invoice.number, "derivation committed");
        Ok(())
    }
}

/// Registers the in-memory store under the `memory` backend name.
pub struct MemoryRepositoryFactory;

#[async_trait]
impl RepositoryFactory for MemoryRepositoryFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        _config: &DbConfig,
    ) -> Result<Box<dyn DocumentRepository>, RepositoryError> {
        Ok(Box::new(MemoryRepository::new()))
    }
}
