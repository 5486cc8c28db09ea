//! Persistence-aware entry points for the document workflow.
//!
//! The pure modules compute new document values; this layer loads the
//! current state, applies them and writes the result back. Number
//! assignment is treated as part of the insert: when the store rejects a
//! number as already taken, the service takes a fresh snapshot, allocates
//! again and retries up to [`CompanySettings::max_number_attempts`] times.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculations::{TotalsError, TotalsInput, compute_totals};
use crate::db::repository::{DocumentRepository, RepositoryError};
use crate::derivation::{Derivation, DerivationEngine, DerivationError, remaining_balance};
use crate::lifecycle::{self, LifecycleError, SendChannel};
use crate::numbering::{NumberAllocator, NumberingError, ScanAllocator};
use crate::validation::{ValidationErrors, validate_draft};
use crate::{CompanySettings, Document, DocumentDraft, DocumentStatus, Signature};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    #[error(transparent)]
    Totals(#[from] TotalsError),

    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error(transparent)]
    Derivation(#[from] DerivationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Numbering(#[from] NumberingError),

    #[error("{number} is no longer a draft; its totals are frozen")]
    NotADraft { number: String },
}

pub struct DocumentService<'r> {
    repo: &'r dyn DocumentRepository,
    settings: CompanySettings,
    allocator: Box<dyn NumberAllocator>,
}

impl<'r> DocumentService<'r> {
    /// Service numbering documents by scanning the store.
    pub fn new(
        repo: &'r dyn DocumentRepository,
        settings: CompanySettings,
    ) -> Self {
        Self {
            repo,
            settings,
            allocator: Box::new(ScanAllocator),
        }
    }

    pub fn with_allocator(
        mut self,
        allocator: Box<dyn NumberAllocator>,
    ) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn settings(&self) -> &CompanySettings {
        &self.settings
    }

    fn attempts(&self) -> u32 {
        self.settings.max_number_attempts.max(1)
    }

    /// Validates, totals, numbers and stores a new document in `draft`
    /// status.
    ///
    /// # Errors
    /// * [`ServiceError::Validation`] with every field problem found.
    /// * [`RepositoryError::NumberCollision`] when every attempt collided.
    pub async fn create_document(
        &self,
        draft: DocumentDraft,
    ) -> Result<Document, ServiceError> {
        validate_draft(&draft).inspect_err(|e| warn!(error = %e, "draft rejected"))?;
        let totals = compute_totals(&TotalsInput::from_draft(&draft), &self.settings)?;

        let kind = draft.kind;
        let year = draft.issue_date.year();
        let mut document = Document::from_draft(draft, Uuid::new_v4().to_string(), String::new(), totals);

        for attempt in 1..=self.attempts() {
            let existing = self.repo.list_documents(Some(kind)).await?;
            document.number = self.allocator.allocate(&existing, kind, year)?;

            match self.repo.insert_document(&document).await {
                Ok(()) => {
                    info!(
                        number = %document.number,
                        %kind,
                        total_ttc = %document.totals.total_ttc,
                        "document created"
                    );
                    return Ok(document);
                }
                Err(RepositoryError::NumberCollision(number)) => {
                    warn!(%number, attempt, "number already taken, retrying");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::NumberCollision(document.number).into())
    }

    pub async fn get(
        &self,
        id: &str,
    ) -> Result<Document, ServiceError> {
        Ok(self.repo.get_document(id).await?)
    }

    pub async fn send(
        &self,
        id: &str,
        channel: SendChannel,
    ) -> Result<Document, ServiceError> {
        let document = self.repo.get_document(id).await?;
        let updated = lifecycle::mark_sent(&document, channel);
        self.store_if_changed(&document, updated).await
    }

    pub async fn mark_viewed(
        &self,
        id: &str,
    ) -> Result<Document, ServiceError> {
        let document = self.repo.get_document(id).await?;
        let updated = lifecycle::mark_viewed(&document);
        self.store_if_changed(&document, updated).await
    }

    pub async fn accept(
        &self,
        id: &str,
        signature: Option<Signature>,
    ) -> Result<Document, ServiceError> {
        let document = self.repo.get_document(id).await?;
        let updated = lifecycle::accept(&document, signature)?;
        self.repo.update_document(&updated).await?;
        Ok(updated)
    }

    pub async fn decline(
        &self,
        id: &str,
    ) -> Result<Document, ServiceError> {
        let document = self.repo.get_document(id).await?;
        let updated = lifecycle::decline(&document)?;
        self.repo.update_document(&updated).await?;
        Ok(updated)
    }

    /// Manual status override; see [`lifecycle::set_status`].
    pub async fn set_status(
        &self,
        id: &str,
        status: DocumentStatus,
    ) -> Result<Document, ServiceError> {
        let document = self.repo.get_document(id).await?;
        let updated = lifecycle::set_status(&document, status)?;
        self.repo.update_document(&updated).await?;
        Ok(updated)
    }

    /// Derives a deposit invoice. `percent` falls back to
    /// [`CompanySettings::default_deposit_percent`].
    pub async fn create_deposit_invoice(
        &self,
        quote_id: &str,
        percent: Option<Decimal>,
        issue_date: NaiveDate,
    ) -> Result<Derivation, ServiceError> {
        let percent = percent.unwrap_or(self.settings.default_deposit_percent);
        self.derive(quote_id, |engine, quote, documents| {
            engine.create_deposit_invoice(quote, documents, percent, issue_date)
        })
        .await
    }

    pub async fn create_balance_invoice(
        &self,
        quote_id: &str,
        issue_date: NaiveDate,
    ) -> Result<Derivation, ServiceError> {
        self.derive(quote_id, |engine, quote, documents| {
            engine.create_balance_invoice(quote, documents, issue_date)
        })
        .await
    }

    /// Quote TTC not yet covered by derived invoices.
    pub async fn remaining_balance(
        &self,
        quote_id: &str,
    ) -> Result<Decimal, ServiceError> {
        let quote = self.repo.get_document(quote_id).await?;
        let documents = self.repo.list_documents(None).await?;
        Ok(remaining_balance(&quote, &documents))
    }

    /// Recomputes and stores the totals of a draft. Issued documents keep
    /// the snapshot taken when they left the draft status.
    pub async fn recompute_totals(
        &self,
        id: &str,
    ) -> Result<Document, ServiceError> {
        let mut document = self.repo.get_document(id).await?;
        if !document.is_draft() {
            return Err(ServiceError::NotADraft {
                number: document.number,
            });
        }

        document.totals = compute_totals(&TotalsInput::from_document(&document), &self.settings)?;
        self.repo.update_document(&document).await?;
        Ok(document)
    }

    async fn store_if_changed(
        &self,
        before: &Document,
        after: Document,
    ) -> Result<Document, ServiceError> {
        if &after != before {
            self.repo.update_document(&after).await?;
        }
        Ok(after)
    }

    /// Runs a derivation against a fresh snapshot and commits it, retrying
    /// with a new snapshot when the invoice number was taken meanwhile.
    async fn derive<F>(
        &self,
        quote_id: &str,
        build: F,
    ) -> Result<Derivation, ServiceError>
    where
        F: Fn(&DerivationEngine<'_>, &Document, &[Document]) -> Result<Derivation, DerivationError>,
    {
        let engine = DerivationEngine::new(&self.settings, self.allocator.as_ref());
        let mut last_number = String::new();

        for attempt in 1..=self.attempts() {
            let quote = self.repo.get_document(quote_id).await?;
            let documents = self.repo.list_documents(None).await?;
            let derivation = build(&engine, &quote, &documents)?;

            match self
                .repo
                .commit_derivation(&derivation.quote, &derivation.invoice)
                .await
            {
                Ok(()) => return Ok(derivation),
                Err(RepositoryError::NumberCollision(number)) => {
                    warn!(%number, attempt, "invoice number already taken, retrying");
                    last_number = number;
                }
                Err(e) => return Err(e.into()),
            }
        }

        Err(RepositoryError::NumberCollision(last_number).into())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::db::memory::MemoryRepository;
    use crate::models::{DocumentKind, InvoiceStatus, LineItem, QuoteStatus};

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 9, 14).unwrap()
    }

    fn quote_draft(settings: &CompanySettings) -> DocumentDraft {
        DocumentDraft::quote(settings, date())
            .with_client("c1")
            .with_default_tax_rate(dec!(20))
            .with_discount(dec!(10))
            .with_line(LineItem::new("Maçonnerie", dec!(1), "forfait", dec!(1000)).with_tax_rate(dec!(20)))
            .with_line(LineItem::new("Isolation", dec!(1), "forfait", dec!(500)).with_tax_rate(dec!(10)))
    }

    /// Wraps a memory store and rejects the first `remaining` inserts as
    /// number collisions, the way a concurrent writer would.
    struct CollidingRepository {
        inner: MemoryRepository,
        remaining: AtomicU32,
    }

    impl CollidingRepository {
        fn new(collisions: u32) -> Self {
            Self {
                inner: MemoryRepository::new(),
                remaining: AtomicU32::new(collisions),
            }
        }

        fn collide(
            &self,
            number: &str,
        ) -> Result<(), RepositoryError> {
            let left = self.remaining.load(Ordering::SeqCst);
            if left > 0 {
                self.remaining.store(left - 1, Ordering::SeqCst);
                return Err(RepositoryError::NumberCollision(number.to_string()));
            }
            Ok(())
        }
    }

    #[async_trait]
    impl DocumentRepository for CollidingRepository {
        async fn get_document(&self, id: &str) -> Result<Document, RepositoryError> {
            self.inner.get_document(id).await
        }

        async fn find_by_number(&self, number: &str) -> Result<Option<Document>, RepositoryError> {
            self.inner.find_by_number(number).await
        }

        async fn list_documents(
            &self,
            kind: Option<DocumentKind>,
        ) -> Result<Vec<Document>, RepositoryError> {
            self.inner.list_documents(kind).await
        }

        async fn insert_document(&self, document: &Document) -> Result<(), RepositoryError> {
            self.collide(&document.number)?;
            self.inner.insert_document(document).await
        }

        async fn update_document(&self, document: &Document) -> Result<(), RepositoryError> {
            self.inner.update_document(document).await
        }

        async fn commit_derivation(
            &self,
            quote: &Document,
            invoice: &Document,
        ) -> Result<(), RepositoryError> {
            self.collide(&invoice.number)?;
            self.inner.commit_derivation(quote, invoice).await
        }
    }

    // =========================================================================
    // creation tests
    // =========================================================================

    #[tokio::test]
    async fn create_assigns_number_and_totals() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());

        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();

        assert_eq!(quote.number, "DEV-2026-00001");
        assert_eq!(quote.status(), DocumentStatus::Quote(QuoteStatus::Draft));
        assert_eq!(quote.totals.total_ttc, dec!(1575));
        assert_eq!(repo.get_document(&quote.id).await.unwrap(), quote);
    }

    #[tokio::test]
    async fn invalid_draft_is_not_stored() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let draft = DocumentDraft::quote(service.settings(), date());

        let result = service.create_document(draft).await;

        assert!(matches!(result, Err(ServiceError::Validation(_))));
        assert!(repo.list_documents(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn oversized_line_is_refused_without_panicking() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let draft = quote_draft(service.settings()).with_line(LineItem::new(
            "Erreur de saisie",
            dec!(100000000000000000),
            "u",
            dec!(100000000000000000),
        ));

        let result = service.create_document(draft).await;

        assert!(matches!(&result, Err(ServiceError::Validation(e)) if e.has_field("lines[2]")));
        assert!(repo.list_documents(None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn total_too_large_is_a_totals_error() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let draft = quote_draft(service.settings())
            .with_line(LineItem::new("Forfait", dec!(1), "u", dec!(5000000000000000000000000000)));

        let result = service.create_document(draft).await;

        assert!(matches!(result, Err(ServiceError::Totals(TotalsError::Overflow))));
    }

    #[tokio::test]
    async fn create_retries_after_collision() {
        let repo = CollidingRepository::new(2);
        let service = DocumentService::new(&repo, CompanySettings::default());

        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();

        assert_eq!(quote.number, "DEV-2026-00001");
        assert_eq!(repo.list_documents(None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn create_gives_up_after_max_attempts() {
        let repo = CollidingRepository::new(10);
        let settings = CompanySettings {
            max_number_attempts: 3,
            ..CompanySettings::default()
        };
        let service = DocumentService::new(&repo, settings);

        let result = service.create_document(quote_draft(service.settings())).await;

        assert!(matches!(
            result,
            Err(ServiceError::Repository(RepositoryError::NumberCollision(_)))
        ));
        assert_eq!(repo.remaining.load(Ordering::SeqCst), 7);
    }

    // =========================================================================
    // workflow tests
    // =========================================================================

    #[tokio::test]
    async fn full_workflow_from_quote_to_balance() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();

        service.send(&quote.id, SendChannel::Email).await.unwrap();
        service.mark_viewed(&quote.id).await.unwrap();
        service.accept(&quote.id, None).await.unwrap();

        let deposit = service
            .create_deposit_invoice(&quote.id, None, date())
            .await
            .unwrap();
        assert_eq!(deposit.invoice.totals.total_ttc, dec!(486));
        assert_eq!(deposit.invoice.status(), DocumentStatus::Invoice(InvoiceStatus::Sent));

        let balance = service.create_balance_invoice(&quote.id, date()).await.unwrap();
        assert_eq!(balance.invoice.totals.total_ht, dec!(945));

        let stored = repo.get_document(&quote.id).await.unwrap();
        assert_eq!(stored.status(), DocumentStatus::Quote(QuoteStatus::Invoiced));
        assert_eq!(repo.list_documents(Some(DocumentKind::Invoice)).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_deposit_leaves_one_deposit() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();
        service.accept(&quote.id, None).await.unwrap();
        service.create_deposit_invoice(&quote.id, Some(dec!(30)), date()).await.unwrap();

        let second = service.create_deposit_invoice(&quote.id, Some(dec!(30)), date()).await;

        assert!(matches!(
            second,
            Err(ServiceError::Derivation(DerivationError::DuplicateDeposit { .. }))
        ));
        assert_eq!(repo.list_documents(Some(DocumentKind::Invoice)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn derivation_retries_after_collision() {
        let repo = CollidingRepository::new(0);
        let service = DocumentService::new(&repo, CompanySettings::default());
        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();
        service.accept(&quote.id, None).await.unwrap();
        repo.remaining.store(1, Ordering::SeqCst);

        let deposit = service
            .create_deposit_invoice(&quote.id, Some(dec!(30)), date())
            .await
            .unwrap();

        assert_eq!(deposit.invoice.number, "FAC-2026-00001");
        assert_eq!(repo.list_documents(Some(DocumentKind::Invoice)).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn viewing_a_draft_writes_nothing() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();

        let unchanged = service.mark_viewed(&quote.id).await.unwrap();

        assert_eq!(unchanged, quote);
    }

    #[tokio::test]
    async fn remaining_balance_after_deposit() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();
        service.accept(&quote.id, None).await.unwrap();
        service.create_deposit_invoice(&quote.id, Some(dec!(30)), date()).await.unwrap();

        assert_eq!(service.remaining_balance(&quote.id).await.unwrap(), dec!(1089));
    }

    // =========================================================================
    // recompute tests
    // =========================================================================

    #[tokio::test]
    async fn recompute_updates_draft_totals() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let mut quote = service.create_document(quote_draft(service.settings())).await.unwrap();
        quote.global_discount_percent = dec!(0);
        repo.update_document(&quote).await.unwrap();

        let recomputed = service.recompute_totals(&quote.id).await.unwrap();

        assert_eq!(recomputed.totals.total_ttc, dec!(1750));
    }

    #[tokio::test]
    async fn recompute_refuses_issued_documents() {
        let repo = MemoryRepository::new();
        let service = DocumentService::new(&repo, CompanySettings::default());
        let quote = service.create_document(quote_draft(service.settings())).await.unwrap();
        service.send(&quote.id, SendChannel::Link).await.unwrap();

        let result = service.recompute_totals(&quote.id).await;

        assert!(matches!(result, Err(ServiceError::NotADraft { .. })));
    }
}
