//! Invoices derived from an accepted quote.
//!
//! # Workflow
//!
//! | Quote status       | Operation                  | Result                               |
//! |--------------------|----------------------------|--------------------------------------|
//! | `accepted`         | deposit invoice (pct)      | deposit invoice, quote `deposit_invoiced` |
//! | `accepted`         | balance invoice            | full invoice, quote `invoiced`       |
//! | `deposit_invoiced` | balance invoice            | balance invoice with a deposit credit, quote `invoiced` |
//!
//! Each operation returns the new invoice together with the updated quote.
//! Both must be persisted in one step; nothing here touches storage.
//!
//! The deposit is taxed at the quote's default rate. The balance is the
//! discounted HT total minus the deposit HT, also taxed at the default rate.
//! Both amounts are kept unrounded until the invoice totals are finalised,
//! so for a quote with a single tax rate deposit TTC plus balance TTC equals
//! the quote TTC.
//!
//! Derived invoices carry no cost or margin figures; margin is analysed on
//! the quote.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::calculations::common::percent_of;
use crate::calculations::{TotalsError, flat_rate_totals};
use crate::lifecycle::{LifecycleError, advance_quote};
use crate::numbering::{NumberAllocator, NumberingError};
use crate::{
    CompanySettings, Document, DocumentDetails, DocumentKind, DocumentStatus, DocumentTotals,
    InvoiceDetails, InvoiceKind, InvoiceLink, InvoiceStatus, LineItem, QuoteStatus,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DerivationError {
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    #[error("quote {number} is {status}; it must be accepted first")]
    NotAccepted { number: String, status: QuoteStatus },

    #[error("quote {number} already has deposit invoice {deposit_number}")]
    DuplicateDeposit {
        number: String,
        deposit_number: String,
    },

    #[error("quote {number} already has final invoice {invoice_number}")]
    DuplicateBalance {
        number: String,
        invoice_number: String,
    },

    #[error("deposit percentage must be above 0 and at most 100, got {0}")]
    InvalidDepositPercent(Decimal),

    #[error("quote {number} has nothing left to invoice (remaining {remaining})")]
    NothingLeftToInvoice { number: String, remaining: Decimal },

    #[error(transparent)]
    Totals(#[from] TotalsError),

    #[error(transparent)]
    Numbering(#[from] NumberingError),
}

/// New invoice plus the quote as it must be stored alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derivation {
    pub quote: Document,
    pub invoice: Document,
}

/// Invoices derived from the quote with id `quote_id`.
pub fn linked_invoices<'a>(
    quote_id: &'a str,
    documents: &'a [Document],
) -> impl Iterator<Item = &'a Document> + 'a {
    documents
        .iter()
        .filter(move |doc| doc.is_derived_from(quote_id))
}

/// The deposit invoice of a quote, if one was issued.
pub fn find_deposit_invoice<'a>(
    quote_id: &str,
    documents: &'a [Document],
) -> Option<&'a Document> {
    documents.iter().find(|doc| {
        doc.link()
            .is_some_and(|link| link.source_quote_id == quote_id && link.kind == InvoiceKind::Deposit)
    })
}

fn find_final_invoice<'a>(
    quote_id: &str,
    documents: &'a [Document],
) -> Option<&'a Document> {
    documents.iter().find(|doc| {
        doc.link()
            .is_some_and(|link| link.source_quote_id == quote_id && link.kind.is_final())
    })
}

/// Quote TTC minus the TTC of every invoice already derived from it.
pub fn remaining_balance(
    quote: &Document,
    documents: &[Document],
) -> Decimal {
    let invoiced: Decimal = linked_invoices(&quote.id, documents)
        .map(|invoice| invoice.totals.total_ttc)
        .sum();
    quote.totals.total_ttc - invoiced
}

/// Builds deposit and balance invoices, numbering them through the
/// configured allocator.
pub struct DerivationEngine<'a> {
    settings: &'a CompanySettings,
    allocator: &'a dyn NumberAllocator,
}

impl<'a> DerivationEngine<'a> {
    pub fn new(
        settings: &'a CompanySettings,
        allocator: &'a dyn NumberAllocator,
    ) -> Self {
        Self { settings, allocator }
    }

    /// Issues a deposit of `percent` of the quote's discounted HT total.
    ///
    /// `documents` must be a current snapshot of the store; it is used both
    /// for the duplicate-deposit guard and for numbering.
    ///
    /// # Errors
    /// * [`DerivationError::DuplicateDeposit`] if the quote already has one.
    /// * [`DerivationError::NotAccepted`] unless the quote is `accepted`.
    /// * [`DerivationError::InvalidDepositPercent`] outside `(0, 100]`.
    pub fn create_deposit_invoice(
        &self,
        quote: &Document,
        documents: &[Document],
        percent: Decimal,
        issue_date: NaiveDate,
    ) -> Result<Derivation, DerivationError> {
        let status = quote_status(quote)?;

        if let Some(existing) = find_deposit_invoice(&quote.id, documents) {
            warn!(quote = %quote.number, deposit = %existing.number, "deposit already issued");
            return Err(DerivationError::DuplicateDeposit {
                number: quote.number.clone(),
                deposit_number: existing.number.clone(),
            });
        }
        if !status.can_become(QuoteStatus::DepositInvoiced) {
            return Err(DerivationError::NotAccepted {
                number: quote.number.clone(),
                status,
            });
        }
        if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED {
            return Err(DerivationError::InvalidDepositPercent(percent));
        }

        let deposit_ht = percent_of(quote.totals.total_ht_after_discount, percent);
        let lines = vec![LineItem::new(
            format!("Deposit {}% on quote {}", percent.normalize(), quote.number),
            Decimal::ONE,
            "u",
            deposit_ht,
        )];
        let totals = flat_rate_totals(deposit_ht, quote.default_tax_rate, self.settings)?;

        let link = InvoiceLink {
            source_quote_id: quote.id.clone(),
            kind: InvoiceKind::Deposit,
            deposit_invoice_id: None,
            deposit_percent: Some(percent),
        };
        let invoice = self.invoice_for(quote, documents, issue_date, lines, totals, link)?;

        let mut updated_quote = advance_quote(quote, QuoteStatus::DepositInvoiced);
        if let Some(details) = updated_quote.quote_details_mut() {
            details.deposit_percent = Some(percent);
        }

        info!(
            quote = %quote.number,
            invoice = %invoice.number,
            %percent,
            total_ttc = %invoice.totals.total_ttc,
            "deposit invoice created"
        );
        Ok(Derivation {
            quote: updated_quote,
            invoice,
        })
    }

    /// Invoices whatever the deposit did not cover: a `balance` invoice when
    /// a deposit exists, a `full` invoice otherwise.
    ///
    /// The quote's lines are copied, followed by a discount line when the
    /// quote carries a global discount and a credit line for the deposit,
    /// so the lines add up to the balance HT.
    ///
    /// # Errors
    /// * [`DerivationError::DuplicateBalance`] if a final invoice exists.
    /// * [`DerivationError::NotAccepted`] unless the quote is `accepted` or
    ///   `deposit_invoiced`.
    /// * [`DerivationError::NothingLeftToInvoice`] when the remaining
    ///   balance is not positive.
    pub fn create_balance_invoice(
        &self,
        quote: &Document,
        documents: &[Document],
        issue_date: NaiveDate,
    ) -> Result<Derivation, DerivationError> {
        let status = quote_status(quote)?;

        if let Some(existing) = find_final_invoice(&quote.id, documents) {
            warn!(quote = %quote.number, invoice = %existing.number, "final invoice already issued");
            return Err(DerivationError::DuplicateBalance {
                number: quote.number.clone(),
                invoice_number: existing.number.clone(),
            });
        }
        if !status.can_become(QuoteStatus::Invoiced) {
            return Err(DerivationError::NotAccepted {
                number: quote.number.clone(),
                status,
            });
        }
        let remaining = remaining_balance(quote, documents);
        if remaining <= Decimal::ZERO {
            warn!(quote = %quote.number, %remaining, "nothing left to invoice");
            return Err(DerivationError::NothingLeftToInvoice {
                number: quote.number.clone(),
                remaining,
            });
        }

        let deposit = find_deposit_invoice(&quote.id, documents);
        // The deposit lines hold the unrounded amount that was taxed.
        let deposit_ht: Decimal = deposit
            .map(|d| d.lines.iter().map(LineItem::amount_ht).sum())
            .unwrap_or_default();
        let balance_ht = quote.totals.total_ht_after_discount - deposit_ht;

        let mut lines: Vec<LineItem> = quote.lines.iter().map(LineItem::duplicate).collect();
        if !quote.totals.discount_amount.is_zero() {
            lines.push(LineItem::new(
                format!("Discount {}%", quote.global_discount_percent.normalize()),
                Decimal::ONE,
                "u",
                -quote.totals.discount_amount,
            ));
        }
        if let Some(deposit) = deposit {
            lines.push(LineItem::new(
                format!("Deposit already invoiced ({})", deposit.number),
                Decimal::ONE,
                "u",
                -deposit_ht,
            ));
        }

        let totals = flat_rate_totals(balance_ht, quote.default_tax_rate, self.settings)?;
        let link = InvoiceLink {
            source_quote_id: quote.id.clone(),
            kind: if deposit.is_some() {
                InvoiceKind::Balance
            } else {
                InvoiceKind::Full
            },
            deposit_invoice_id: deposit.map(|d| d.id.clone()),
            deposit_percent: quote.quote_details().and_then(|q| q.deposit_percent),
        };
        let invoice = self.invoice_for(quote, documents, issue_date, lines, totals, link)?;

        info!(
            quote = %quote.number,
            invoice = %invoice.number,
            kind = invoice.link().map(|l| l.kind.as_str()),
            %balance_ht,
            total_ttc = %invoice.totals.total_ttc,
            "balance invoice created"
        );
        Ok(Derivation {
            quote: advance_quote(quote, QuoteStatus::Invoiced),
            invoice,
        })
    }

    fn invoice_for(
        &self,
        quote: &Document,
        documents: &[Document],
        issue_date: NaiveDate,
        lines: Vec<LineItem>,
        totals: DocumentTotals,
        link: InvoiceLink,
    ) -> Result<Document, NumberingError> {
        let number = self
            .allocator
            .allocate(documents, DocumentKind::Invoice, issue_date.year())?;

        Ok(Document {
            id: Uuid::new_v4().to_string(),
            number,
            client_id: quote.client_id.clone(),
            site_id: quote.site_id.clone(),
            issue_date,
            lines,
            default_tax_rate: quote.default_tax_rate,
            global_discount_percent: Decimal::ZERO,
            totals,
            notes: None,
            details: DocumentDetails::Invoice(InvoiceDetails {
                status: InvoiceStatus::Sent,
                link: Some(link),
            }),
        })
    }
}

fn quote_status(document: &Document) -> Result<QuoteStatus, LifecycleError> {
    match document.status() {
        DocumentStatus::Quote(status) => Ok(status),
        DocumentStatus::Invoice(_) => Err(LifecycleError::WrongDocumentKind {
            number: document.number.clone(),
            expected: DocumentKind::Quote,
            found: DocumentKind::Invoice,
        }),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::calculations::{TotalsInput, compute_totals};
    use crate::numbering::ScanAllocator;
    use crate::DocumentDraft;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 5, 4).unwrap()
    }

    fn accepted_quote(
        lines: Vec<LineItem>,
        discount: Decimal,
    ) -> Document {
        let settings = CompanySettings::default();
        let mut draft = DocumentDraft::quote(&settings, date())
            .with_client("c1")
            .with_default_tax_rate(dec!(20))
            .with_discount(discount);
        draft.lines = lines;
        let totals = compute_totals(&TotalsInput::from_draft(&draft), &settings).unwrap();
        let quote = Document::from_draft(draft, "q1".to_string(), "DEV-2026-00001".to_string(), totals);
        advance_quote(&quote, QuoteStatus::Accepted)
    }

    fn mixed_quote() -> Document {
        accepted_quote(
            vec![
                LineItem::new("Maçonnerie", dec!(1), "forfait", dec!(1000)).with_tax_rate(dec!(20)),
                LineItem::new("Isolation", dec!(1), "forfait", dec!(500)).with_tax_rate(dec!(10)),
            ],
            dec!(10),
        )
    }

    fn single_rate_quote() -> Document {
        accepted_quote(
            vec![
                LineItem::new("Peinture", dec!(95), "m²", dec!(65)),
                LineItem::new("Sols", dec!(75), "m²", dec!(51)),
            ],
            dec!(0),
        )
    }

    // =========================================================================
    // deposit tests
    // =========================================================================

    #[test]
    fn deposit_scenario() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();

        let result = engine
            .create_deposit_invoice(&quote, &[quote.clone()], dec!(30), date())
            .unwrap();

        let invoice = &result.invoice;
        assert_eq!(invoice.number, "FAC-2026-00001");
        assert_eq!(invoice.totals.total_ht, dec!(405));
        assert_eq!(invoice.totals.total_tax, dec!(81));
        assert_eq!(invoice.totals.total_ttc, dec!(486));
        assert_eq!(invoice.lines.len(), 1);
        assert_eq!(invoice.lines[0].description, "Deposit 30% on quote DEV-2026-00001");
        assert_eq!(invoice.status(), DocumentStatus::Invoice(InvoiceStatus::Sent));
        let link = invoice.link().unwrap();
        assert_eq!(link.kind, InvoiceKind::Deposit);
        assert_eq!(link.source_quote_id, "q1");
        assert_eq!(link.deposit_percent, Some(dec!(30)));

        assert_eq!(
            result.quote.status(),
            DocumentStatus::Quote(QuoteStatus::DepositInvoiced)
        );
        assert_eq!(result.quote.quote_details().unwrap().deposit_percent, Some(dec!(30)));
    }

    #[test]
    fn second_deposit_is_rejected() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();
        let first = engine
            .create_deposit_invoice(&quote, &[quote.clone()], dec!(30), date())
            .unwrap();
        let documents = vec![first.quote.clone(), first.invoice.clone()];

        let second = engine.create_deposit_invoice(&first.quote, &documents, dec!(20), date());

        assert_eq!(
            second,
            Err(DerivationError::DuplicateDeposit {
                number: "DEV-2026-00001".to_string(),
                deposit_number: first.invoice.number.clone(),
            })
        );
    }

    #[test]
    fn deposit_requires_accepted_quote() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = advance_quote(&mixed_quote(), QuoteStatus::Sent);

        let result = engine.create_deposit_invoice(&quote, &[], dec!(30), date());

        assert_eq!(
            result,
            Err(DerivationError::NotAccepted {
                number: "DEV-2026-00001".to_string(),
                status: QuoteStatus::Sent,
            })
        );
    }

    #[test]
    fn deposit_percent_must_be_positive() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();

        for percent in [dec!(0), dec!(-10), dec!(100.5)] {
            let result = engine.create_deposit_invoice(&quote, &[], percent, date());
            assert_eq!(result, Err(DerivationError::InvalidDepositPercent(percent)));
        }
    }

    #[test]
    fn vat_exempt_deposit_has_no_tax() {
        let settings = CompanySettings {
            vat_exempt: true,
            ..CompanySettings::default()
        };
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();

        let result = engine.create_deposit_invoice(&quote, &[], dec!(30), date()).unwrap();

        assert_eq!(result.invoice.totals.total_tax, dec!(0));
        assert_eq!(result.invoice.totals.total_ttc, dec!(405));
    }

    #[test]
    fn deposit_is_rounded_once() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = accepted_quote(vec![LineItem::new("Ragréage", dec!(1), "forfait", dec!(100.25))], dec!(0));

        let deposit = engine
            .create_deposit_invoice(&quote, &[quote.clone()], dec!(50), date())
            .unwrap();

        // 50.125 HT taxed as is; rounding the HT first would give 60.16.
        assert_eq!(deposit.invoice.lines[0].unit_price_ht, dec!(50.125));
        assert_eq!(deposit.invoice.totals.total_ht, dec!(50.13));
        assert_eq!(deposit.invoice.totals.total_ttc, dec!(60.15));

        let documents = vec![deposit.quote.clone(), deposit.invoice.clone()];
        let balance = engine
            .create_balance_invoice(&deposit.quote, &documents, date())
            .unwrap();
        assert_eq!(
            deposit.invoice.totals.total_ttc + balance.invoice.totals.total_ttc,
            quote.totals.total_ttc
        );
    }

    // =========================================================================
    // balance tests
    // =========================================================================

    #[test]
    fn balance_scenario_after_deposit() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();
        let deposit = engine
            .create_deposit_invoice(&quote, &[quote.clone()], dec!(30), date())
            .unwrap();
        let documents = vec![deposit.quote.clone(), deposit.invoice.clone()];

        let balance = engine
            .create_balance_invoice(&deposit.quote, &documents, date())
            .unwrap();

        let invoice = &balance.invoice;
        assert_eq!(invoice.number, "FAC-2026-00002");
        assert_eq!(invoice.totals.total_ht, dec!(945));
        let credit = invoice.lines.last().unwrap();
        assert_eq!(credit.amount_ht(), dec!(-405));
        let line_sum: Decimal = invoice.lines.iter().map(LineItem::amount_ht).sum();
        assert_eq!(line_sum, dec!(945));

        let link = invoice.link().unwrap();
        assert_eq!(link.kind, InvoiceKind::Balance);
        assert_eq!(link.deposit_invoice_id.as_deref(), Some(deposit.invoice.id.as_str()));
        assert_eq!(link.deposit_percent, Some(dec!(30)));
        assert_eq!(balance.quote.status(), DocumentStatus::Quote(QuoteStatus::Invoiced));
    }

    #[test]
    fn deposit_plus_balance_equals_quote_for_single_rate() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = single_rate_quote();
        let deposit = engine
            .create_deposit_invoice(&quote, &[quote.clone()], dec!(33), date())
            .unwrap();
        let documents = vec![deposit.quote.clone(), deposit.invoice.clone()];

        let balance = engine
            .create_balance_invoice(&deposit.quote, &documents, date())
            .unwrap();

        let sum = deposit.invoice.totals.total_ttc + balance.invoice.totals.total_ttc;
        assert!((sum - quote.totals.total_ttc).abs() <= dec!(0.01));
    }

    #[test]
    fn full_invoice_without_deposit() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = single_rate_quote();

        let result = engine
            .create_balance_invoice(&quote, &[quote.clone()], date())
            .unwrap();

        let link = result.invoice.link().unwrap();
        assert_eq!(link.kind, InvoiceKind::Full);
        assert_eq!(link.deposit_invoice_id, None);
        assert_eq!(result.invoice.lines.len(), quote.lines.len());
        assert_eq!(result.invoice.totals.total_ttc, quote.totals.total_ttc);
        assert_ne!(result.invoice.lines[0].id, quote.lines[0].id);
    }

    #[test]
    fn discount_is_carried_as_a_line() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();

        let result = engine.create_balance_invoice(&quote, &[], date()).unwrap();

        let discount = &result.invoice.lines[2];
        assert_eq!(discount.description, "Discount 10%");
        assert_eq!(discount.amount_ht(), dec!(-150));
        assert_eq!(result.invoice.totals.total_ht, dec!(1350));
    }

    #[test]
    fn derived_invoices_carry_no_margin() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = accepted_quote(
            vec![LineItem::new("Charpente", dec!(1), "forfait", dec!(2000)).with_cost(dec!(1200))],
            dec!(0),
        );
        let deposit = engine
            .create_deposit_invoice(&quote, &[quote.clone()], dec!(30), date())
            .unwrap();
        let documents = vec![deposit.quote.clone(), deposit.invoice.clone()];

        let balance = engine
            .create_balance_invoice(&deposit.quote, &documents, date())
            .unwrap();

        assert_eq!(quote.totals.gross_margin, dec!(800));
        for invoice in [&deposit.invoice, &balance.invoice] {
            assert_eq!(invoice.totals.total_cost, dec!(0));
            assert_eq!(invoice.totals.gross_margin, dec!(0));
            assert_eq!(invoice.totals.margin_percent, dec!(0));
        }
    }

    #[test]
    fn balance_keeps_line_sections() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = accepted_quote(
            vec![
                LineItem::new("Dépose", dec!(1), "forfait", dec!(300)).with_section("Cuisine"),
                LineItem::new("Faïence", dec!(12), "m²", dec!(45)).with_section("Salle de bain"),
            ],
            dec!(0),
        );

        let full = engine.create_balance_invoice(&quote, &[], date()).unwrap();

        let sections: Vec<Option<&str>> = full.invoice.lines.iter().map(|l| l.section.as_deref()).collect();
        assert_eq!(sections, vec![Some("Cuisine"), Some("Salle de bain")]);
        assert_eq!(full.invoice.totals.total_ht, dec!(840));
    }

    #[test]
    fn second_balance_is_rejected() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = single_rate_quote();
        let first = engine.create_balance_invoice(&quote, &[], date()).unwrap();
        let documents = vec![first.quote.clone(), first.invoice.clone()];

        let reopened = advance_quote(&first.quote, QuoteStatus::Accepted);
        let second = engine.create_balance_invoice(&reopened, &documents, date());

        assert!(matches!(second, Err(DerivationError::DuplicateBalance { .. })));
    }

    #[test]
    fn balance_requires_remaining_amount() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = single_rate_quote();
        let deposit = engine
            .create_deposit_invoice(&quote, &[], dec!(100), date())
            .unwrap();
        let documents = vec![deposit.quote.clone(), deposit.invoice.clone()];

        let result = engine.create_balance_invoice(&deposit.quote, &documents, date());

        assert!(matches!(
            result,
            Err(DerivationError::NothingLeftToInvoice { .. })
        ));
    }

    #[test]
    fn balance_rejects_declined_quote() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = advance_quote(&single_rate_quote(), QuoteStatus::Declined);

        let result = engine.create_balance_invoice(&quote, &[], date());

        assert!(matches!(result, Err(DerivationError::NotAccepted { .. })));
    }

    #[test]
    fn invoices_cannot_be_derived_from_invoices() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = single_rate_quote();
        let full = engine.create_balance_invoice(&quote, &[], date()).unwrap();

        let result = engine.create_deposit_invoice(&full.invoice, &[], dec!(30), date());

        assert!(matches!(result, Err(DerivationError::Lifecycle(_))));
    }

    // =========================================================================
    // query tests
    // =========================================================================

    #[test]
    fn remaining_balance_subtracts_linked_invoices() {
        let settings = CompanySettings::default();
        let engine = DerivationEngine::new(&settings, &ScanAllocator);
        let quote = mixed_quote();
        let deposit = engine
            .create_deposit_invoice(&quote, &[], dec!(30), date())
            .unwrap();
        let mut unrelated = deposit.invoice.clone();
        unrelated.totals.total_ttc = dec!(999);
        if let Some(invoice) = unrelated.invoice_details_mut() {
            invoice.link = None;
        }

        let documents = vec![deposit.invoice.clone(), unrelated];

        assert_eq!(remaining_balance(&quote, &documents), dec!(1089));
        assert_eq!(linked_invoices("q1", &documents).count(), 1);
    }
}
