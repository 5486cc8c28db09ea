use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{
    CompanySettings, DocumentKind, DocumentStatus, DocumentTotals, InvoiceStatus, LineItem,
    QuoteStatus,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceKind {
    Deposit,
    Balance,
    Full,
}

impl InvoiceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Deposit => "deposit",
            Self::Balance => "balance",
            Self::Full => "full",
        }
    }

    /// Balance and full invoices close a quote; at most one may exist.
    pub fn is_final(&self) -> bool {
        matches!(self, Self::Balance | Self::Full)
    }
}

/// Link from an invoice back to the quote it was derived from.
///
/// Kind and source quote live in one value so neither can be set without
/// the other.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceLink {
    pub source_quote_id: String,
    pub kind: InvoiceKind,
    pub deposit_invoice_id: Option<String>,
    pub deposit_percent: Option<Decimal>,
}

/// Acceptance metadata attached when the client signs a quote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signed_by: String,
    pub signed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuoteDetails {
    pub status: QuoteStatus,
    pub validity_days: u32,
    /// Apply the retention-of-guarantee holdback to the TTC total.
    pub use_retention: bool,
    /// Set once a deposit invoice has been derived.
    pub deposit_percent: Option<Decimal>,
    pub signature: Option<Signature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoiceDetails {
    pub status: InvoiceStatus,
    pub link: Option<InvoiceLink>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DocumentDetails {
    Quote(QuoteDetails),
    Invoice(InvoiceDetails),
}

/// A persisted quote or invoice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    /// `DEV-YYYY-NNNNN` or `FAC-YYYY-NNNNN`.
    pub number: String,
    pub client_id: String,
    pub site_id: Option<String>,
    pub issue_date: NaiveDate,
    pub lines: Vec<LineItem>,
    pub default_tax_rate: Decimal,
    pub global_discount_percent: Decimal,
    pub totals: DocumentTotals,
    /// Free text printed below the lines (payment terms, site access...).
    #[serde(default)]
    pub notes: Option<String>,
    pub details: DocumentDetails,
}

impl Document {
    /// Turns a validated draft into a document in its initial `draft` status.
    pub fn from_draft(
        draft: DocumentDraft,
        id: String,
        number: String,
        totals: DocumentTotals,
    ) -> Self {
        let details = match draft.kind {
            DocumentKind::Quote => DocumentDetails::Quote(QuoteDetails {
                status: QuoteStatus::Draft,
                validity_days: draft.validity_days,
                use_retention: draft.use_retention,
                deposit_percent: None,
                signature: None,
            }),
            DocumentKind::Invoice => DocumentDetails::Invoice(InvoiceDetails {
                status: InvoiceStatus::Draft,
                link: None,
            }),
        };

        Self {
            id,
            number,
            client_id: draft.client_id.unwrap_or_default(),
            site_id: draft.site_id,
            issue_date: draft.issue_date,
            lines: draft.lines,
            default_tax_rate: draft.default_tax_rate,
            global_discount_percent: draft.global_discount_percent,
            totals,
            notes: draft.notes,
            details,
        }
    }

    pub fn kind(&self) -> DocumentKind {
        match self.details {
            DocumentDetails::Quote(_) => DocumentKind::Quote,
            DocumentDetails::Invoice(_) => DocumentKind::Invoice,
        }
    }

    pub fn status(&self) -> DocumentStatus {
        match &self.details {
            DocumentDetails::Quote(quote) => DocumentStatus::Quote(quote.status),
            DocumentDetails::Invoice(invoice) => DocumentStatus::Invoice(invoice.status),
        }
    }

    pub fn is_draft(&self) -> bool {
        matches!(
            self.status(),
            DocumentStatus::Quote(QuoteStatus::Draft) | DocumentStatus::Invoice(InvoiceStatus::Draft)
        )
    }

    pub fn quote_details(&self) -> Option<&QuoteDetails> {
        match &self.details {
            DocumentDetails::Quote(quote) => Some(quote),
            DocumentDetails::Invoice(_) => None,
        }
    }

    pub fn quote_details_mut(&mut self) -> Option<&mut QuoteDetails> {
        match &mut self.details {
            DocumentDetails::Quote(quote) => Some(quote),
            DocumentDetails::Invoice(_) => None,
        }
    }

    pub fn invoice_details(&self) -> Option<&InvoiceDetails> {
        match &self.details {
            DocumentDetails::Invoice(invoice) => Some(invoice),
            DocumentDetails::Quote(_) => None,
        }
    }

    pub fn invoice_details_mut(&mut self) -> Option<&mut InvoiceDetails> {
        match &mut self.details {
            DocumentDetails::Invoice(invoice) => Some(invoice),
            DocumentDetails::Quote(_) => None,
        }
    }

    /// Quote linkage, for invoices derived from a quote.
    pub fn link(&self) -> Option<&InvoiceLink> {
        self.invoice_details().and_then(|invoice| invoice.link.as_ref())
    }

    /// Whether this is an invoice derived from the quote with id `quote_id`.
    pub fn is_derived_from(
        &self,
        quote_id: &str,
    ) -> bool {
        self.link()
            .is_some_and(|link| link.source_quote_id == quote_id)
    }

    pub fn use_retention(&self) -> bool {
        self.quote_details()
            .is_some_and(|quote| quote.use_retention)
    }

    pub fn year(&self) -> i32 {
        self.issue_date.year()
    }

    /// Last day a quote can be accepted. `None` for invoices.
    pub fn valid_until(&self) -> Option<NaiveDate> {
        let quote = self.quote_details()?;
        self.issue_date
            .checked_add_days(Days::new(u64::from(quote.validity_days)))
    }

    /// A quote still waiting for an answer whose validity period is over.
    pub fn is_expired(
        &self,
        today: NaiveDate,
    ) -> bool {
        match (self.quote_details(), self.valid_until()) {
            (Some(quote), Some(valid_until)) => {
                quote.status.is_awaiting_answer() && today > valid_until
            }
            _ => false,
        }
    }
}

/// Unsaved document as assembled by the editing collaborator.
///
/// `client_id` is optional here because "no client selected" is a
/// validation problem reported back to the user, not a construction error.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentDraft {
    pub kind: DocumentKind,
    pub client_id: Option<String>,
    pub site_id: Option<String>,
    pub issue_date: NaiveDate,
    pub lines: Vec<LineItem>,
    pub default_tax_rate: Decimal,
    pub global_discount_percent: Decimal,
    pub validity_days: u32,
    pub use_retention: bool,
    #[serde(default)]
    pub notes: Option<String>,
}

impl DocumentDraft {
    /// Empty quote using the company defaults.
    pub fn quote(
        settings: &CompanySettings,
        issue_date: NaiveDate,
    ) -> Self {
        Self::with_defaults(DocumentKind::Quote, settings, issue_date)
    }

    /// Empty stand-alone invoice using the company defaults.
    pub fn invoice(
        settings: &CompanySettings,
        issue_date: NaiveDate,
    ) -> Self {
        Self::with_defaults(DocumentKind::Invoice, settings, issue_date)
    }

    fn with_defaults(
        kind: DocumentKind,
        settings: &CompanySettings,
        issue_date: NaiveDate,
    ) -> Self {
        Self {
            kind,
            client_id: None,
            site_id: None,
            issue_date,
            lines: Vec::new(),
            default_tax_rate: settings.default_tax_rate,
            global_discount_percent: Decimal::ZERO,
            validity_days: settings.default_validity_days,
            use_retention: false,
            notes: None,
        }
    }

    pub fn with_client(
        mut self,
        client_id: impl Into<String>,
    ) -> Self {
        self.client_id = Some(client_id.into());
        self
    }

    pub fn with_site(
        mut self,
        site_id: impl Into<String>,
    ) -> Self {
        self.site_id = Some(site_id.into());
        self
    }

    pub fn with_line(
        mut self,
        line: LineItem,
    ) -> Self {
        self.lines.push(line);
        self
    }

    pub fn with_default_tax_rate(
        mut self,
        rate: Decimal,
    ) -> Self {
        self.default_tax_rate = rate;
        self
    }

    pub fn with_discount(
        mut self,
        percent: Decimal,
    ) -> Self {
        self.global_discount_percent = percent;
        self
    }

    pub fn with_notes(
        mut self,
        notes: impl Into<String>,
    ) -> Self {
        self.notes = Some(notes.into());
        self
    }

    pub fn with_retention(
        mut self,
        use_retention: bool,
    ) -> Self {
        self.use_retention = use_retention;
        self
    }
}
