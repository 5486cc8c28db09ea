//! Sorting and filtering for document lists.

use std::cmp::Ordering;

use crate::{Document, DocumentKind, DocumentStatus, InvoiceStatus, QuoteStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    /// Newest issue date first.
    #[default]
    Recent,
    /// Workflow position, then newest first.
    Status,
    /// Largest TTC total first.
    Amount,
}

impl SortOrder {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "recent" => Some(Self::Recent),
            "status" => Some(Self::Status),
            "amount" => Some(Self::Amount),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DocumentFilter {
    #[default]
    All,
    Quotes,
    Invoices,
    /// Sent or viewed, waiting on the client.
    Pending,
}

impl DocumentFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all" => Some(Self::All),
            "quotes" => Some(Self::Quotes),
            "invoices" => Some(Self::Invoices),
            "pending" => Some(Self::Pending),
            _ => None,
        }
    }

    fn matches(
        &self,
        document: &Document,
    ) -> bool {
        match self {
            Self::All => true,
            Self::Quotes => document.kind() == DocumentKind::Quote,
            Self::Invoices => document.kind() == DocumentKind::Invoice,
            Self::Pending => matches!(
                document.status(),
                DocumentStatus::Quote(QuoteStatus::Sent | QuoteStatus::Viewed)
                    | DocumentStatus::Invoice(InvoiceStatus::Sent | InvoiceStatus::Viewed)
            ),
        }
    }
}

fn most_recent_first(
    a: &Document,
    b: &Document,
) -> Ordering {
    b.issue_date
        .cmp(&a.issue_date)
        .then_with(|| b.number.cmp(&a.number))
}

/// Sorts in place. Ties always fall back to newest first.
pub fn sort_documents(
    documents: &mut [Document],
    order: SortOrder,
) {
    match order {
        SortOrder::Recent => documents.sort_by(most_recent_first),
        SortOrder::Status => documents.sort_by(|a, b| {
            a.status()
                .display_order()
                .cmp(&b.status().display_order())
                .then_with(|| most_recent_first(a, b))
        }),
        SortOrder::Amount => documents.sort_by(|a, b| {
            b.totals
                .total_ttc
                .cmp(&a.totals.total_ttc)
                .then_with(|| most_recent_first(a, b))
        }),
    }
}

/// Keeps documents passing `filter` whose number contains `search`,
/// ignoring case. An empty search matches everything.
pub fn filter_documents<'a>(
    documents: &'a [Document],
    filter: DocumentFilter,
    search: &str,
) -> Vec<&'a Document> {
    let needle = search.trim().to_lowercase();
    documents
        .iter()
        .filter(|doc| filter.matches(doc))
        .filter(|doc| needle.is_empty() || doc.number.to_lowercase().contains(&needle))
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::lifecycle::set_status;
    use crate::{CompanySettings, DocumentDraft, DocumentTotals};

    fn doc(
        number: &str,
        day: u32,
        status: DocumentStatus,
        ttc: Decimal,
    ) -> Document {
        let settings = CompanySettings::default();
        let date = NaiveDate::from_ymd_opt(2026, 3, day).unwrap();
        let draft = match status.kind() {
            DocumentKind::Quote => DocumentDraft::quote(&settings, date),
            DocumentKind::Invoice => DocumentDraft::invoice(&settings, date),
        };
        let totals = DocumentTotals {
            total_ttc: ttc,
            ..DocumentTotals::default()
        };
        let document = Document::from_draft(draft.with_client("c1"), number.to_string(), number.to_string(), totals);
        set_status(&document, status).unwrap()
    }

    fn sample() -> Vec<Document> {
        vec![
            doc("DEV-2026-00001", 1, DocumentStatus::Quote(QuoteStatus::Declined), dec!(500)),
            doc("DEV-2026-00002", 5, DocumentStatus::Quote(QuoteStatus::Sent), dec!(1200)),
            doc("FAC-2026-00001", 3, DocumentStatus::Invoice(InvoiceStatus::Paid), dec!(300)),
            doc("DEV-2026-00003", 7, DocumentStatus::Quote(QuoteStatus::Draft), dec!(800)),
            doc("FAC-2026-00002", 6, DocumentStatus::Invoice(InvoiceStatus::Viewed), dec!(950)),
        ]
    }

    fn numbers(documents: &[Document]) -> Vec<&str> {
        documents.iter().map(|d| d.number.as_str()).collect()
    }

    #[test]
    fn recent_sorts_by_issue_date_descending() {
        let mut documents = sample();

        sort_documents(&mut documents, SortOrder::Recent);

        assert_eq!(
            numbers(&documents),
            vec![
                "DEV-2026-00003",
                "FAC-2026-00002",
                "DEV-2026-00002",
                "FAC-2026-00001",
                "DEV-2026-00001"
            ]
        );
    }

    #[test]
    fn status_sorts_by_workflow_position() {
        let mut documents = sample();

        sort_documents(&mut documents, SortOrder::Status);

        assert_eq!(
            numbers(&documents),
            vec![
                "DEV-2026-00003",
                "FAC-2026-00002",
                "DEV-2026-00002",
                "FAC-2026-00001",
                "DEV-2026-00001"
            ]
        );
    }

    #[test]
    fn amount_sorts_largest_first() {
        let mut documents = sample();

        sort_documents(&mut documents, SortOrder::Amount);

        assert_eq!(documents[0].number, "DEV-2026-00002");
        assert_eq!(documents[4].number, "FAC-2026-00001");
    }

    #[test]
    fn pending_keeps_sent_and_viewed() {
        let documents = sample();

        let pending = filter_documents(&documents, DocumentFilter::Pending, "");

        let found: Vec<&str> = pending.iter().map(|d| d.number.as_str()).collect();
        assert_eq!(found, vec!["DEV-2026-00002", "FAC-2026-00002"]);
    }

    #[test]
    fn search_is_case_insensitive() {
        let documents = sample();

        let found = filter_documents(&documents, DocumentFilter::All, "fac-2026");

        assert_eq!(found.len(), 2);
    }

    #[test]
    fn kind_filter_combines_with_search() {
        let documents = sample();

        let found = filter_documents(&documents, DocumentFilter::Quotes, "00002");

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].number, "DEV-2026-00002");
    }
}
