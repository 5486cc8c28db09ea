//! Glue between the command line and the document service: backend
//! registry, draft assembly and the text reports printed by each command.

use std::fmt;
use std::path::PathBuf;

use anyhow::{Context, bail};
use chrono::NaiveDate;
use quote_core::calculations::{TotalsInput, compute_totals};
use quote_core::db::{DocumentRepository, MemoryRepositoryFactory, RepositoryRegistry};
use quote_core::listing::{DocumentFilter, SortOrder, filter_documents, sort_documents};
use quote_core::{
    CompanySettings, Document, DocumentDraft, DocumentKind, DocumentTotals, LineItem,
    group_sections,
};
use quote_db_sqlite::SqliteRepositoryFactory;
use rust_decimal::Decimal;
use tracing::debug;

use crate::line_import;

/// Registry with every backend this binary can open.
pub fn build_registry() -> RepositoryRegistry {
    RepositoryRegistry::new()
        .with(SqliteRepositoryFactory)
        .with(MemoryRepositoryFactory)
}

/// What the user typed to describe a new document.
#[derive(Debug, Clone, Default)]
pub struct DraftOptions {
    pub client: Option<String>,
    pub site: Option<String>,
    pub lines_file: Option<PathBuf>,
    pub line_specs: Vec<String>,
    pub discount: Option<Decimal>,
    pub tax_rate: Option<Decimal>,
    pub retention: bool,
    pub validity_days: Option<u32>,
    pub notes: Option<String>,
}

/// Assembles a draft from the command line options. Lines from the CSV
/// file come first, then the inline ones in the order given.
///
/// The draft is not validated here; that happens when it is stored.
pub fn build_draft(
    kind: DocumentKind,
    settings: &CompanySettings,
    issue_date: NaiveDate,
    options: DraftOptions,
) -> anyhow::Result<DocumentDraft> {
    let mut draft = match kind {
        DocumentKind::Quote => DocumentDraft::quote(settings, issue_date),
        DocumentKind::Invoice => DocumentDraft::invoice(settings, issue_date),
    };

    draft.client_id = options.client;
    draft.site_id = options.site;
    draft.use_retention = options.retention;
    draft.notes = options.notes.filter(|n| !n.trim().is_empty());
    if let Some(rate) = options.tax_rate {
        draft.default_tax_rate = rate;
    }
    if let Some(percent) = options.discount {
        draft.global_discount_percent = percent;
    }
    if let Some(days) = options.validity_days {
        draft.validity_days = days;
    }

    if let Some(path) = &options.lines_file {
        let lines = line_import::load_from_file(path)
            .with_context(|| format!("failed to import lines from {}", path.display()))?;
        debug!(count = lines.len(), "lines imported");
        draft.lines.extend(lines);
    }
    for spec in &options.line_specs {
        let line = line_import::parse_line_spec(spec)
            .with_context(|| format!("invalid line '{spec}'"))?;
        draft.lines.push(line);
    }

    Ok(draft)
}

/// Totals a set of lines without storing anything.
pub fn preview_totals(
    draft: &DocumentDraft,
    settings: &CompanySettings,
) -> anyhow::Result<DocumentTotals> {
    if draft.lines.is_empty() {
        bail!("nothing to total: give --lines or --line");
    }
    Ok(compute_totals(&TotalsInput::from_draft(draft), settings)?)
}

/// Looks a document up by its human-facing number.
pub async fn find_document(
    repo: &dyn DocumentRepository,
    number: &str,
) -> anyhow::Result<Document> {
    repo.find_by_number(number)
        .await?
        .with_context(|| format!("no document numbered {number}"))
}

pub async fn list_documents(
    repo: &dyn DocumentRepository,
    filter: DocumentFilter,
    order: SortOrder,
    search: &str,
) -> anyhow::Result<Vec<Document>> {
    let mut documents = repo.list_documents(None).await?;
    sort_documents(&mut documents, order);
    Ok(filter_documents(&documents, filter, search)
        .into_iter()
        .cloned()
        .collect())
}

// ─── reports ────────────────────────────────────────────────────────────────

/// One line per document, for listings.
pub struct DocumentRow<'a>(pub &'a Document);

impl fmt::Display for DocumentRow<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let doc = self.0;
        write!(
            f,
            "{:<16} {:<8} {:<17} {:<12} {:>12.2} TTC  {}",
            doc.number,
            doc.kind().as_str(),
            doc.status().as_str(),
            doc.client_id,
            doc.totals.total_ttc,
            doc.issue_date
        )
    }
}

/// Totals block shared by `show`, `totals` and the create commands.
pub struct TotalsReport<'a>(pub &'a DocumentTotals);

fn amount_row(
    f: &mut fmt::Formatter<'_>,
    label: &str,
    amount: Decimal,
) -> fmt::Result {
    writeln!(f, "  {label:<30}{amount:>14.2}")
}

impl fmt::Display for TotalsReport<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let t = self.0;

        amount_row(f, "Total HT", t.total_ht)?;
        if !t.discount_amount.is_zero() {
            amount_row(f, "Discount", -t.discount_amount)?;
            amount_row(f, "Total HT after discount", t.total_ht_after_discount)?;
        }
        for bucket in &t.tax_buckets {
            let label = format!("VAT {}% on {:.2}", bucket.rate.normalize(), bucket.base);
            amount_row(f, &label, bucket.tax_amount)?;
        }
        amount_row(f, "Total VAT", t.total_tax)?;
        amount_row(f, "Total TTC", t.total_ttc)?;
        if !t.retention_amount.is_zero() {
            amount_row(f, "Retention of guarantee", -t.retention_amount)?;
            amount_row(f, "Net payable", t.net_payable)?;
        }
        if !t.total_cost.is_zero() {
            amount_row(f, "Cost", t.total_cost)?;
            let label = format!("Gross margin ({}%)", t.margin_percent.normalize());
            amount_row(f, &label, t.gross_margin)?;
        }
        Ok(())
    }
}

/// Full view of one document.
pub struct DocumentReport<'a> {
    pub document: &'a Document,
    /// Quote TTC not yet invoiced, shown for quotes.
    pub remaining: Option<Decimal>,
    pub today: NaiveDate,
}

impl fmt::Display for DocumentReport<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let doc = self.document;

        writeln!(f, "{}  {}  {}", doc.number, doc.kind(), doc.status())?;
        write!(f, "client: {}", doc.client_id)?;
        if let Some(site) = &doc.site_id {
            write!(f, "  site: {site}")?;
        }
        writeln!(f)?;
        write!(f, "issued: {}", doc.issue_date)?;
        if let Some(valid_until) = doc.valid_until() {
            write!(f, "  valid until: {valid_until}")?;
            if doc.is_expired(self.today) {
                write!(f, " (expired)")?;
            }
        }
        writeln!(f)?;

        if let Some(quote) = doc.quote_details() {
            if let Some(signature) = &quote.signature {
                writeln!(
                    f,
                    "signed by {} on {}",
                    signature.signed_by,
                    signature.signed_at.date_naive()
                )?;
            }
            if let Some(percent) = quote.deposit_percent {
                writeln!(f, "deposit: {}%", percent.normalize())?;
            }
        }
        if let Some(link) = doc.link() {
            writeln!(f, "{} invoice for quote {}", link.kind.as_str(), link.source_quote_id)?;
        }

        writeln!(f)?;
        let sections = group_sections(&doc.lines);
        let titled = sections.iter().any(|s| s.title.is_some());
        for section in &sections {
            if let Some(title) = section.title {
                writeln!(f, "{title}")?;
            }
            for line in section.lines {
                writeln!(f, "{}", LineRow { line, default_rate: doc.default_tax_rate })?;
            }
            if titled {
                writeln!(f, "  {:>68} {:>12.2}", "subtotal", section.subtotal_ht())?;
            }
        }
        writeln!(f)?;
        write!(f, "{}", TotalsReport(&doc.totals))?;

        if let Some(remaining) = self.remaining {
            amount_row(f, "Remaining to invoice", remaining)?;
        }
        if let Some(notes) = &doc.notes {
            writeln!(f)?;
            writeln!(f, "{notes}")?;
        }
        Ok(())
    }
}

struct LineRow<'a> {
    line: &'a LineItem,
    default_rate: Decimal,
}

impl fmt::Display for LineRow<'_> {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let line = self.line;
        write!(
            f,
            "  {:<32} {:>8} {:<8} {:>10.2} {:>5}% {:>12.2}",
            line.description,
            line.quantity.normalize(),
            line.unit,
            line.unit_price_ht,
            line.effective_tax_rate(self.default_rate).normalize(),
            line.amount_ht()
        )
    }
}
