mod company_settings;
mod document;
mod line_item;
mod status;
mod totals;

pub use company_settings::CompanySettings;
pub use document::{
    Document, DocumentDetails, DocumentDraft, InvoiceDetails, InvoiceKind, InvoiceLink,
    QuoteDetails, Signature,
};
pub use line_item::{LineItem, LineSection, group_sections};
pub use status::{DocumentKind, DocumentStatus, InvoiceStatus, QuoteStatus};
pub use totals::{DocumentTotals, TaxBucket};
