use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Quote,
    Invoice,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote => "quote",
            Self::Invoice => "invoice",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "quote" => Some(Self::Quote),
            "invoice" => Some(Self::Invoice),
            _ => None,
        }
    }

    /// Prefix used in document numbers.
    pub fn number_prefix(&self) -> &'static str {
        match self {
            Self::Quote => "DEV",
            Self::Invoice => "FAC",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuoteStatus {
    Draft,
    Sent,
    Viewed,
    Accepted,
    Declined,
    DepositInvoiced,
    Invoiced,
}

impl QuoteStatus {
    pub const ALL: [QuoteStatus; 7] = [
        Self::Draft,
        Self::Sent,
        Self::Viewed,
        Self::Accepted,
        Self::Declined,
        Self::DepositInvoiced,
        Self::Invoiced,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
            Self::DepositInvoiced => "deposit_invoiced",
            Self::Invoiced => "invoiced",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    /// Still waiting for the client's answer.
    pub fn is_awaiting_answer(&self) -> bool {
        matches!(self, Self::Draft | Self::Sent | Self::Viewed)
    }

    /// Statuses reachable through the normal workflow. Manual overrides may
    /// set any status regardless of this table.
    ///
    /// A client may answer a quote that was handed over without being sent
    /// through the app, so `draft` can go straight to `accepted` or
    /// `declined`. Declining stays possible until invoicing starts.
    pub fn natural_successors(&self) -> &'static [QuoteStatus] {
        match self {
            Self::Draft => &[Self::Sent, Self::Accepted, Self::Declined],
            Self::Sent => &[Self::Viewed, Self::Accepted, Self::Declined],
            Self::Viewed => &[Self::Accepted, Self::Declined],
            Self::Accepted => &[Self::Declined, Self::DepositInvoiced, Self::Invoiced],
            Self::DepositInvoiced => &[Self::Invoiced],
            Self::Declined | Self::Invoiced => &[],
        }
    }

    pub fn can_become(
        &self,
        next: QuoteStatus,
    ) -> bool {
        self.natural_successors().contains(&next)
    }
}

impl fmt::Display for QuoteStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Viewed,
    Paid,
}

impl InvoiceStatus {
    pub const ALL: [InvoiceStatus; 4] = [Self::Draft, Self::Sent, Self::Viewed, Self::Paid];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Sent => "sent",
            Self::Viewed => "viewed",
            Self::Paid => "paid",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|status| status.as_str() == s)
    }

    pub fn natural_successors(&self) -> &'static [InvoiceStatus] {
        match self {
            Self::Draft => &[Self::Sent],
            Self::Sent => &[Self::Viewed, Self::Paid],
            Self::Viewed => &[Self::Paid],
            Self::Paid => &[],
        }
    }

    pub fn can_become(
        &self,
        next: InvoiceStatus,
    ) -> bool {
        self.natural_successors().contains(&next)
    }
}

impl fmt::Display for InvoiceStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of either document kind. The variant always matches the kind of
/// the document carrying it, so cross-kind states cannot be expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "status", rename_all = "snake_case")]
pub enum DocumentStatus {
    Quote(QuoteStatus),
    Invoice(InvoiceStatus),
}

impl DocumentStatus {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Self::Quote(_) => DocumentKind::Quote,
            Self::Invoice(_) => DocumentKind::Invoice,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Quote(status) => status.as_str(),
            Self::Invoice(status) => status.as_str(),
        }
    }

    /// Parses a status name for a document of the given kind.
    pub fn parse(
        kind: DocumentKind,
        s: &str,
    ) -> Option<Self> {
        match kind {
            DocumentKind::Quote => QuoteStatus::parse(s).map(Self::Quote),
            DocumentKind::Invoice => InvoiceStatus::parse(s).map(Self::Invoice),
        }
    }

    /// Position used when listing documents by status.
    pub fn display_order(&self) -> u8 {
        match self {
            Self::Quote(QuoteStatus::Draft) | Self::Invoice(InvoiceStatus::Draft) => 0,
            Self::Quote(QuoteStatus::Sent | QuoteStatus::Viewed)
            | Self::Invoice(InvoiceStatus::Sent | InvoiceStatus::Viewed) => 1,
            Self::Quote(QuoteStatus::Accepted) => 2,
            Self::Quote(QuoteStatus::DepositInvoiced) => 3,
            Self::Quote(QuoteStatus::Invoiced) => 4,
            Self::Invoice(InvoiceStatus::Paid) => 5,
            Self::Quote(QuoteStatus::Declined) => 6,
        }
    }
}

impl fmt::Display for DocumentStatus {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
