//! Status transitions triggered by user events.
//!
//! Every operation takes the current document and returns the updated copy;
//! persisting it is the caller's job. Transitions that depend on other
//! documents (deposit and balance invoicing) live in [`crate::derivation`].

use std::fmt;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::{Document, DocumentDetails, DocumentKind, DocumentStatus, InvoiceStatus, QuoteStatus, Signature};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{number} is a {found}, expected a {expected}")]
    WrongDocumentKind {
        number: String,
        expected: DocumentKind,
        found: DocumentKind,
    },

    #[error("{number} cannot go from {from} to {to}")]
    InvalidTransition {
        number: String,
        from: DocumentStatus,
        to: DocumentStatus,
    },
}

/// How a document was delivered to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendChannel {
    Email,
    Sms,
    Link,
}

impl SendChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Sms => "sms",
            Self::Link => "link",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "email" => Some(Self::Email),
            "sms" => Some(Self::Sms),
            "link" => Some(Self::Link),
            _ => None,
        }
    }
}

impl fmt::Display for SendChannel {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn apply_status(
    document: &Document,
    status: DocumentStatus,
) -> Document {
    let mut updated = document.clone();
    match (&mut updated.details, status) {
        (DocumentDetails::Quote(quote), DocumentStatus::Quote(next)) => quote.status = next,
        (DocumentDetails::Invoice(invoice), DocumentStatus::Invoice(next)) => invoice.status = next,
        // Callers check the kind first.
        _ => {}
    }
    updated
}

fn require_quote(document: &Document) -> Result<QuoteStatus, LifecycleError> {
    match document.status() {
        DocumentStatus::Quote(status) => Ok(status),
        DocumentStatus::Invoice(_) => Err(LifecycleError::WrongDocumentKind {
            number: document.number.clone(),
            expected: DocumentKind::Quote,
            found: DocumentKind::Invoice,
        }),
    }
}

/// Delivers a draft to the client. Documents already sent keep their status.
pub fn mark_sent(
    document: &Document,
    channel: SendChannel,
) -> Document {
    info!(number = %document.number, %channel, "document sent");

    match document.status() {
        DocumentStatus::Quote(status) if status.can_become(QuoteStatus::Sent) => {
            apply_status(document, DocumentStatus::Quote(QuoteStatus::Sent))
        }
        DocumentStatus::Invoice(status) if status.can_become(InvoiceStatus::Sent) => {
            apply_status(document, DocumentStatus::Invoice(InvoiceStatus::Sent))
        }
        _ => document.clone(),
    }
}

/// The client opened the document. Only moves `sent` forward; any other
/// status is left as is.
pub fn mark_viewed(document: &Document) -> Document {
    match document.status() {
        DocumentStatus::Quote(status) if status.can_become(QuoteStatus::Viewed) => {
            info!(number = %document.number, "document viewed");
            apply_status(document, DocumentStatus::Quote(QuoteStatus::Viewed))
        }
        DocumentStatus::Invoice(status) if status.can_become(InvoiceStatus::Viewed) => {
            info!(number = %document.number, "document viewed");
            apply_status(document, DocumentStatus::Invoice(InvoiceStatus::Viewed))
        }
        _ => document.clone(),
    }
}

/// Client accepts a quote, optionally signing it.
///
/// Allowed while the quote is still awaiting an answer.
pub fn accept(
    document: &Document,
    signature: Option<Signature>,
) -> Result<Document, LifecycleError> {
    let current = require_quote(document)?;
    if !current.can_become(QuoteStatus::Accepted) {
        return Err(rejected(document, QuoteStatus::Accepted));
    }

    let mut updated = apply_status(document, DocumentStatus::Quote(QuoteStatus::Accepted));
    if let Some(quote) = updated.quote_details_mut() {
        quote.signature = signature;
    }

    info!(
        number = %document.number,
        signed_by = updated
            .quote_details()
            .and_then(|q| q.signature.as_ref())
            .map(|s| s.signed_by.as_str()),
        "quote accepted"
    );
    Ok(updated)
}

/// Client declines a quote. Possible until invoicing has started.
pub fn decline(document: &Document) -> Result<Document, LifecycleError> {
    let current = require_quote(document)?;
    if !current.can_become(QuoteStatus::Declined) {
        return Err(rejected(document, QuoteStatus::Declined));
    }

    info!(number = %document.number, "quote declined");
    Ok(apply_status(document, DocumentStatus::Quote(QuoteStatus::Declined)))
}

/// Manual override: sets any status of the document's own kind, skipping
/// every workflow guard.
pub fn set_status(
    document: &Document,
    status: DocumentStatus,
) -> Result<Document, LifecycleError> {
    if status.kind() != document.kind() {
        return Err(LifecycleError::WrongDocumentKind {
            number: document.number.clone(),
            expected: status.kind(),
            found: document.kind(),
        });
    }

    info!(
        number = %document.number,
        from = %document.status(),
        to = %status,
        "status set manually"
    );
    Ok(apply_status(document, status))
}

/// Moves a quote to a status reached through invoice derivation.
pub(crate) fn advance_quote(
    quote: &Document,
    status: QuoteStatus,
) -> Document {
    apply_status(quote, DocumentStatus::Quote(status))
}

/// Signature stamped with the current time.
pub fn signature_now(signed_by: impl Into<String>) -> Signature {
    Signature {
        signed_by: signed_by.into(),
        signed_at: Utc::now(),
    }
}

fn rejected(
    document: &Document,
    to: QuoteStatus,
) -> LifecycleError {
    let error = LifecycleError::InvalidTransition {
        number: document.number.clone(),
        from: document.status(),
        to: DocumentStatus::Quote(to),
    };
    warn!(error = %error, "transition rejected");
    error
}
