//! Sequential document numbers: `DEV-2026-00042`, `FAC-2026-00007`.
//!
//! Numbers restart at 1 every calendar year and are counted separately for
//! quotes and invoices. Generation is a pure read of existing documents and
//! reserves nothing, so two concurrent callers can produce the same number.
//! Callers must persist the number atomically and regenerate when the store
//! rejects a duplicate (see [`crate::service::DocumentService`]).

use std::collections::HashMap;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::{Document, DocumentKind};

static NUMBER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(DEV|FAC)-(\d{4})-(\d+)$").expect("document number pattern is valid")
});

/// Width of the zero-padded sequence part.
const SEQUENCE_WIDTH: usize = 5;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NumberingError {
    #[error("no {kind} number left for {year}")]
    SequenceExhausted { kind: DocumentKind, year: i32 },
}

/// Splits a number into kind, year and sequence. Returns `None` for anything
/// not in the `{PREFIX}-{YEAR}-{DIGITS}` shape, including sequences too long
/// for a `u64`.
///
/// ```
/// use quote_core::DocumentKind;
/// use quote_core::numbering::parse_number;
///
/// assert_eq!(parse_number("FAC-2026-00012"), Some((DocumentKind::Invoice, 2026, 12)));
/// assert_eq!(parse_number("FAC-2026-draft"), None);
/// ```
pub fn parse_number(number: &str) -> Option<(DocumentKind, i32, u64)> {
    let caps = NUMBER_PATTERN.captures(number)?;
    let kind = match &caps[1] {
        "DEV" => DocumentKind::Quote,
        _ => DocumentKind::Invoice,
    };
    let year = caps[2].parse().ok()?;
    let sequence = caps[3].parse().ok()?;
    Some((kind, year, sequence))
}

pub fn format_number(
    kind: DocumentKind,
    year: i32,
    sequence: u64,
) -> String {
    format!(
        "{}-{year}-{sequence:0width$}",
        kind.number_prefix(),
        width = SEQUENCE_WIDTH
    )
}

/// Highest sequence already used for `kind` in `year`, or 0.
fn max_sequence(
    existing: &[Document],
    kind: DocumentKind,
    year: i32,
) -> u64 {
    existing
        .iter()
        .filter_map(|doc| parse_number(&doc.number))
        .filter(|(k, y, _)| *k == kind && *y == year)
        .map(|(_, _, sequence)| sequence)
        .max()
        .unwrap_or(0)
}

fn successor(
    sequence: u64,
    kind: DocumentKind,
    year: i32,
) -> Result<u64, NumberingError> {
    sequence
        .checked_add(1)
        .ok_or(NumberingError::SequenceExhausted { kind, year })
}

/// Next free number for `kind` in `year`, given every existing document.
///
/// Numbers that do not match the expected shape are ignored.
///
/// # Errors
/// [`NumberingError::SequenceExhausted`] once `u64::MAX` has been used.
pub fn next_number(
    existing: &[Document],
    kind: DocumentKind,
    year: i32,
) -> Result<String, NumberingError> {
    let sequence = successor(max_sequence(existing, kind, year), kind, year)?;
    Ok(format_number(kind, year, sequence))
}

/// Source of new document numbers.
///
/// `existing` is a fresh snapshot of the store. Implementations must return
/// a number strictly greater than every matching number in it.
pub trait NumberAllocator: Send + Sync {
    fn allocate(
        &self,
        existing: &[Document],
        kind: DocumentKind,
        year: i32,
    ) -> Result<String, NumberingError>;
}

/// Allocates by scanning the snapshot; equivalent to [`next_number`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ScanAllocator;

impl NumberAllocator for ScanAllocator {
    fn allocate(
        &self,
        existing: &[Document],
        kind: DocumentKind,
        year: i32,
    ) -> Result<String, NumberingError> {
        next_number(existing, kind, year)
    }
}

/// Keeps the last handed-out sequence per kind and year in memory, so
/// callers sharing one allocator never receive the same number even when
/// their snapshots are stale.
#[derive(Debug, Default)]
pub struct CounterAllocator {
    last: Mutex<HashMap<(DocumentKind, i32), u64>>,
}

impl CounterAllocator {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NumberAllocator for CounterAllocator {
    fn allocate(
        &self,
        existing: &[Document],
        kind: DocumentKind,
        year: i32,
    ) -> Result<String, NumberingError> {
        let scanned = max_sequence(existing, kind, year);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());
        let entry = last.entry((kind, year)).or_insert(0);
        *entry = successor((*entry).max(scanned), kind, year)?;

        debug!(%kind, year, sequence = *entry, "number allocated");
        Ok(format_number(kind, year, *entry))
    }
}
