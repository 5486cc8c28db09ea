//! CSV import of quote and invoice lines.
//!
//! ## CSV Format
//!
//! Headers are matched by name, so column order does not matter.
//!
//! | Column          | Required | Type    | Notes                                        |
//! |-----------------|----------|---------|----------------------------------------------|
//! | `description`   | yes      | string  | Must not be blank                            |
//! | `quantity`      | yes      | decimal | e.g. `33.5`                                  |
//! | `unit`          | yes      | string  | `m²`, `h`, `forfait`...                      |
//! | `unit_price_ht` | yes      | decimal | Price before tax                             |
//! | `unit_cost_ht`  | no       | decimal | Purchase cost, used for the margin           |
//! | `tax_rate`      | no       | decimal | Leave empty to use the document default rate |
//! | `section`       | no       | string  | Title the line is grouped under              |
//!
//! ```csv
//! description,quantity,unit,unit_price_ht,unit_cost_ht,tax_rate,section
//! Peinture murs,95,m²,65.00,22.50,10,Séjour
//! Dépose,1,forfait,450.00,,,
//! ```
//!
//! Single lines given on the command line use the same columns in the same
//! order, without a header: `"Peinture murs,95,m²,65.00,22.50,10"`.
//! Trailing optional columns may be left out.
//!
//! Quantities and prices are not range-checked here; draft validation
//! reports every problem at once when the document is created.

use std::path::{Path, PathBuf};

use quote_core::LineItem;
use rust_decimal::Decimal;
use serde::Deserialize;

// ---------------------------------------------------------------------------
// Serde-compatible row that mirrors the CSV layout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    description: String,
    quantity: Decimal,
    unit: String,
    unit_price_ht: Decimal,
    #[serde(default)]
    unit_cost_ht: Option<Decimal>,
    #[serde(default)]
    tax_rate: Option<Decimal>,
    #[serde(default)]
    section: Option<String>,
}

// ---------------------------------------------------------------------------
// Public error type
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum LineImportError {
    /// Bad structure, missing required column or a cell of the wrong type.
    #[error("CSV parse error: {0}")]
    Parse(#[from] csv::Error),

    /// `row` is 1-based, the header not counted.
    #[error("line {row} has no description")]
    MissingDescription { row: usize },

    #[error("the line file contains no lines")]
    Empty,

    #[error("cannot read '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Core loader
// ---------------------------------------------------------------------------

fn convert_row(
    row: CsvRow,
    row_number: usize,
) -> Result<LineItem, LineImportError> {
    if row.description.is_empty() {
        return Err(LineImportError::MissingDescription { row: row_number });
    }

    let mut line = LineItem::new(row.description, row.quantity, row.unit, row.unit_price_ht);
    if let Some(cost) = row.unit_cost_ht {
        line = line.with_cost(cost);
    }
    if let Some(rate) = row.tax_rate {
        line = line.with_tax_rate(rate);
    }
    if let Some(title) = row.section.filter(|t| !t.is_empty()) {
        line = line.with_section(title);
    }
    Ok(line)
}

fn read_rows<R: std::io::Read>(
    mut reader: csv::Reader<R>
) -> Result<Vec<LineItem>, LineImportError> {
    reader
        .deserialize::<CsvRow>()
        .enumerate()
        .map(|(idx, result)| convert_row(result?, idx + 1))
        .collect()
}

/// Parses CSV text with a header row. Lines keep their file order.
///
/// # Errors
///
/// * [`LineImportError::Parse`] when the CSV is malformed or a required
///   cell cannot be deserialised.
/// * [`LineImportError::MissingDescription`] for a blank description.
/// * [`LineImportError::Empty`] when there are no data rows.
pub fn load_from_str(input: &str) -> Result<Vec<LineItem>, LineImportError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(false)
        .from_reader(input.as_bytes());

    let lines = read_rows(reader)?;
    if lines.is_empty() {
        return Err(LineImportError::Empty);
    }
    Ok(lines)
}

/// Reads `path` from disk and delegates to [`load_from_str`].
pub fn load_from_file(path: &Path) -> Result<Vec<LineItem>, LineImportError> {
    let contents = std::fs::read_to_string(path).map_err(|source| LineImportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    load_from_str(&contents)
}

/// Parses one header-less line, e.g. `"Pose,2,u,80"`.
pub fn parse_line_spec(spec: &str) -> Result<LineItem, LineImportError> {
    let reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(spec.as_bytes());

    read_rows(reader)?
        .into_iter()
        .next()
        .ok_or(LineImportError::Empty)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
