//! Finalised document totals.
//!
//! Combines the tax bucket breakdown, the retention holdback and the margin
//! into the [`DocumentTotals`] snapshot stored on a document. This is the
//! only place where monetary values are rounded.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use quote_core::{CompanySettings, LineItem};
//! use quote_core::calculations::{TotalsInput, compute_totals};
//!
//! let lines = vec![
//!     LineItem::new("Gros oeuvre", dec!(1), "forfait", dec!(1000)).with_tax_rate(dec!(20)),
//!     LineItem::new("Rénovation", dec!(1), "forfait", dec!(500)).with_tax_rate(dec!(10)),
//! ];
//! let input = TotalsInput {
//!     lines: &lines,
//!     default_tax_rate: dec!(20),
//!     global_discount_percent: dec!(10),
//!     use_retention: true,
//! };
//!
//! let totals = compute_totals(&input, &CompanySettings::default()).unwrap();
//!
//! assert_eq!(totals.total_ttc, dec!(1575.00));
//! assert_eq!(totals.retention_amount, dec!(78.75));
//! assert_eq!(totals.net_payable, dec!(1496.25));
//! ```

use rust_decimal::Decimal;
use thiserror::Error;
use tracing::warn;

use crate::calculations::common::{percent_of, round2};
use crate::calculations::margin::{MarginResult, calculate_margin};
use crate::calculations::tax_buckets::{TaxBreakdown, TaxBucketCalculator};
use crate::{CompanySettings, Document, DocumentDraft, DocumentTotals, LineItem};

/// Inputs that cannot produce meaningful totals.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TotalsError {
    #[error("global discount must be between 0 and 100, got {0}")]
    InvalidDiscount(Decimal),

    #[error("default tax rate cannot be negative, got {0}")]
    NegativeDefaultRate(Decimal),

    #[error("line {line} has a negative tax rate: {rate}")]
    NegativeLineRate { line: usize, rate: Decimal },

    #[error("amounts are too large to total")]
    Overflow,
}

/// `|amount| + |amount| * rate`, checked. Every figure derived from an
/// amount (tax, discount, retention) stays below this bound times 100.
fn amount_bound(
    amount: Decimal,
    rate: Decimal,
) -> Option<Decimal> {
    let amount = amount.abs();
    amount.checked_add(amount.checked_mul(rate)?)
}

fn check_headroom(bound: Decimal) -> Result<(), TotalsError> {
    bound
        .checked_mul(Decimal::ONE_HUNDRED)
        .map(|_| ())
        .ok_or(TotalsError::Overflow)
}

/// Borrowed view of the document fields that drive the totals.
#[derive(Debug, Clone, Copy)]
pub struct TotalsInput<'a> {
    pub lines: &'a [LineItem],
    pub default_tax_rate: Decimal,
    pub global_discount_percent: Decimal,
    pub use_retention: bool,
}

impl<'a> TotalsInput<'a> {
    pub fn from_draft(draft: &'a DocumentDraft) -> Self {
        Self {
            lines: &draft.lines,
            default_tax_rate: draft.default_tax_rate,
            global_discount_percent: draft.global_discount_percent,
            use_retention: draft.use_retention,
        }
    }

    pub fn from_document(document: &'a Document) -> Self {
        Self {
            lines: &document.lines,
            default_tax_rate: document.default_tax_rate,
            global_discount_percent: document.global_discount_percent,
            use_retention: document.use_retention(),
        }
    }

    fn validate(&self) -> Result<(), TotalsError> {
        if self.global_discount_percent < Decimal::ZERO
            || self.global_discount_percent > Decimal::ONE_HUNDRED
        {
            return Err(TotalsError::InvalidDiscount(self.global_discount_percent));
        }
        if self.default_tax_rate < Decimal::ZERO {
            return Err(TotalsError::NegativeDefaultRate(self.default_tax_rate));
        }
        let mut bound = Decimal::ZERO;
        for (index, line) in self.lines.iter().enumerate() {
            if let Some(rate) = line.tax_rate
                && rate < Decimal::ZERO
            {
                return Err(TotalsError::NegativeLineRate { line: index, rate });
            }
            let rate = line.effective_tax_rate(self.default_tax_rate);
            bound = line
                .checked_amount_ht()
                .and_then(|amount| amount_bound(amount, rate))
                .zip(line.checked_cost_ht())
                .and_then(|(line_bound, cost)| bound.checked_add(line_bound)?.checked_add(cost.abs()))
                .ok_or(TotalsError::Overflow)?;
        }
        check_headroom(bound)
    }
}

/// Computes the rounded totals snapshot for a document.
///
/// # Errors
/// Returns a [`TotalsError`] when the discount is outside `0..=100`, a
/// tax rate is negative or the amounts overflow a [`Decimal`]. Zero totals,
/// zero rates and a full discount are not errors.
pub fn compute_totals(
    input: &TotalsInput<'_>,
    settings: &CompanySettings,
) -> Result<DocumentTotals, TotalsError> {
    input.validate().inspect_err(|e| warn!(error = %e, "totals rejected"))?;

    let calculator = TaxBucketCalculator::new(
        input.default_tax_rate,
        input.global_discount_percent,
        settings.vat_exempt,
    );
    let breakdown = calculator.calculate(input.lines);
    let margin = calculate_margin(input.lines, breakdown.total_ht_after_discount)
        .ok_or(TotalsError::Overflow)?;

    Ok(finalise(&breakdown, margin, input.use_retention, settings))
}

/// Totals for an invoice whose whole taxable amount is `amount_ht` at a
/// single `rate`, regardless of how its lines are split.
///
/// Used for invoices derived from a quote: a deposit is a share of the
/// quote and a balance mixes the quote's lines with credit lines, yet both
/// are taxed at the quote's default rate. Their cost and margin figures are
/// left at zero; margin is tracked on the quote.
///
/// # Errors
/// [`TotalsError::Overflow`] when `amount_ht` is too large to tax.
pub fn flat_rate_totals(
    amount_ht: Decimal,
    rate: Decimal,
    settings: &CompanySettings,
) -> Result<DocumentTotals, TotalsError> {
    if rate < Decimal::ZERO {
        return Err(TotalsError::NegativeDefaultRate(rate));
    }
    check_headroom(amount_bound(amount_ht, rate).ok_or(TotalsError::Overflow)?)?;

    let taxable = [LineItem::new("", Decimal::ONE, "", amount_ht).with_tax_rate(rate)];
    let calculator = TaxBucketCalculator::new(rate, Decimal::ZERO, settings.vat_exempt);
    let breakdown = calculator.calculate(&taxable);

    Ok(finalise(&breakdown, MarginResult::default(), false, settings))
}

fn finalise(
    breakdown: &TaxBreakdown,
    margin: MarginResult,
    use_retention: bool,
    settings: &CompanySettings,
) -> DocumentTotals {
    let total_ttc = round2(breakdown.total_ttc);
    let retention_amount = if use_retention {
        round2(percent_of(breakdown.total_ttc, settings.retention_percent))
    } else {
        Decimal::ZERO
    };

    DocumentTotals {
        total_ht: round2(breakdown.total_ht),
        discount_amount: round2(breakdown.discount_amount),
        total_ht_after_discount: round2(breakdown.total_ht_after_discount),
        tax_buckets: breakdown.rounded_buckets(),
        total_tax: round2(breakdown.total_tax),
        total_ttc,
        retention_amount,
        net_payable: total_ttc - retention_amount,
        total_cost: round2(margin.total_cost),
        gross_margin: round2(margin.gross_margin),
        margin_percent: round2(margin.margin_percent),
    }
}
