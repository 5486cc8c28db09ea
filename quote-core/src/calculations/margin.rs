//! Gross margin over purchase costs.
//!
//! Revenue is the discounted HT total; costs are taken at face value and are
//! not scaled by the discount, so a discount lowers the margin one-for-one.

use rust_decimal::Decimal;

use crate::LineItem;

/// Unrounded margin figures.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MarginResult {
    pub total_cost: Decimal,
    pub gross_margin: Decimal,
    /// `0` when revenue is zero or negative.
    pub margin_percent: Decimal,
}

/// Computes cost, gross margin and margin percentage against `revenue_ht`.
///
/// Returns `None` when a figure does not fit in a [`Decimal`], e.g. costs
/// in the billions against a revenue of a fraction of a cent.
///
/// ```
/// use rust_decimal_macros::dec;
/// use quote_core::LineItem;
/// use quote_core::calculations::calculate_margin;
///
/// let lines = vec![LineItem::new("Pose", dec!(10), "m²", dec!(50)).with_cost(dec!(30))];
/// let margin = calculate_margin(&lines, dec!(500)).unwrap();
///
/// assert_eq!(margin.total_cost, dec!(300));
/// assert_eq!(margin.gross_margin, dec!(200));
/// assert_eq!(margin.margin_percent, dec!(40));
/// ```
pub fn calculate_margin(
    lines: &[LineItem],
    revenue_ht: Decimal,
) -> Option<MarginResult> {
    let total_cost = lines
        .iter()
        .try_fold(Decimal::ZERO, |sum, line| sum.checked_add(line.checked_cost_ht()?))?;
    let gross_margin = revenue_ht.checked_sub(total_cost)?;
    let margin_percent = if revenue_ht > Decimal::ZERO {
        gross_margin
            .checked_div(revenue_ht)?
            .checked_mul(Decimal::ONE_HUNDRED)?
    } else {
        Decimal::ZERO
    };

    Some(MarginResult {
        total_cost,
        gross_margin,
        margin_percent,
    })
}
