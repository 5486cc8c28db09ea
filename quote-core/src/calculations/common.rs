//! Common utility functions for document calculations.
//!
//! This module provides the shared money helpers used by every calculator:
//! the single rounding rule and percentage application.

use rust_decimal::{Decimal, RoundingStrategy};

/// Rounds a monetary value to exactly two decimal places, half away from zero.
///
/// Values at exactly 0.005 are rounded to 0.01, and negative midpoints move
/// away from zero as well. Callers apply this once per stored field, at the
/// point the value is finalised; intermediate sums stay unrounded.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use quote_core::calculations::common::round2;
///
/// assert_eq!(round2(dec!(123.454)), dec!(123.45));
/// assert_eq!(round2(dec!(123.455)), dec!(123.46));
/// assert_eq!(round2(dec!(-123.455)), dec!(-123.46)); // Away from zero
/// ```
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Applies a percentage: `amount * percent / 100`, unrounded.
///
/// # Examples
///
/// ```
/// use rust_decimal_macros::dec;
/// use quote_core::calculations::common::percent_of;
///
/// assert_eq!(percent_of(dec!(1350), dec!(30)), dec!(405));
/// assert_eq!(percent_of(dec!(450), dec!(5.5)), dec!(24.75));
/// ```
pub fn percent_of(
    amount: Decimal,
    percent: Decimal,
) -> Decimal {
    amount * percent / Decimal::ONE_HUNDRED
}
