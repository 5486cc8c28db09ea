//! Multi-rate VAT aggregation with proportional discount redistribution.
//!
//! # Steps
//!
//! | Step | Description |
//! |------|-------------|
//! | 1    | Effective rate per line (line rate, else document default) |
//! | 2    | Total HT = Σ line amounts |
//! | 3    | Buckets keyed by effective rate accumulate base and tax |
//! | 4    | Discount amount = total HT × discount % |
//! | 5    | Every bucket is scaled by the discount ratio |
//! | 6    | Total tax = Σ bucket tax (zero under the VAT-exempt regime) |
//! | 7    | Total TTC = discounted HT + total tax |
//!
//! All steps work on unrounded values. The global discount is a uniform
//! haircut applied after rate aggregation, so the mix of tax rates across
//! the discounted total is the same as before the discount.
//!
//! # Example
//!
//! ```
//! use rust_decimal_macros::dec;
//! use quote_core::LineItem;
//! use quote_core::calculations::TaxBucketCalculator;
//!
//! let lines = vec![
//!     LineItem::new("Gros oeuvre", dec!(1), "forfait", dec!(1000)).with_tax_rate(dec!(20)),
//!     LineItem::new("Rénovation", dec!(1), "forfait", dec!(500)).with_tax_rate(dec!(10)),
//! ];
//!
//! let calculator = TaxBucketCalculator::new(dec!(20), dec!(10), false);
//! let breakdown = calculator.calculate(&lines);
//!
//! assert_eq!(breakdown.total_ht_after_discount, dec!(1350));
//! assert_eq!(breakdown.total_tax, dec!(225));
//! assert_eq!(breakdown.total_ttc, dec!(1575));
//! ```

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use tracing::debug;

use crate::calculations::common::{percent_of, round2};
use crate::{LineItem, TaxBucket};

/// Unrounded result of the bucket calculation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaxBreakdown {
    pub total_ht: Decimal,
    pub discount_amount: Decimal,
    pub total_ht_after_discount: Decimal,
    /// Factor applied to every bucket; `1` when the undiscounted total is zero.
    pub discount_ratio: Decimal,
    /// Buckets after discount redistribution, ordered by ascending rate.
    pub buckets: Vec<TaxBucket>,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
}

impl TaxBreakdown {
    /// Buckets with base and tax rounded for storage.
    pub fn rounded_buckets(&self) -> Vec<TaxBucket> {
        self.buckets
            .iter()
            .map(|bucket| TaxBucket {
                rate: bucket.rate,
                base: round2(bucket.base),
                tax_amount: round2(bucket.tax_amount),
            })
            .collect()
    }
}

/// Groups line items by tax rate and applies the global discount.
#[derive(Debug, Clone, Copy)]
pub struct TaxBucketCalculator {
    default_tax_rate: Decimal,
    global_discount_percent: Decimal,
    vat_exempt: bool,
}

impl TaxBucketCalculator {
    pub fn new(
        default_tax_rate: Decimal,
        global_discount_percent: Decimal,
        vat_exempt: bool,
    ) -> Self {
        Self {
            default_tax_rate,
            global_discount_percent,
            vat_exempt,
        }
    }

    /// Runs every step over `lines`. Never fails: empty documents, zero
    /// rates and full discounts all produce well-defined zero results.
    pub fn calculate(
        &self,
        lines: &[LineItem],
    ) -> TaxBreakdown {
        let total_ht: Decimal = lines.iter().map(LineItem::amount_ht).sum();
        let raw_buckets = self.accumulate_buckets(lines);

        let discount_amount = percent_of(total_ht, self.global_discount_percent);
        let total_ht_after_discount = total_ht - discount_amount;
        let discount_ratio = self.discount_ratio(total_ht);

        let buckets: Vec<TaxBucket> = raw_buckets
            .into_iter()
            .map(|(rate, (base, tax_amount))| TaxBucket {
                rate,
                base: base * discount_ratio,
                tax_amount: tax_amount * discount_ratio,
            })
            .collect();

        let total_tax = if self.vat_exempt {
            Decimal::ZERO
        } else {
            buckets.iter().map(|bucket| bucket.tax_amount).sum()
        };
        let total_ttc = total_ht_after_discount + total_tax;

        debug!(
            %total_ht,
            %total_ht_after_discount,
            %total_tax,
            buckets = buckets.len(),
            vat_exempt = self.vat_exempt,
            "tax buckets calculated"
        );

        TaxBreakdown {
            total_ht,
            discount_amount,
            total_ht_after_discount,
            discount_ratio,
            buckets,
            total_tax,
            total_ttc,
        }
    }

    /// Sums base and tax per effective rate, before any discount.
    fn accumulate_buckets(
        &self,
        lines: &[LineItem],
    ) -> BTreeMap<Decimal, (Decimal, Decimal)> {
        let mut buckets: BTreeMap<Decimal, (Decimal, Decimal)> = BTreeMap::new();

        for line in lines {
            let rate = line.effective_tax_rate(self.default_tax_rate).normalize();
            let amount = line.amount_ht();
            let entry = buckets.entry(rate).or_default();
            entry.0 += amount;
            entry.1 += percent_of(amount, rate);
        }

        buckets
    }

    /// `total_after_discount / total_ht`, or `1` for an empty total.
    ///
    /// Expressed as `1 - discount / 100`, which is the same quotient but
    /// stays exact in decimal arithmetic.
    fn discount_ratio(
        &self,
        total_ht: Decimal,
    ) -> Decimal {
        if total_ht.is_zero() {
            Decimal::ONE
        } else {
            Decimal::ONE - self.global_discount_percent / Decimal::ONE_HUNDRED
        }
    }
}
