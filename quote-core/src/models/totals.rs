use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Aggregation of line amounts sharing one effective tax rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxBucket {
    /// Tax rate as a percentage (e.g. `20` for 20 %).
    pub rate: Decimal,
    /// Sum of HT amounts at this rate, after discount redistribution.
    pub base: Decimal,
    /// `base * rate / 100`.
    pub tax_amount: Decimal,
}

/// Finalised totals snapshot stored on a document. Every monetary field has
/// been rounded to two decimals exactly once.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DocumentTotals {
    pub total_ht: Decimal,
    pub discount_amount: Decimal,
    pub total_ht_after_discount: Decimal,
    /// Ordered by ascending rate.
    pub tax_buckets: Vec<TaxBucket>,
    pub total_tax: Decimal,
    pub total_ttc: Decimal,
    pub retention_amount: Decimal,
    pub net_payable: Decimal,
    pub total_cost: Decimal,
    pub gross_margin: Decimal,
    pub margin_percent: Decimal,
}
