//! Financial calculations for quotes and invoices.
//!
//! Everything here is a pure function over a document snapshot: totals are
//! recomputed from the line items on demand and never updated incrementally.

pub mod common;
pub mod margin;
pub mod tax_buckets;
pub mod totals;

pub use margin::{MarginResult, calculate_margin};
pub use tax_buckets::{TaxBreakdown, TaxBucketCalculator};
pub use totals::{TotalsError, TotalsInput, compute_totals, flat_rate_totals};
