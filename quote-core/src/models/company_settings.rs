use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Company-level configuration consumed by the default-value fallbacks of
/// the totals, derivation and creation paths.
///
/// Every field has a default so a partial settings file is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompanySettings {
    /// Tax rate (percentage) applied to lines without their own rate.
    pub default_tax_rate: Decimal,

    /// VAT-exempt small-business regime. Forces every tax total to zero.
    pub vat_exempt: bool,

    /// Validity period given to new quotes.
    pub default_validity_days: u32,

    /// Deposit percentage used when a deposit invoice is requested without one.
    pub default_deposit_percent: Decimal,

    /// Holdback percentage withheld from the TTC total of quotes that use
    /// retention of guarantee.
    pub retention_percent: Decimal,

    /// How many times document creation regenerates a number after the
    /// store rejected a duplicate.
    pub max_number_attempts: u32,
}

impl Default for CompanySettings {
    fn default() -> Self {
        Self {
            default_tax_rate: Decimal::TEN,
            vat_exempt: false,
            default_validity_days: 30,
            default_deposit_percent: Decimal::new(30, 0),
            retention_percent: Decimal::new(5, 0),
            max_number_attempts: 5,
        }
    }
}
