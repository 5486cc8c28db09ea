use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One priced row on a quote or invoice.
///
/// The HT amount is always derived from `quantity` and `unit_price_ht`
/// through [`LineItem::amount_ht`]; it is never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub id: String,
    pub description: String,
    pub quantity: Decimal,
    pub unit: String,

    /// Unit price excluding tax. Negative values represent credits.
    pub unit_price_ht: Decimal,

    /// Purchase cost per unit, only used for margin analysis.
    #[serde(default)]
    pub unit_cost_ht: Decimal,

    /// Line-specific tax rate (percentage). `None` means the document default.
    #[serde(default)]
    pub tax_rate: Option<Decimal>,

    /// Title of the section the line is printed under, e.g. "Cuisine".
    /// Consecutive lines with the same title form one section.
    #[serde(default)]
    pub section: Option<String>,
}

/// A run of consecutive lines sharing a section title.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineSection<'a> {
    pub title: Option<&'a str>,
    pub lines: &'a [LineItem],
}

impl LineSection<'_> {
    /// Unrounded HT total of the section's lines.
    pub fn subtotal_ht(&self) -> Decimal {
        self.lines.iter().map(LineItem::amount_ht).sum()
    }
}

/// Splits `lines` into sections, keeping their order. A title that comes
/// back after another section starts a new section.
pub fn group_sections(lines: &[LineItem]) -> Vec<LineSection<'_>> {
    lines
        .chunk_by(|a, b| a.section == b.section)
        .map(|chunk| LineSection {
            title: chunk[0].section.as_deref(),
            lines: chunk,
        })
        .collect()
}

impl LineItem {
    pub fn new(
        description: impl Into<String>,
        quantity: Decimal,
        unit: impl Into<String>,
        unit_price_ht: Decimal,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            description: description.into(),
            quantity,
            unit: unit.into(),
            unit_price_ht,
            unit_cost_ht: Decimal::ZERO,
            tax_rate: None,
            section: None,
        }
    }

    pub fn with_cost(
        mut self,
        unit_cost_ht: Decimal,
    ) -> Self {
        self.unit_cost_ht = unit_cost_ht;
        self
    }

    pub fn with_tax_rate(
        mut self,
        tax_rate: Decimal,
    ) -> Self {
        self.tax_rate = Some(tax_rate);
        self
    }

    pub fn with_section(
        mut self,
        title: impl Into<String>,
    ) -> Self {
        self.section = Some(title.into());
        self
    }

    /// `quantity * unit_price_ht`, unrounded.
    ///
    /// Panics on overflow; stored lines have been checked with
    /// [`LineItem::checked_amount_ht`] during validation.
    pub fn amount_ht(&self) -> Decimal {
        self.quantity * self.unit_price_ht
    }

    /// `quantity * unit_cost_ht`, unrounded.
    pub fn cost_ht(&self) -> Decimal {
        self.quantity * self.unit_cost_ht
    }

    /// [`LineItem::amount_ht`], or `None` if it does not fit in a `Decimal`.
    pub fn checked_amount_ht(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_price_ht)
    }

    pub fn checked_cost_ht(&self) -> Option<Decimal> {
        self.quantity.checked_mul(self.unit_cost_ht)
    }

    pub fn effective_tax_rate(
        &self,
        default_tax_rate: Decimal,
    ) -> Decimal {
        self.tax_rate.unwrap_or(default_tax_rate)
    }

    /// Copy of this line under a fresh id, for documents derived from another.
    pub fn duplicate(&self) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ..self.clone()
        }
    }
}
