//! Checks run on a draft before it is saved.
//!
//! All problems are collected so the editing collaborator can highlight
//! every offending field at once. Nothing is mutated on failure.

use std::fmt;

use rust_decimal::Decimal;
use thiserror::Error;

use crate::DocumentDraft;

/// One invalid field. `field` uses a dotted path such as `lines[2].quantity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldProblem {
    pub field: String,
    pub message: String,
}

impl FieldProblem {
    fn new(
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldProblem {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("invalid document: {}", summarize(.problems))]
pub struct ValidationErrors {
    pub problems: Vec<FieldProblem>,
}

impl ValidationErrors {
    pub fn has_field(
        &self,
        field: &str,
    ) -> bool {
        self.problems.iter().any(|p| p.field == field)
    }
}

fn summarize(problems: &[FieldProblem]) -> String {
    problems
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Validates a draft for saving.
///
/// ```
/// use chrono::NaiveDate;
/// use quote_core::{CompanySettings, DocumentDraft};
/// use quote_core::validation::validate_draft;
///
/// let draft = DocumentDraft::quote(&CompanySettings::default(), NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
/// let errors = validate_draft(&draft).unwrap_err();
///
/// assert!(errors.has_field("client_id"));
/// assert!(errors.has_field("lines"));
/// ```
pub fn validate_draft(draft: &DocumentDraft) -> Result<(), ValidationErrors> {
    let mut problems = Vec::new();

    match draft.client_id.as_deref() {
        Some(id) if !id.trim().is_empty() => {}
        _ => problems.push(FieldProblem::new("client_id", "a client must be selected")),
    }

    if draft.lines.is_empty() {
        problems.push(FieldProblem::new("lines", "at least one line is required"));
    }

    for (index, line) in draft.lines.iter().enumerate() {
        if line.quantity <= Decimal::ZERO {
            problems.push(FieldProblem::new(
                format!("lines[{index}].quantity"),
                "quantity must be greater than zero",
            ));
        }
        if line.unit_price_ht <= Decimal::ZERO {
            problems.push(FieldProblem::new(
                format!("lines[{index}].unit_price_ht"),
                "unit price must be greater than zero",
            ));
        }
        if line.tax_rate.is_some_and(|rate| rate < Decimal::ZERO) {
            problems.push(FieldProblem::new(
                format!("lines[{index}].tax_rate"),
                "tax rate cannot be negative",
            ));
        }
        if line.checked_amount_ht().is_none() || line.checked_cost_ht().is_none() {
            problems.push(FieldProblem::new(
                format!("lines[{index}]"),
                "quantity times price is too large",
            ));
        }
    }

    if draft.global_discount_percent < Decimal::ZERO
        || draft.global_discount_percent > Decimal::ONE_HUNDRED
    {
        problems.push(FieldProblem::new(
            "global_discount_percent",
            "discount must be between 0 and 100",
        ));
    }

    if draft.default_tax_rate < Decimal::ZERO {
        problems.push(FieldProblem::new(
            "default_tax_rate",
            "tax rate cannot be negative",
        ));
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(ValidationErrors { problems })
    }
}
