//! Funding application form checks.
//!
//! Turns the raw form into the exact `create_funding_proposal` arguments.
//! The minimum request is dashboard policy; the contract itself accepts any
//! non-negative amount.

use serde::{Deserialize, Serialize};

use crate::errors::{ConnectionError, DashboardError};

pub const CATEGORIES: [&str; 11] = [
    "Retail & UMKM",
    "Food & Beverage",
    "Agriculture",
    "Creative Industry",
    "Technology",
    "Education",
    "Health",
    "Manufacturing",
    "Digital Services",
    "Logistics",
    "Other",
];

const REQUIRED_FIELDS_MSG: &str = "Please complete all required fields.";

/// The application form as submitted. Every field arrives as text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApplicationForm {
    /// Connected wallet account, if any.
    pub proposer: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Decimal amount in whole token units, e.g. `"12.5"`.
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub jobs: Option<String>,
}

/// Arguments for `create_funding_proposal`, in call order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreateProposalArgs {
    pub proposer: String,
    pub name: String,
    pub category: String,
    pub description: String,
    /// Smallest token units, as a decimal string (i128 does not fit JSON numbers).
    pub requested_amount: String,
    pub jobs: u64,
}

#[derive(Debug, Clone)]
pub struct FormRules {
    pub token_decimals: u32,
    /// Whole-unit decimal string, e.g. `"0.01"`.
    pub min_funding_request: String,
}

pub fn validate_application(
    form: &ApplicationForm,
    rules: &FormRules,
) -> Result<CreateProposalArgs, DashboardError> {
    let name = form.name.trim();
    let category = form.category.trim();
    let description = form.description.trim();
    let amount = form.amount.trim();

    if name.is_empty() || category.is_empty() || description.is_empty() || amount.is_empty() {
        return Err(DashboardError::Validation(REQUIRED_FIELDS_MSG.to_string()));
    }

    if !CATEGORIES.contains(&category) {
        return Err(DashboardError::Validation(format!(
            "Unknown business category \"{category}\"."
        )));
    }

    let requested = parse_units(amount, rules.token_decimals)?;
    let minimum = parse_units(&rules.min_funding_request, rules.token_decimals)?;
    if requested < minimum {
        return Err(DashboardError::Validation(format!(
            "Minimum funding request is {}.",
            rules.min_funding_request.trim()
        )));
    }

    let jobs = match form.jobs.as_deref().map(str::trim) {
        None | Some("") => 0,
        Some(raw) => raw.parse::<u64>().map_err(|_| {
            DashboardError::Validation("Jobs created must be a whole number.".to_string())
        })?,
    };

    let proposer = form
        .proposer
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or(ConnectionError::NoAccount)?;

    Ok(CreateProposalArgs {
        proposer: proposer.to_string(),
        name: name.to_string(),
        category: category.to_string(),
        description: description.to_string(),
        requested_amount: requested.to_string(),
        jobs,
    })
}

/// Parse a non-negative decimal string into smallest units.
/// More fraction digits than `decimals` is an error rather than a silent
/// truncation.
pub fn parse_units(raw: &str, decimals: u32) -> Result<i128, DashboardError> {
    let invalid = || DashboardError::Validation(format!("\"{raw}\" is not a valid amount."));

    let raw = raw.trim();
    let (whole, frac) = match raw.split_once('.') {
        Some((w, f)) => (w, f),
        None => (raw, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > decimals as usize {
        return Err(DashboardError::Validation(format!(
            "Amounts support at most {decimals} decimal places."
        )));
    }

    let scale = 10i128.checked_pow(decimals).ok_or_else(invalid)?;
    let whole: i128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_units: i128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = decimals as usize);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(invalid)
}
