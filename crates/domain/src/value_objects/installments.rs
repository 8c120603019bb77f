use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MAX_INSTALLMENTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installment {
    pub date: NaiveDate,
    pub amount_minor: i64,
}

/// Agreed schedule of partial payments, stored as JSON on the procedure row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstallmentPlan(Vec<Installment>);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InstallmentPlanError {
    #[error("installment plan has {0} entries, at most {MAX_INSTALLMENTS} are allowed")]
    TooManyEntries(usize),
    #[error("installment amount must be positive (entry {0})")]
    NonPositiveAmount(usize),
    #[error("installment dates must be strictly increasing (entry {0})")]
    UnorderedDates(usize),
    #[error("installment plan is not valid json: {0}")]
    Malformed(String),
}

impl InstallmentPlan {
    pub fn new(entries: Vec<Installment>) -> Result<Self, InstallmentPlanError> {
        if entries.len() > MAX_INSTALLMENTS {
            return Err(InstallmentPlanError::TooManyEntries(entries.len()));
        }
        for (idx, entry) in entries.iter().enumerate() {
            if entry.amount_minor <= 0 {
                return Err(InstallmentPlanError::NonPositiveAmount(idx));
            }
            if idx > 0 && entries[idx - 1].date >= entry.date {
                return Err(InstallmentPlanError::UnorderedDates(idx));
            }
        }
        Ok(Self(entries))
    }

    pub fn from_json(value: &serde_json::Value) -> Result<Self, InstallmentPlanError> {
        let entries: Vec<Installment> = serde_json::from_value(value.clone())
            .map_err(|err| InstallmentPlanError::Malformed(err.to_string()))?;
        Self::new(entries)
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.0).unwrap_or(serde_json::Value::Null)
    }

    pub fn entries(&self) -> &[Installment] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total_minor(&self) -> i64 {
        self.0.iter().map(|entry| entry.amount_minor).sum()
    }
}
