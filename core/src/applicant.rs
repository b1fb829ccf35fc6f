//! Applicant-declared facts and the fraud-gate token supplied by the
//! identity collaborator. Both are consumed as-is and never re-verified.

use crate::{
    error::{EngineError, EngineResult},
    types::{Amount, JurisdictionCode},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EmploymentStatus {
    FullTime,
    PartTime,
    SelfEmployed,
    Unemployed,
    Retired,
}

/// Replaced wholesale on resubmission.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicantFacts {
    pub employment_status: EmploymentStatus,
    pub monthly_income:    Amount,
    pub tenure_months:     u32,
    pub jurisdiction:      JurisdictionCode,
}

impl ApplicantFacts {
    pub fn validate(&self) -> EngineResult<()> {
        if !self.monthly_income.is_finite() || self.monthly_income < 0.0 {
            return Err(EngineError::validation(
                "facts.monthly_income",
                format!("must be a non-negative amount, got {}", self.monthly_income),
            ));
        }
        if self.jurisdiction.trim().is_empty() {
            return Err(EngineError::validation("facts.jurisdiction", "missing"));
        }
        Ok(())
    }
}

/// Outcome of the liveness / deepfake / sanctions checks.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FraudGate {
    pub passed: bool,
    #[serde(default)]
    pub flags:  Vec<String>,
}

impl FraudGate {
    pub fn passed() -> Self {
        Self { passed: true, flags: Vec::new() }
    }

    pub fn failed(flags: Vec<String>) -> Self {
        Self { passed: false, flags }
    }
}
