//! The decision record: one immutable, self-describing outcome per
//! analysis call. Superseded by a fresh record, never mutated.

use crate::{
    cashflow::CashflowMetrics,
    explain::{Counterfactual, RiskReason},
    normalizer::NormalizationReport,
    pd_model::RiskAssessment,
    policy::DeclineReason,
    types::{Amount, ApplicantId, JurisdictionCode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DecisionRecord {
    pub decision_id:               String,
    pub applicant_id:              ApplicantId,
    pub timestamp:                 DateTime<Utc>,
    pub jurisdiction:              JurisdictionCode,
    pub fraud_gate_passed:         bool,
    pub fraud_flags:               Vec<String>,
    /// None when the fraud gate short-circuited the pipeline.
    pub cashflow_metrics:          Option<CashflowMetrics>,
    pub risk_assessment:           Option<RiskAssessment>,
    pub approved:                  bool,
    pub credit_limit:              Amount,
    pub apr:                       Option<f64>,
    pub tier:                      Option<String>,
    pub reasons:                   Vec<RiskReason>,
    pub declines:                  Vec<DeclineReason>,
    pub counterfactuals:           Vec<Counterfactual>,
    /// Counterfactuals are single-feature; combined changes are not modeled.
    pub joint_effects_not_modeled: bool,
    /// Present when the record was produced from raw transactions.
    pub normalization:             Option<NormalizationReport>,
    pub policy_version:            String,
    pub model_version:             String,
}

pub fn new_decision_id() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    format!("dec_{}", &id[..12])
}

impl DecisionRecord {
    pub fn pd_12m(&self) -> Option<f64> {
        self.risk_assessment.as_ref().map(|r| r.pd_12m)
    }

    /// The record with its two per-call fields blanked, for comparing
    /// decisions across runs.
    pub fn without_identity(&self) -> Self {
        Self {
            decision_id: String::new(),
            timestamp: DateTime::<Utc>::UNIX_EPOCH,
            ..self.clone()
        }
    }
}
