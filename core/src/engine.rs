//! The underwriting engine: the single entry point for a decision.
//!
//! PIPELINE ORDER (fixed, never reordered):
//!   1. Validate applicant facts
//!   2. Resolve the jurisdiction policy
//!   3. Normalize transactions
//!   4. Fraud gate          (failure short-circuits to a decline record)
//!   5. History sufficiency (too little history is an error, not a decline)
//!   6. Extract cashflow metrics
//!   7. Score PD
//!   8. Apply policy
//!   9. Explain
//!  10. Assemble the decision record
//!
//! RULES:
//!   - Config, model and policy tables are validated once in new().
//!   - The engine is immutable after construction; analyze() takes &self.
//!   - decision_id and timestamp are the only non-deterministic fields.

use crate::{
    applicant::{ApplicantFacts, FraudGate},
    cashflow::{CashflowExtractor, CashflowMetrics},
    config::{EngineConfig, JurisdictionPolicy},
    decision::{new_decision_id, DecisionRecord},
    error::{EngineError, EngineResult},
    explain::ExplainabilityEngine,
    normalizer::{NormalizationReport, TransactionNormalizer},
    pd_model::{FeatureVector, PdModel, RiskAssessment},
    policy::PolicyEngine,
    recurrence::{CadenceDetector, RecurrenceDetector},
    transaction::RawTransaction,
    types::{ApplicantId, JurisdictionCode},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Everything one analysis call needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub applicant_id: ApplicantId,
    pub transactions: Vec<RawTransaction>,
    pub facts:        ApplicantFacts,
    pub fraud_gate:   FraudGate,
    pub jurisdiction: JurisdictionCode,
    /// Anchors the lookback window. Defaults to the latest transaction.
    #[serde(default)]
    pub as_of:        Option<DateTime<Utc>>,
}

pub struct UnderwritingEngine {
    config:   EngineConfig,
    model:    PdModel,
    detector: Box<dyn RecurrenceDetector>,
}

impl UnderwritingEngine {
    pub fn new(config: EngineConfig) -> EngineResult<Self> {
        let model = PdModel::new(config.model.clone())?;
        for policy in config.policies.iter() {
            policy.validate()?;
        }
        let window = &config.window;
        if window.min_history_days < 1 || window.lookback_days < window.min_history_days {
            return Err(EngineError::Configuration(format!(
                "window invalid: lookback_days={} min_history_days={}",
                window.lookback_days,
                window.min_history_days
            )));
        }
        let detector: Box<dyn RecurrenceDetector> =
            Box::new(CadenceDetector::new(config.recurrence.clone()));

        log::info!(
            "engine: ready model={} jurisdictions={} detector={}",
            model.version(),
            config.policies.codes().collect::<Vec<_>>().join(","),
            detector.name()
        );

        Ok(Self {
            config,
            model,
            detector,
        })
    }

    /// Engine over the built-in configuration. For tests and embedding.
    pub fn build_test() -> EngineResult<Self> {
        Self::new(EngineConfig::builtin())
    }

    /// Replace the recurrence strategy used by the cashflow extractor.
    pub fn with_recurrence_detector(mut self, detector: Box<dyn RecurrenceDetector>) -> Self {
        log::debug!("engine: recurrence detector set to {}", detector.name());
        self.detector = detector;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model(&self) -> &PdModel {
        &self.model
    }

    pub fn analyze(&self, request: &AnalysisRequest) -> EngineResult<DecisionRecord> {
        let id = &request.applicant_id;

        self.validate_facts(&request.facts, &request.jurisdiction)?;
        let policy = self.config.policies.resolve(&request.jurisdiction)?;

        let normalizer = TransactionNormalizer::new(&self.config.window);
        let history = normalizer.normalize(&request.transactions, request.as_of)?;

        if !request.fraud_gate.passed {
            return Ok(self.fraud_decline_record(
                id,
                &request.jurisdiction,
                &request.fraud_gate,
                policy,
                Some(history.report),
            ));
        }

        let days = history.history_days();
        let required = self.config.window.min_history_days;
        if days < required {
            log::warn!("applicant={id} engine: insufficient history days={days} required={required}");
            return Err(EngineError::InsufficientData { days, required });
        }

        let extractor = CashflowExtractor::new(
            &self.config.classification,
            &self.config.recurrence,
            self.detector.as_ref(),
        );
        let metrics = extractor.extract(&history);

        self.decide(
            id,
            metrics,
            &request.facts,
            &request.fraud_gate,
            &request.jurisdiction,
            Some(history.report),
        )
    }

    /// Runs the pipeline from precomputed metrics. No history check, but
    /// the metrics themselves are range-checked.
    pub fn assess(
        &self,
        applicant_id: &str,
        metrics: CashflowMetrics,
        facts: &ApplicantFacts,
        fraud_gate: &FraudGate,
        jurisdiction: &str,
    ) -> EngineResult<DecisionRecord> {
        self.validate_facts(facts, jurisdiction)?;
        metrics.validate()?;
        let applicant_id = applicant_id.to_string();
        if !fraud_gate.passed {
            let policy = self.config.policies.resolve(jurisdiction)?;
            return Ok(self.fraud_decline_record(
                &applicant_id,
                jurisdiction,
                fraud_gate,
                policy,
                None,
            ));
        }
        self.decide(&applicant_id, metrics, facts, fraud_gate, jurisdiction, None)
    }

    fn validate_facts(&self, facts: &ApplicantFacts, jurisdiction: &str) -> EngineResult<()> {
        facts.validate()?;
        if facts.jurisdiction != jurisdiction {
            return Err(EngineError::validation(
                "facts.jurisdiction",
                format!(
                    "declared '{}' does not match requested '{jurisdiction}'",
                    facts.jurisdiction
                ),
            ));
        }
        Ok(())
    }

    fn decide(
        &self,
        applicant_id: &ApplicantId,
        metrics: CashflowMetrics,
        facts: &ApplicantFacts,
        fraud_gate: &FraudGate,
        jurisdiction: &str,
        normalization: Option<NormalizationReport>,
    ) -> EngineResult<DecisionRecord> {
        let policy = self.config.policies.resolve(jurisdiction)?;
        let policy_engine = PolicyEngine::new(policy);
        let explainer = ExplainabilityEngine::new(&self.model);

        let features = FeatureVector::from_inputs(&metrics, facts);
        let score = self.model.score_features(&features);
        let decision = policy_engine.decide(score.pd_12m, fraud_gate.passed, &metrics);

        let lgd = policy.lgd.unwrap_or(self.model.default_lgd());
        let risk = RiskAssessment::new(&score, lgd, decision.credit_limit);

        let reasons = explainer.reasons(&score);
        let counterfactuals = if !decision.approved || !decision.is_top_tier {
            explainer.counterfactuals(&features, &score)
        } else {
            Vec::new()
        };

        log::info!(
            "applicant={applicant_id} engine: approved={} tier={} pd={:.4} reasons={} counterfactuals={}",
            decision.approved,
            decision.tier.as_deref().unwrap_or("-"),
            score.pd_12m,
            reasons.len(),
            counterfactuals.len()
        );

        Ok(DecisionRecord {
            decision_id:               new_decision_id(),
            applicant_id:              applicant_id.clone(),
            timestamp:                 Utc::now(),
            jurisdiction:              jurisdiction.to_string(),
            fraud_gate_passed:         fraud_gate.passed,
            fraud_flags:               fraud_gate.flags.clone(),
            cashflow_metrics:          Some(metrics),
            risk_assessment:           Some(risk),
            approved:                  decision.approved,
            credit_limit:              decision.credit_limit,
            apr:                       decision.apr,
            tier:                      decision.tier,
            reasons,
            declines:                  decision.declines,
            counterfactuals,
            joint_effects_not_modeled: true,
            normalization,
            policy_version:            policy.policy_version.clone(),
            model_version:             self.model.version().to_string(),
        })
    }

    fn fraud_decline_record(
        &self,
        applicant_id: &ApplicantId,
        jurisdiction: &str,
        fraud_gate: &FraudGate,
        policy: &JurisdictionPolicy,
        normalization: Option<NormalizationReport>,
    ) -> DecisionRecord {
        log::info!(
            "applicant={applicant_id} engine: declined by fraud gate flags={}",
            fraud_gate.flags.join(",")
        );
        let declines = PolicyEngine::new(policy).fraud_gate_decline().declines;

        DecisionRecord {
            decision_id:               new_decision_id(),
            applicant_id:              applicant_id.clone(),
            timestamp:                 Utc::now(),
            jurisdiction:              jurisdiction.to_string(),
            fraud_gate_passed:         false,
            fraud_flags:               fraud_gate.flags.clone(),
            cashflow_metrics:          None,
            risk_assessment:           None,
            approved:                  false,
            credit_limit:              0.0,
            apr:                       None,
            tier:                      None,
            reasons:                   vec![ExplainabilityEngine::new(&self.model).fraud_gate_reason()],
            declines,
            counterfactuals:           Vec::new(),
            joint_effects_not_modeled: true,
            normalization,
            policy_version:            policy.policy_version.clone(),
            model_version:             self.model.version().to_string(),
        }
    }
}
