//! Policy engine: turns a PD and the cashflow metrics into an
//! approve / decline decision, a credit limit and a price.
//!
//! Decision ladder (first rule that fires wins):
//!   1. Fraud gate failed    → decline FRAUD_GATE_FAILED, nothing else checked
//!   2. Any hard gate failed → decline, every failing gate reported
//!   3. First tier with pd_12m <= max_pd → approve at that tier's limit
//!   4. No tier matched      → decline PD_ABOVE_RISK_APPETITE
//!
//! RULES:
//!   - The engine is bound to exactly one injected JurisdictionPolicy.
//!   - Policy tables are validated once at startup, never per request.

use crate::{
    cashflow::CashflowMetrics,
    config::{CreditTier, JurisdictionPolicy},
    error::{EngineError, EngineResult},
    types::Amount,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeclineCode {
    FraudGateFailed,
    BufferBelowMinimum,
    PaymentBurdenAboveMaximum,
    OnTimeRatioBelowMinimum,
    NsfCountAboveMaximum,
    PdAboveRiskAppetite,
}

impl DeclineCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FraudGateFailed           => "FRAUD_GATE_FAILED",
            Self::BufferBelowMinimum        => "BUFFER_BELOW_MINIMUM",
            Self::PaymentBurdenAboveMaximum => "PAYMENT_BURDEN_ABOVE_MAXIMUM",
            Self::OnTimeRatioBelowMinimum   => "ON_TIME_RATIO_BELOW_MINIMUM",
            Self::NsfCountAboveMaximum      => "NSF_COUNT_ABOVE_MAXIMUM",
            Self::PdAboveRiskAppetite       => "PD_ABOVE_RISK_APPETITE",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeclineReason {
    pub code:        DeclineCode,
    pub description: String,
}

impl DeclineReason {
    fn new(code: DeclineCode, description: impl Into<String>) -> Self {
        Self {
            code,
            description: description.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyDecision {
    pub approved:     bool,
    pub credit_limit: Amount,
    /// Percent. None on every decline.
    pub apr:          Option<f64>,
    pub tier:         Option<String>,
    /// True when the approval landed in the first (best) tier.
    pub is_top_tier:  bool,
    pub declines:     Vec<DeclineReason>,
}

impl PolicyDecision {
    fn declined(declines: Vec<DeclineReason>) -> Self {
        Self {
            approved:     false,
            credit_limit: 0.0,
            apr:          None,
            tier:         None,
            is_top_tier:  false,
            declines,
        }
    }

    pub fn is_fraud_decline(&self) -> bool {
        self.declines
            .iter()
            .any(|d| d.code == DeclineCode::FraudGateFailed)
    }
}

impl JurisdictionPolicy {
    /// Structural checks on one policy table. Called by the engine at
    /// construction for every configured jurisdiction.
    pub fn validate(&self) -> EngineResult<()> {
        let code = &self.code;
        let fail = |reason: String| EngineError::PolicyConfiguration(format!("{code}: {reason}"));

        if code.trim().is_empty() {
            return Err(EngineError::PolicyConfiguration(
                "jurisdiction code must not be empty".into(),
            ));
        }

        let g = &self.gates;
        if !(g.min_buffer_days.is_finite() && g.min_buffer_days >= 0.0) {
            return Err(fail(format!("min_buffer_days invalid: {}", g.min_buffer_days)));
        }
        if !(g.max_payment_burden.is_finite() && g.max_payment_burden > 0.0) {
            return Err(fail(format!("max_payment_burden invalid: {}", g.max_payment_burden)));
        }
        if !(0.0..=1.0).contains(&g.min_on_time_ratio) {
            return Err(fail(format!("min_on_time_ratio invalid: {}", g.min_on_time_ratio)));
        }

        if self.tiers.is_empty() {
            return Err(fail("at least one credit tier is required".into()));
        }
        for t in &self.tiers {
            if !(t.max_pd > 0.0 && t.max_pd < 1.0) {
                return Err(fail(format!("tier {} max_pd out of (0, 1): {}", t.name, t.max_pd)));
            }
            if !(t.credit_limit.is_finite() && t.credit_limit > 0.0) {
                return Err(fail(format!(
                    "tier {} credit_limit must be positive: {}",
                    t.name, t.credit_limit
                )));
            }
        }
        for pair in self.tiers.windows(2) {
            if pair[1].max_pd <= pair[0].max_pd {
                return Err(fail(format!(
                    "tiers {} and {} are not ordered by increasing max_pd",
                    pair[0].name, pair[1].name
                )));
            }
            if pair[1].credit_limit > pair[0].credit_limit {
                return Err(fail(format!(
                    "tier {} grants more credit than the less risky tier {}",
                    pair[1].name, pair[0].name
                )));
            }
        }

        let apr = &self.apr;
        if !(apr.base_apr.is_finite() && apr.max_apr.is_finite() && apr.base_apr <= apr.max_apr) {
            return Err(fail(format!(
                "apr bounds invalid: base {} max {}",
                apr.base_apr, apr.max_apr
            )));
        }
        if let Some(lgd) = self.lgd {
            if !(0.0..=1.0).contains(&lgd) {
                return Err(fail(format!("lgd must be within [0, 1], got {lgd}")));
            }
        }
        Ok(())
    }
}

pub struct PolicyEngine<'p> {
    policy: &'p JurisdictionPolicy,
}

impl<'p> PolicyEngine<'p> {
    pub fn new(policy: &'p JurisdictionPolicy) -> Self {
        Self { policy }
    }

    pub fn fraud_gate_decline(&self) -> PolicyDecision {
        PolicyDecision::declined(vec![DeclineReason::new(
            DeclineCode::FraudGateFailed,
            "Identity verification did not pass; no credit assessment performed",
        )])
    }

    pub fn decide(
        &self,
        pd_12m: f64,
        fraud_gate_passed: bool,
        metrics: &CashflowMetrics,
    ) -> PolicyDecision {
        let code = &self.policy.code;

        if !fraud_gate_passed {
            log::info!("jurisdiction={code} policy: declined by fraud gate");
            return self.fraud_gate_decline();
        }

        let failed = self.check_gates(metrics);
        if !failed.is_empty() {
            let codes: Vec<&str> = failed.iter().map(|d| d.code.as_str()).collect();
            log::info!(
                "jurisdiction={code} policy: declined by hard gate {}",
                codes.join(",")
            );
            return PolicyDecision::declined(failed);
        }

        match self.tier_for(pd_12m) {
            Some((index, tier)) => {
                let apr = self.apr_for(pd_12m);
                log::info!(
                    "jurisdiction={code} policy: approved tier={} limit={:.0} apr={apr:.2} pd={pd_12m:.4}",
                    tier.name,
                    tier.credit_limit
                );
                PolicyDecision {
                    approved:     true,
                    credit_limit: tier.credit_limit,
                    apr:          Some(apr),
                    tier:         Some(tier.name.clone()),
                    is_top_tier:  index == 0,
                    declines:     Vec::new(),
                }
            }
            None => {
                let ceiling = self.policy.tiers.last().map(|t| t.max_pd).unwrap_or(0.0);
                log::info!("jurisdiction={code} policy: declined pd={pd_12m:.4} above appetite");
                PolicyDecision::declined(vec![DeclineReason::new(
                    DeclineCode::PdAboveRiskAppetite,
                    format!(
                        "12-month default probability {:.1}% exceeds the maximum of {:.1}%",
                        pd_12m * 100.0,
                        ceiling * 100.0
                    ),
                )])
            }
        }
    }

    /// Every failing hard gate, in a fixed order.
    pub fn check_gates(&self, metrics: &CashflowMetrics) -> Vec<DeclineReason> {
        let g = &self.policy.gates;
        let mut failed = Vec::new();

        if metrics.buffer_days < g.min_buffer_days {
            failed.push(DeclineReason::new(
                DeclineCode::BufferBelowMinimum,
                format!(
                    "Cash buffer of {:.1} days is below the minimum of {:.0} days",
                    metrics.buffer_days, g.min_buffer_days
                ),
            ));
        }
        if metrics.payment_burden > g.max_payment_burden {
            failed.push(DeclineReason::new(
                DeclineCode::PaymentBurdenAboveMaximum,
                format!(
                    "Recurring payments take {:.0}% of income, above the maximum of {:.0}%",
                    metrics.payment_burden * 100.0,
                    g.max_payment_burden * 100.0
                ),
            ));
        }
        if metrics.on_time_ratio < g.min_on_time_ratio {
            failed.push(DeclineReason::new(
                DeclineCode::OnTimeRatioBelowMinimum,
                format!(
                    "{:.0}% of recurring payments were on time, below the minimum of {:.0}%",
                    metrics.on_time_ratio * 100.0,
                    g.min_on_time_ratio * 100.0
                ),
            ));
        }
        if metrics.nsf_count_90d > g.max_nsf_count {
            failed.push(DeclineReason::new(
                DeclineCode::NsfCountAboveMaximum,
                format!(
                    "{} NSF or overdraft events in 90 days, above the maximum of {}",
                    metrics.nsf_count_90d, g.max_nsf_count
                ),
            ));
        }
        failed
    }

    /// First tier whose max_pd covers the PD, with its position.
    pub fn tier_for(&self, pd_12m: f64) -> Option<(usize, &'p CreditTier)> {
        self.policy
            .tiers
            .iter()
            .enumerate()
            .find(|(_, t)| pd_12m <= t.max_pd)
    }

    pub fn apr_for(&self, pd_12m: f64) -> f64 {
        let rule = &self.policy.apr;
        (rule.base_apr + pd_12m * 100.0).clamp(rule.base_apr, rule.max_apr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shipped_policies_validate() {
        JurisdictionPolicy::us().validate().unwrap();
        JurisdictionPolicy::uk().validate().unwrap();
    }

    #[test]
    fn unordered_tiers_are_rejected() {
        let mut policy = JurisdictionPolicy::us();
        policy.tiers.swap(0, 1);
        assert!(matches!(
            policy.validate(),
            Err(EngineError::PolicyConfiguration(_))
        ));
    }

    #[test]
    fn riskier_tier_with_larger_limit_is_rejected() {
        let mut policy = JurisdictionPolicy::us();
        policy.tiers[2].credit_limit = 5000.0;
        assert!(policy.validate().is_err());
    }

    #[test]
    fn apr_is_clamped_to_policy_bounds() {
        let policy = JurisdictionPolicy::us();
        let engine = PolicyEngine::new(&policy);
        assert!((engine.apr_for(0.055) - 17.5).abs() < 1e-9);
        assert_eq!(engine.apr_for(0.0), 12.0);
        assert_eq!(engine.apr_for(0.30), 35.99);
    }

    #[test]
    fn tier_boundaries_are_inclusive() {
        let policy = JurisdictionPolicy::us();
        let engine = PolicyEngine::new(&policy);
        assert_eq!(engine.tier_for(0.03).map(|(i, _)| i), Some(0));
        assert_eq!(engine.tier_for(0.0301).map(|(i, _)| i), Some(1));
        assert_eq!(engine.tier_for(0.12).map(|(_, t)| t.credit_limit), Some(800.0));
        assert!(engine.tier_for(0.1201).is_none());
    }
}
