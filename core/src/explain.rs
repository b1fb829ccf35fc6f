//! Explainability engine: ranked reasons and single-feature
//! counterfactuals, both read straight off the PD model.
//!
//! RULES:
//!   - Reasons come from the PdScore contributions verbatim. No
//!     post-hoc differencing.
//!   - A counterfactual changes exactly one feature and is re-scored by
//!     the same model. Joint effects are not modeled.

use crate::pd_model::{Direction, Feature, FeatureVector, PdModel, PdScore};
use serde::{Deserialize, Serialize};

pub const MAX_REASONS: usize = 5;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn from_impact(impact: f64) -> Self {
        let magnitude = impact.abs();
        if magnitude >= 0.02 {
            Self::High
        } else if magnitude >= 0.01 {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReasonCode {
    FraudGateFailed,
    LowCashBuffer,
    StrongCashBuffer,
    HighPaymentBurden,
    LowPaymentBurden,
    LatePaymentHistory,
    StrongPaymentHistory,
    NsfEventsDetected,
    NoNsfEvents,
    IrregularIncome,
    StableIncome,
    LowIncome,
    HighIncome,
    ShortEmploymentTenure,
    EstablishedEmploymentTenure,
}

impl ReasonCode {
    /// Code for a contribution. `raises_pd` selects the risk-side code.
    fn for_feature(feature: Feature, raises_pd: bool) -> Self {
        use ReasonCode::*;
        match (feature, raises_pd) {
            (Feature::BufferDays, true)       => LowCashBuffer,
            (Feature::BufferDays, false)      => StrongCashBuffer,
            (Feature::PaymentBurden, true)    => HighPaymentBurden,
            (Feature::PaymentBurden, false)   => LowPaymentBurden,
            (Feature::OnTimeRatio, true)      => LatePaymentHistory,
            (Feature::OnTimeRatio, false)     => StrongPaymentHistory,
            (Feature::NsfCount, true)         => NsfEventsDetected,
            (Feature::NsfCount, false)        => NoNsfEvents,
            (Feature::IncomeStability, true)  => IrregularIncome,
            (Feature::IncomeStability, false) => StableIncome,
            (Feature::IncomeLevel, true)      => LowIncome,
            (Feature::IncomeLevel, false)     => HighIncome,
            (Feature::Tenure, true)           => ShortEmploymentTenure,
            (Feature::Tenure, false)          => EstablishedEmploymentTenure,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskReason {
    pub code:                ReasonCode,
    pub description:         String,
    /// Positive raises PD, negative lowers it.
    pub signed_impact_on_pd: f64,
    pub severity:            Severity,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feasibility {
    Easy,
    Moderate,
    Hard,
}

impl Feature {
    /// How realistic it is for an applicant to move this feature.
    pub fn feasibility(&self) -> Feasibility {
        match self {
            Self::BufferDays | Self::OnTimeRatio         => Feasibility::Easy,
            Self::NsfCount | Self::IncomeStability       => Feasibility::Moderate,
            Self::PaymentBurden | Self::IncomeLevel | Self::Tenure => Feasibility::Hard,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Counterfactual {
    pub feature:       Feature,
    pub action:        String,
    pub current_value: f64,
    pub target_value:  f64,
    /// Always negative for a surfaced counterfactual.
    pub pd_delta:      f64,
    pub feasibility:   Feasibility,
}

fn describe(feature: Feature, value: f64, raises_pd: bool) -> String {
    match (feature, raises_pd) {
        (Feature::BufferDays, true) => {
            format!("Savings cover only {value:.1} days of typical spending")
        }
        (Feature::BufferDays, false) => {
            format!("Savings cover {value:.1} days of typical spending")
        }
        (Feature::PaymentBurden, true) => {
            format!("Recurring payments take {:.0}% of monthly income", value * 100.0)
        }
        (Feature::PaymentBurden, false) => {
            format!("Recurring payments take a manageable {:.0}% of monthly income", value * 100.0)
        }
        (Feature::OnTimeRatio, true) => {
            format!("Only {:.0}% of recurring payments were made on time", value * 100.0)
        }
        (Feature::OnTimeRatio, false) => {
            format!("{:.0}% of recurring payments were made on time", value * 100.0)
        }
        (Feature::NsfCount, true) => {
            format!("{value:.0} NSF or overdraft event(s) in the last 90 days")
        }
        (Feature::NsfCount, false) => "No NSF or overdraft events in the last 90 days".into(),
        (Feature::IncomeStability, true) => {
            format!("Monthly income varies by {:.0}%", value * 100.0)
        }
        (Feature::IncomeStability, false) => {
            format!("Monthly income is stable (variation {:.0}%)", value * 100.0)
        }
        (Feature::IncomeLevel, true) => format!("Declared monthly income of {value:.0} is low"),
        (Feature::IncomeLevel, false) => format!("Declared monthly income of {value:.0}"),
        (Feature::Tenure, true) => format!("Only {value:.0} month(s) in current employment"),
        (Feature::Tenure, false) => format!("{value:.0} months in current employment"),
    }
}

fn action(feature: Feature, target: f64) -> String {
    match feature {
        Feature::BufferDays => format!(
            "Reduce discretionary spend to build savings covering {target:.0} days of spending"
        ),
        Feature::PaymentBurden => {
            format!("Lower recurring payments to {:.0}% of income", target * 100.0)
        }
        Feature::OnTimeRatio => {
            format!("Make at least {:.0}% of recurring payments on time", target * 100.0)
        }
        Feature::NsfCount => format!("Keep NSF or overdraft events to {target:.0} or fewer"),
        Feature::IncomeStability => {
            format!("Keep month-to-month income variation within {:.0}%", target * 100.0)
        }
        Feature::IncomeLevel => format!("Increase monthly income to {target:.0}"),
        Feature::Tenure => format!("Reach {target:.0} months in current employment"),
    }
}

pub struct ExplainabilityEngine<'m> {
    model: &'m PdModel,
}

impl<'m> ExplainabilityEngine<'m> {
    pub fn new(model: &'m PdModel) -> Self {
        Self { model }
    }

    /// Top contributions by |impact|, ties kept in feature order.
    pub fn reasons(&self, score: &PdScore) -> Vec<RiskReason> {
        let mut ranked: Vec<_> = score
            .contributions
            .iter()
            .filter(|c| c.adjustment != 0.0)
            .collect();
        ranked.sort_by(|a, b| b.adjustment.abs().total_cmp(&a.adjustment.abs()));

        ranked
            .into_iter()
            .take(MAX_REASONS)
            .map(|c| {
                let raises_pd = c.adjustment > 0.0;
                RiskReason {
                    code:                ReasonCode::for_feature(c.feature, raises_pd),
                    description:         describe(c.feature, c.value, raises_pd),
                    signed_impact_on_pd: c.adjustment,
                    severity:            Severity::from_impact(c.adjustment),
                }
            })
            .collect()
    }

    pub fn fraud_gate_reason(&self) -> RiskReason {
        RiskReason {
            code:                ReasonCode::FraudGateFailed,
            description:         "Identity verification did not pass".into(),
            signed_impact_on_pd: 0.0,
            severity:            Severity::High,
        }
    }

    /// One candidate per feature with a non-zero contribution and a
    /// better bracket to move into. Only PD-reducing candidates survive,
    /// best first.
    pub fn counterfactuals(&self, features: &FeatureVector, score: &PdScore) -> Vec<Counterfactual> {
        let mut out: Vec<Counterfactual> = Feature::ALL
            .iter()
            .filter_map(|&feature| {
                let contribution = score.contribution(feature)?;
                if contribution.adjustment == 0.0 {
                    return None;
                }
                let current = features.get(feature);
                let target = self
                    .model
                    .table(feature)
                    .next_better_target(feature.direction(), current)?;
                let rescored = self.model.score_features(&features.with(feature, target));
                let pd_delta = rescored.pd_12m - score.pd_12m;
                (pd_delta < 0.0).then(|| Counterfactual {
                    feature,
                    action: action(feature, target),
                    current_value: current,
                    target_value: target,
                    pd_delta,
                    feasibility: feature.feasibility(),
                })
            })
            .collect();
        out.sort_by(|a, b| a.pd_delta.total_cmp(&b.pd_delta));
        out
    }
}

/// True when the target value is an improvement over the current one
/// in the feature's own direction.
pub fn moves_in_improving_direction(cf: &Counterfactual) -> bool {
    match cf.feature.direction() {
        Direction::HigherIsBetter => cf.target_value > cf.current_value,
        Direction::LowerIsBetter  => cf.target_value < cf.current_value,
    }
}
