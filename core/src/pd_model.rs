//! PD engine: explicit additive 12-month probability-of-default model.
//!
//! pd = base + Σ adjustment_f(feature_f), clamped to [floor, ceiling].
//!
//! RULES:
//!   - Every adjustment is a sorted bracket table, never an ad hoc
//!     conditional chain.
//!   - Tables are validated once when the model is built: an improving
//!     feature must never increase PD.
//!   - Every evaluation returns its own signed contribution. Nothing
//!     downstream re-derives a contribution by differencing.

use crate::{
    applicant::ApplicantFacts,
    cashflow::CashflowMetrics,
    config::{AdjustmentTable, AdjustmentTables, ModelConfig},
    error::{EngineError, EngineResult},
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    BufferDays,
    PaymentBurden,
    OnTimeRatio,
    NsfCount,
    IncomeStability,
    IncomeLevel,
    Tenure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    HigherIsBetter,
    LowerIsBetter,
}

impl Feature {
    /// Fixed evaluation order. Contributions are summed in this order.
    pub const ALL: [Feature; 7] = [
        Feature::BufferDays,
        Feature::PaymentBurden,
        Feature::OnTimeRatio,
        Feature::NsfCount,
        Feature::IncomeStability,
        Feature::IncomeLevel,
        Feature::Tenure,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::BufferDays      => "buffer_days",
            Self::PaymentBurden   => "payment_burden",
            Self::OnTimeRatio     => "on_time_ratio",
            Self::NsfCount        => "nsf_count",
            Self::IncomeStability => "income_stability",
            Self::IncomeLevel     => "income_level",
            Self::Tenure          => "tenure",
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            Self::BufferDays | Self::OnTimeRatio | Self::IncomeLevel | Self::Tenure => {
                Direction::HigherIsBetter
            }
            Self::PaymentBurden | Self::NsfCount | Self::IncomeStability => Direction::LowerIsBetter,
        }
    }
}

impl AdjustmentTables {
    pub fn table(&self, feature: Feature) -> &AdjustmentTable {
        match feature {
            Feature::BufferDays      => &self.buffer_days,
            Feature::PaymentBurden   => &self.payment_burden,
            Feature::OnTimeRatio     => &self.on_time_ratio,
            Feature::NsfCount        => &self.nsf_count,
            Feature::IncomeStability => &self.income_stability,
            Feature::IncomeLevel     => &self.income_level,
            Feature::Tenure          => &self.tenure,
        }
    }
}

impl AdjustmentTable {
    fn matches(direction: Direction, value: f64, bound: f64) -> bool {
        match direction {
            Direction::HigherIsBetter => value >= bound,
            Direction::LowerIsBetter  => value <= bound,
        }
    }

    /// Index of the matching bracket; brackets.len() means `otherwise`.
    pub fn bracket_index(&self, direction: Direction, value: f64) -> usize {
        self.brackets
            .iter()
            .position(|b| Self::matches(direction, value, b.bound))
            .unwrap_or(self.brackets.len())
    }

    pub fn adjustment(&self, direction: Direction, value: f64) -> f64 {
        self.brackets
            .get(self.bracket_index(direction, value))
            .map(|b| b.adjustment)
            .unwrap_or(self.otherwise)
    }

    /// The smallest change that lands the value in the next-better
    /// bracket: that bracket's bound. None when already in the best.
    pub fn next_better_target(&self, direction: Direction, value: f64) -> Option<f64> {
        let index = self.bracket_index(direction, value);
        if index == 0 {
            return None;
        }
        self.brackets.get(index - 1).map(|b| b.bound)
    }

    /// Adjustments ordered from best bracket to `otherwise`.
    pub fn adjustments_best_to_worst(&self) -> Vec<f64> {
        self.brackets
            .iter()
            .map(|b| b.adjustment)
            .chain(std::iter::once(self.otherwise))
            .collect()
    }

    /// Structural monotonicity check.
    pub fn validate(&self, feature: Feature) -> EngineResult<()> {
        let name = feature.name();
        let fail = |reason: String| EngineError::ModelConfiguration(format!("{name}: {reason}"));

        if self.brackets.is_empty() {
            return Err(fail("table has no brackets".into()));
        }
        if self
            .brackets
            .iter()
            .any(|b| !b.bound.is_finite() || !b.adjustment.is_finite())
            || !self.otherwise.is_finite()
        {
            return Err(fail("bounds and adjustments must be finite".into()));
        }
        for pair in self.brackets.windows(2) {
            let ordered = match feature.direction() {
                Direction::HigherIsBetter => pair[0].bound > pair[1].bound,
                Direction::LowerIsBetter  => pair[0].bound < pair[1].bound,
            };
            if !ordered {
                return Err(fail(format!(
                    "bounds {} and {} are not ordered from best to worst",
                    pair[0].bound, pair[1].bound
                )));
            }
        }
        let values = self.adjustments_best_to_worst();
        if let Some(pair) = values.windows(2).find(|p| p[1] < p[0]) {
            return Err(fail(format!(
                "adjustment decreases from {} to {} as the feature worsens",
                pair[0], pair[1]
            )));
        }
        if !values.windows(2).any(|p| p[1] > p[0]) {
            return Err(fail("table is flat; at least one strict step is required".into()));
        }
        Ok(())
    }
}

/// The seven model inputs, drawn from cashflow metrics and declared facts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct FeatureVector {
    pub buffer_days:    f64,
    pub payment_burden: f64,
    pub on_time_ratio:  f64,
    pub nsf_count:      f64,
    pub income_cv:      f64,
    pub monthly_income: f64,
    pub tenure_months:  f64,
}

impl FeatureVector {
    pub fn from_inputs(metrics: &CashflowMetrics, facts: &ApplicantFacts) -> Self {
        Self {
            buffer_days:    metrics.buffer_days,
            payment_burden: metrics.payment_burden,
            on_time_ratio:  metrics.on_time_ratio,
            nsf_count:      f64::from(metrics.nsf_count_90d),
            income_cv:      metrics.income_cv,
            monthly_income: facts.monthly_income,
            tenure_months:  f64::from(facts.tenure_months),
        }
    }

    pub fn get(&self, feature: Feature) -> f64 {
        match feature {
            Feature::BufferDays      => self.buffer_days,
            Feature::PaymentBurden   => self.payment_burden,
            Feature::OnTimeRatio     => self.on_time_ratio,
            Feature::NsfCount        => self.nsf_count,
            Feature::IncomeStability => self.income_cv,
            Feature::IncomeLevel     => self.monthly_income,
            Feature::Tenure          => self.tenure_months,
        }
    }

    /// Copy with exactly one feature replaced.
    pub fn with(&self, feature: Feature, value: f64) -> Self {
        let mut copy = *self;
        match feature {
            Feature::BufferDays      => copy.buffer_days = value,
            Feature::PaymentBurden   => copy.payment_burden = value,
            Feature::OnTimeRatio     => copy.on_time_ratio = value,
            Feature::NsfCount        => copy.nsf_count = value,
            Feature::IncomeStability => copy.income_cv = value,
            Feature::IncomeLevel     => copy.monthly_income = value,
            Feature::Tenure          => copy.tenure_months = value,
        }
        copy
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Contribution {
    pub feature:    Feature,
    pub value:      f64,
    pub adjustment: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PdScore {
    pub pd_12m:        f64,
    /// Base plus contributions before rounding and clamping.
    pub raw_pd:        f64,
    /// In Feature::ALL order.
    pub contributions: Vec<Contribution>,
}

impl PdScore {
    pub fn contribution(&self, feature: Feature) -> Option<&Contribution> {
        self.contributions.iter().find(|c| c.feature == feature)
    }
}

/// Loss figures derived once the policy has set a credit limit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskAssessment {
    pub pd_12m:        f64,
    pub raw_pd:        f64,
    pub lgd:           f64,
    pub expected_loss: f64,
}

impl RiskAssessment {
    pub fn new(score: &PdScore, lgd: f64, credit_limit: f64) -> Self {
        Self {
            pd_12m:        score.pd_12m,
            raw_pd:        score.raw_pd,
            lgd,
            expected_loss: score.pd_12m * lgd * credit_limit,
        }
    }
}

/// PD is carried at basis-point precision.
pub const PD_SCALE: f64 = 10_000.0;

/// Rounds a summed PD to the nearest basis point so that table sums
/// land exactly on tier boundaries instead of one ulp past them.
pub fn quantize_pd(pd: f64) -> f64 {
    (pd * PD_SCALE).round() / PD_SCALE
}

pub struct PdModel {
    config: ModelConfig,
}

impl PdModel {
    /// Validates every table. Call once at startup.
    pub fn new(config: ModelConfig) -> EngineResult<Self> {
        if !(0.0 < config.pd_floor && config.pd_floor < config.pd_ceiling && config.pd_ceiling < 1.0) {
            return Err(EngineError::ModelConfiguration(format!(
                "pd bounds must satisfy 0 < floor < ceiling < 1, got [{}, {}]",
                config.pd_floor, config.pd_ceiling
            )));
        }
        if !(0.0..=1.0).contains(&config.default_lgd) {
            return Err(EngineError::ModelConfiguration(format!(
                "default_lgd must be within [0, 1], got {}",
                config.default_lgd
            )));
        }
        for feature in Feature::ALL {
            config.adjustments.table(feature).validate(feature)?;
        }
        Ok(Self { config })
    }

    pub fn version(&self) -> &str {
        &self.config.model_version
    }

    pub fn default_lgd(&self) -> f64 {
        self.config.default_lgd
    }

    pub fn table(&self, feature: Feature) -> &AdjustmentTable {
        self.config.adjustments.table(feature)
    }

    pub fn adjustment(&self, feature: Feature, value: f64) -> f64 {
        self.table(feature).adjustment(feature.direction(), value)
    }

    pub fn score_features(&self, features: &FeatureVector) -> PdScore {
        let contributions: Vec<Contribution> = Feature::ALL
            .iter()
            .map(|&feature| {
                let value = features.get(feature);
                Contribution {
                    feature,
                    value,
                    adjustment: self.adjustment(feature, value),
                }
            })
            .collect();

        let raw_pd = contributions
            .iter()
            .fold(self.config.base_pd, |pd, c| pd + c.adjustment);
        let pd_12m = quantize_pd(raw_pd).clamp(self.config.pd_floor, self.config.pd_ceiling);

        PdScore {
            pd_12m,
            raw_pd,
            contributions,
        }
    }

    pub fn score(&self, metrics: &CashflowMetrics, facts: &ApplicantFacts) -> PdScore {
        self.score_features(&FeatureVector::from_inputs(metrics, facts))
    }
}
