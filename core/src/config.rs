use crate::{
    error::{EngineError, EngineResult},
    types::{Amount, JurisdictionCode},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ── Window ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WindowConfig {
    /// Transactions older than this (relative to as_of) are dropped.
    #[serde(default = "default_lookback_days")]
    pub lookback_days: i64,
    /// Below this many calendar days of history the engine refuses to score.
    #[serde(default = "default_min_history_days")]
    pub min_history_days: i64,
}

fn default_lookback_days() -> i64 {
    90
}

fn default_min_history_days() -> i64 {
    14
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            lookback_days:    default_lookback_days(),
            min_history_days: default_min_history_days(),
        }
    }
}

// ── Keyword classification ─────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassificationConfig {
    pub essential_keywords: Vec<String>,
    pub income_keywords: Vec<String>,
    pub nsf_keywords: Vec<String>,
    pub recurring_keywords: Vec<String>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        let words = |list: &[&str]| list.iter().map(|s| s.to_string()).collect();
        Self {
            essential_keywords: words(&[
                "grocery", "groceries", "supermarket", "utility", "utilities",
                "electric", "electricity", "water", "gas", "fuel", "rent",
                "mortgage", "insurance", "pharmacy", "medical", "phone", "internet",
            ]),
            income_keywords: words(&["payroll", "salary", "wage", "wages", "direct deposit"]),
            nsf_keywords: words(&[
                "nsf", "overdraft", "insufficient funds", "returned payment", "returned item",
            ]),
            recurring_keywords: words(&[
                "loan", "mortgage", "rent", "subscription", "auto pay", "payment",
            ]),
        }
    }
}

// ── Recurrence detection ───────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurrenceConfig {
    pub min_occurrences: usize,
    pub min_gap_days: i64,
    pub max_gap_days: i64,
    /// Relative amount tolerance when clustering payments to one payee.
    pub amount_tolerance: f64,
    /// A payment within this many days of its due date counts as on time.
    pub due_tolerance_days: i64,
}

impl Default for RecurrenceConfig {
    fn default() -> Self {
        Self {
            min_occurrences:    2,
            min_gap_days:       28,
            max_gap_days:       31,
            amount_tolerance:   0.10,
            due_tolerance_days: 3,
        }
    }
}

// ── PD model ───────────────────────────────────────────────────────

/// One bracket of an adjustment table. For a higher-is-better feature
/// the bracket applies when value >= bound; for lower-is-better when
/// value <= bound.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Bracket {
    pub bound: f64,
    pub adjustment: f64,
}

/// Brackets ordered from best to worst, plus the adjustment applied
/// when no bracket matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentTable {
    pub brackets: Vec<Bracket>,
    pub otherwise: f64,
}

impl AdjustmentTable {
    pub fn new(brackets: &[(f64, f64)], otherwise: f64) -> Self {
        Self {
            brackets: brackets
                .iter()
                .map(|&(bound, adjustment)| Bracket { bound, adjustment })
                .collect(),
            otherwise,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentTables {
    pub buffer_days: AdjustmentTable,
    pub payment_burden: AdjustmentTable,
    pub on_time_ratio: AdjustmentTable,
    pub nsf_count: AdjustmentTable,
    pub income_stability: AdjustmentTable,
    pub income_level: AdjustmentTable,
    pub tenure: AdjustmentTable,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelConfig {
    pub model_version: String,
    pub base_pd: f64,
    pub pd_floor: f64,
    pub pd_ceiling: f64,
    /// Loss given default unless the jurisdiction overrides it.
    pub default_lgd: f64,
    pub adjustments: AdjustmentTables,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            model_version: "cashflow-pd-1.0.0".into(),
            base_pd:       0.08,
            pd_floor:      0.01,
            pd_ceiling:    0.30,
            default_lgd:   0.45,
            adjustments: AdjustmentTables {
                buffer_days: AdjustmentTable::new(
                    &[(30.0, -0.025), (20.0, 0.0), (15.0, 0.010), (10.0, 0.015)],
                    0.025,
                ),
                payment_burden: AdjustmentTable::new(
                    &[(0.25, -0.020), (0.35, 0.0), (0.45, 0.020)],
                    0.030,
                ),
                on_time_ratio: AdjustmentTable::new(
                    &[(0.95, -0.015), (0.85, -0.005), (0.75, 0.010)],
                    0.025,
                ),
                nsf_count: AdjustmentTable::new(&[(0.0, -0.010), (1.0, 0.015)], 0.030),
                income_stability: AdjustmentTable::new(
                    &[(0.2, -0.010), (0.4, 0.0), (0.6, 0.015)],
                    0.025,
                ),
                income_level: AdjustmentTable::new(
                    &[(4000.0, -0.010), (2500.0, 0.005), (1500.0, 0.010)],
                    0.015,
                ),
                tenure: AdjustmentTable::new(
                    &[(24.0, -0.010), (12.0, 0.005), (6.0, 0.010)],
                    0.015,
                ),
            },
        }
    }
}

// ── Jurisdiction policy ────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HardGates {
    pub min_buffer_days: f64,
    pub max_payment_burden: f64,
    pub min_on_time_ratio: f64,
    pub max_nsf_count: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreditTier {
    pub name: String,
    pub max_pd: f64,
    pub credit_limit: Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AprRule {
    #[serde(default = "default_base_apr")]
    pub base_apr: f64,
    #[serde(default = "default_max_apr")]
    pub max_apr: f64,
}

fn default_base_apr() -> f64 {
    12.0
}

fn default_max_apr() -> f64 {
    35.99
}

impl Default for AprRule {
    fn default() -> Self {
        Self {
            base_apr: default_base_apr(),
            max_apr:  default_max_apr(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JurisdictionPolicy {
    pub code: JurisdictionCode,
    pub policy_version: String,
    pub currency: String,
    /// Overrides the model's default LGD when present.
    #[serde(default)]
    pub lgd: Option<f64>,
    pub gates: HardGates,
    /// First-match table, ordered by increasing max_pd.
    pub tiers: Vec<CreditTier>,
    #[serde(default)]
    pub apr: AprRule,
}

fn tier(name: &str, max_pd: f64, credit_limit: Amount) -> CreditTier {
    CreditTier {
        name: name.into(),
        max_pd,
        credit_limit,
    }
}

impl JurisdictionPolicy {
    pub fn us() -> Self {
        Self {
            code:           "US".into(),
            policy_version: "2025-10-01".into(),
            currency:       "USD".into(),
            lgd:            None,
            gates: HardGates {
                min_buffer_days:    15.0,
                max_payment_burden: 0.40,
                min_on_time_ratio:  0.85,
                max_nsf_count:      2,
            },
            tiers: vec![
                tier("prime", 0.03, 3000.0),
                tier("near-prime", 0.06, 2000.0),
                tier("starter", 0.09, 1200.0),
                tier("high-risk", 0.12, 800.0),
            ],
            apr: AprRule::default(),
        }
    }

    pub fn uk() -> Self {
        Self {
            code:           "UK".into(),
            policy_version: "2025-10-01".into(),
            currency:       "GBP".into(),
            lgd:            Some(0.50),
            gates: HardGates {
                min_buffer_days:    20.0,
                max_payment_burden: 0.35,
                min_on_time_ratio:  0.90,
                max_nsf_count:      1,
            },
            tiers: vec![
                tier("prime", 0.025, 3000.0),
                tier("near-prime", 0.05, 2000.0),
                tier("starter", 0.075, 1200.0),
                tier("high-risk", 0.10, 800.0),
            ],
            apr: AprRule::default(),
        }
    }
}

/// Immutable set of jurisdiction policies, keyed by code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PolicyTable {
    policies: BTreeMap<JurisdictionCode, JurisdictionPolicy>,
}

impl PolicyTable {
    pub fn from_policies(policies: Vec<JurisdictionPolicy>) -> EngineResult<Self> {
        let mut map = BTreeMap::new();
        for policy in policies {
            let code = policy.code.clone();
            if map.insert(code.clone(), policy).is_some() {
                return Err(EngineError::PolicyConfiguration(format!(
                    "jurisdiction '{code}' defined more than once"
                )));
            }
        }
        Ok(Self { policies: map })
    }

    /// Strict lookup. There is deliberately no default jurisdiction.
    pub fn resolve(&self, code: &str) -> EngineResult<&JurisdictionPolicy> {
        self.policies.get(code).ok_or_else(|| {
            EngineError::PolicyConfiguration(format!(
                "no policy configured for jurisdiction '{code}'"
            ))
        })
    }

    pub fn codes(&self) -> impl Iterator<Item = &str> {
        self.policies.keys().map(|k| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &JurisdictionPolicy> {
        self.policies.values()
    }
}

#[derive(Debug, Clone, Deserialize)]
struct JurisdictionsFile {
    jurisdictions: Vec<JurisdictionPolicy>,
}

#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    #[serde(default)]
    window: WindowConfig,
    #[serde(default)]
    classification: ClassificationConfig,
    #[serde(default)]
    recurrence: RecurrenceConfig,
}

// ── Engine config ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub window: WindowConfig,
    pub classification: ClassificationConfig,
    pub recurrence: RecurrenceConfig,
    pub model: ModelConfig,
    pub policies: PolicyTable,
}

impl EngineConfig {
    /// Load from the data/ directory.
    /// In tests, use EngineConfig::builtin().
    pub fn load(data_dir: &str) -> anyhow::Result<Self> {
        let engine_path = format!("{data_dir}/engine.json");
        let engine_content = std::fs::read_to_string(&engine_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {engine_path}: {e}"))?;
        let engine_file: EngineFile = serde_json::from_str(&engine_content)?;

        let model_path = format!("{data_dir}/model/pd_model.json");
        let model_content = std::fs::read_to_string(&model_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {model_path}: {e}"))?;
        let model: ModelConfig = serde_json::from_str(&model_content)?;

        let policy_path = format!("{data_dir}/policy/jurisdictions.json");
        let policy_content = std::fs::read_to_string(&policy_path)
            .map_err(|e| anyhow::anyhow!("Cannot read {policy_path}: {e}"))?;
        let policy_file: JurisdictionsFile = serde_json::from_str(&policy_content)?;
        let policies = PolicyTable::from_policies(policy_file.jurisdictions)
            .map_err(|e| anyhow::anyhow!("{policy_path}: {e}"))?;

        log::info!(
            "config: loaded {} jurisdiction(s) and model {} from {data_dir}",
            policies.iter().count(),
            model.model_version
        );

        Ok(Self {
            window: engine_file.window,
            classification: engine_file.classification,
            recurrence: engine_file.recurrence,
            model,
            policies,
        })
    }

    /// Config with hardcoded defaults for use in tests and embedding.
    /// Mirrors the files shipped under data/.
    pub fn builtin() -> Self {
        Self {
            window:         WindowConfig::default(),
            classification: ClassificationConfig::default(),
            recurrence:     RecurrenceConfig::default(),
            model:          ModelConfig::default(),
            policies: PolicyTable {
                policies: [JurisdictionPolicy::us(), JurisdictionPolicy::uk()]
                    .into_iter()
                    .map(|p| (p.code.clone(), p))
                    .collect(),
            },
        }
    }
}
