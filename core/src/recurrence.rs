//! Recurring payment detection.
//!
//! Recurrence detection is a heuristic over irregular merchant strings.
//! It sits behind RecurrenceDetector so stricter or looser matchers can
//! be swapped in without touching the scoring pipeline.

use crate::{
    config::{ClassificationConfig, RecurrenceConfig},
    transaction::{Transaction, TransactionType},
    types::Amount,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The contract every recurrence strategy must fulfill.
pub trait RecurrenceDetector: Send + Sync {
    /// Unique stable name for this strategy, used in logs.
    fn name(&self) -> &'static str;

    /// Detect recurring debit series in a time-ordered window.
    /// Must be deterministic: same input, same series in the same order.
    fn detect(&self, transactions: &[Transaction]) -> Vec<RecurringSeries>;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringPayment {
    pub transaction_id: String,
    pub timestamp:      DateTime<Utc>,
    /// Absolute debit amount.
    pub amount:         Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RecurringSeries {
    pub counterparty: String,
    /// Ordered by timestamp. The first payment anchors the cadence.
    pub payments:     Vec<RecurringPayment>,
    pub cadence_days: f64,
}

impl RecurringSeries {
    /// Median payment amount, taken as the series' monthly obligation.
    pub fn typical_amount(&self) -> Amount {
        let amounts: Vec<f64> = self.payments.iter().map(|p| p.amount).collect();
        median(&amounts)
    }

    /// Returns (on_time, evaluated) for every payment after the anchor.
    ///
    /// Due dates sit at whole multiples of the cadence from the anchor;
    /// each payment is compared against its nearest due date.
    pub fn on_time_counts(&self, tolerance_days: i64) -> (usize, usize) {
        let Some(anchor) = self.payments.first() else {
            return (0, 0);
        };
        if self.cadence_days <= 0.0 {
            return (0, 0);
        }
        let mut on_time = 0;
        let mut evaluated = 0;
        for payment in self.payments.iter().skip(1) {
            let elapsed = (payment.timestamp - anchor.timestamp).num_seconds() as f64 / 86_400.0;
            let cycles = (elapsed / self.cadence_days).round().max(1.0);
            let due = cycles * self.cadence_days;
            evaluated += 1;
            if (elapsed - due).abs() <= tolerance_days as f64 {
                on_time += 1;
            }
        }
        (on_time, evaluated)
    }
}

/// Lower-cases and strips digits and punctuation so that
/// "NETFLIX.COM 8821" and "Netflix.com 9930" group together.
pub fn normalize_counterparty(raw: &str) -> String {
    raw.chars()
        .map(|c| if c.is_alphabetic() { c.to_ascii_lowercase() } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn is_payment_candidate(t: &Transaction) -> bool {
    t.is_debit()
        && matches!(t.transaction_type, TransactionType::Expense | TransactionType::Transfer)
}

fn group_by_counterparty<'a, F>(
    transactions: &'a [Transaction],
    mut keep: F,
) -> BTreeMap<String, Vec<&'a Transaction>>
where
    F: FnMut(&Transaction) -> bool,
{
    let mut groups: BTreeMap<String, Vec<&Transaction>> = BTreeMap::new();
    for t in transactions.iter().filter(|t| is_payment_candidate(t) && keep(*t)) {
        let Some(raw) = t.merchant_or_counterparty.as_deref() else {
            continue;
        };
        let key = normalize_counterparty(raw);
        if key.is_empty() {
            continue;
        }
        groups.entry(key).or_default().push(t);
    }
    groups
}

fn gaps_in_days(payments: &[&Transaction]) -> Vec<i64> {
    payments
        .windows(2)
        .map(|w| (w[1].date() - w[0].date()).num_days())
        .collect()
}

fn to_series(counterparty: &str, payments: &[&Transaction], cadence_days: f64) -> RecurringSeries {
    RecurringSeries {
        counterparty: counterparty.to_string(),
        payments: payments
            .iter()
            .map(|t| RecurringPayment {
                transaction_id: t.id.clone(),
                timestamp:      t.timestamp,
                amount:         t.signed_amount.abs(),
            })
            .collect(),
        cadence_days,
    }
}

// ── Cadence detector (default) ─────────────────────────────────────

/// Same counterparty, similar amount, at least two occurrences with a
/// consecutive gap inside the monthly cadence window.
pub struct CadenceDetector {
    config: RecurrenceConfig,
}

impl CadenceDetector {
    pub fn new(config: RecurrenceConfig) -> Self {
        Self { config }
    }

    fn cluster_by_amount<'a>(&self, payments: &[&'a Transaction]) -> Vec<Vec<&'a Transaction>> {
        let mut clusters: Vec<(f64, Vec<&Transaction>)> = Vec::new();
        for &t in payments {
            let amount = t.signed_amount.abs();
            let tolerance = self.config.amount_tolerance;
            match clusters
                .iter_mut()
                .find(|(reference, _)| (amount - *reference).abs() <= tolerance * *reference)
            {
                Some((_, members)) => members.push(t),
                None => clusters.push((amount, vec![t])),
            }
        }
        clusters.into_iter().map(|(_, members)| members).collect()
    }
}

impl RecurrenceDetector for CadenceDetector {
    fn name(&self) -> &'static str {
        "cadence"
    }

    fn detect(&self, transactions: &[Transaction]) -> Vec<RecurringSeries> {
        let mut series = Vec::new();
        for (counterparty, payments) in group_by_counterparty(transactions, |_| true) {
            for cluster in self.cluster_by_amount(&payments) {
                if cluster.len() < self.config.min_occurrences {
                    continue;
                }
                let qualifying: Vec<f64> = gaps_in_days(&cluster)
                    .into_iter()
                    .filter(|g| (self.config.min_gap_days..=self.config.max_gap_days).contains(g))
                    .map(|g| g as f64)
                    .collect();
                if qualifying.is_empty() {
                    continue;
                }
                series.push(to_series(&counterparty, &cluster, median(&qualifying)));
            }
        }
        log::debug!("recurrence[{}]: {} series detected", self.name(), series.len());
        series
    }
}

// ── Keyword detector ───────────────────────────────────────────────

/// Looser matcher: any debit whose descriptor names a recurring
/// obligation (loan, rent, subscription ...) and that repeats at least
/// twice for the same counterparty. No amount similarity required.
pub struct KeywordDetector {
    keywords: Vec<String>,
    config:   RecurrenceConfig,
}

impl KeywordDetector {
    pub fn new(classification: &ClassificationConfig, config: RecurrenceConfig) -> Self {
        Self {
            keywords: classification.recurring_keywords.clone(),
            config,
        }
    }
}

impl RecurrenceDetector for KeywordDetector {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn detect(&self, transactions: &[Transaction]) -> Vec<RecurringSeries> {
        let keywords = &self.keywords;
        let groups = group_by_counterparty(transactions, |t| t.descriptor().contains_any(keywords));
        let mut series = Vec::new();
        for (counterparty, payments) in groups {
            if payments.len() < self.config.min_occurrences.max(2) {
                continue;
            }
            let gaps: Vec<f64> = gaps_in_days(&payments).into_iter().map(|g| g as f64).collect();
            let cadence = median(&gaps).clamp(
                self.config.min_gap_days as f64,
                self.config.max_gap_days as f64,
            );
            series.push(to_series(&counterparty, &payments, cadence));
        }
        log::debug!("recurrence[{}]: {} series detected", self.name(), series.len());
        series
    }
}

pub(crate) fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}
