//! Cashflow feature extractor: reduces a normalized transaction window
//! into the fixed set of financial-health metrics the PD model reads.
//!
//! This extractor:
//!   1. Sums income by calendar month (median + coefficient of variation)
//!   2. Splits expense debits into essential and discretionary spend
//!   3. Derives buffer days from net cashflow and median daily spend
//!   4. Measures recurring payment burden and punctuality
//!   5. Counts NSF / overdraft events
//!
//! RULE: metrics are always a fresh recomputation from the window.
//! No randomness and no clock reads; identical input, identical bits.

use crate::{
    config::{ClassificationConfig, RecurrenceConfig},
    error::{EngineError, EngineResult},
    normalizer::NormalizedHistory,
    recurrence::{median, RecurrenceDetector, RecurringSeries},
    transaction::{Transaction, TransactionType},
    types::Amount,
};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PAYMENT_BURDEN_CAP: f64 = 2.0;

/// Derived, read-only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CashflowMetrics {
    pub income_median:                 Amount,
    pub income_cv:                     f64,
    pub essential_spend_median:        Amount,
    pub discretionary_spend_median:    Amount,
    pub buffer_days:                   f64,
    pub payment_burden:                f64,
    pub on_time_ratio:                 f64,
    pub nsf_count_90d:                 u32,
    pub transaction_count:             usize,
    pub monthly_recurring_obligations: Amount,
    pub recurring_series_count:        usize,
    pub history_days:                  i64,
}

impl CashflowMetrics {
    /// Range checks for metrics supplied by a caller rather than
    /// extracted here. Every gate comparison is false for NaN.
    pub fn validate(&self) -> EngineResult<()> {
        let non_negative = [
            ("metrics.income_median", self.income_median),
            ("metrics.income_cv", self.income_cv),
            ("metrics.essential_spend_median", self.essential_spend_median),
            ("metrics.discretionary_spend_median", self.discretionary_spend_median),
            ("metrics.buffer_days", self.buffer_days),
            ("metrics.payment_burden", self.payment_burden),
            ("metrics.monthly_recurring_obligations", self.monthly_recurring_obligations),
        ];
        for (field, value) in non_negative {
            if !(value.is_finite() && value >= 0.0) {
                return Err(EngineError::validation(
                    field,
                    format!("must be finite and non-negative, got {value}"),
                ));
            }
        }
        if !(0.0..=1.0).contains(&self.on_time_ratio) {
            return Err(EngineError::validation(
                "metrics.on_time_ratio",
                format!("must be within [0, 1], got {}", self.on_time_ratio),
            ));
        }
        if self.history_days < 0 {
            return Err(EngineError::validation(
                "metrics.history_days",
                format!("must not be negative, got {}", self.history_days),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpendClass {
    Essential,
    Discretionary,
}

type MonthKey = (i32, u32);

fn month_key(date: NaiveDate) -> MonthKey {
    (date.year(), date.month())
}

pub struct CashflowExtractor<'a> {
    classification: &'a ClassificationConfig,
    recurrence:     &'a RecurrenceConfig,
    detector:       &'a dyn RecurrenceDetector,
}

impl<'a> CashflowExtractor<'a> {
    pub fn new(
        classification: &'a ClassificationConfig,
        recurrence: &'a RecurrenceConfig,
        detector: &'a dyn RecurrenceDetector,
    ) -> Self {
        Self {
            classification,
            recurrence,
            detector,
        }
    }

    pub fn extract(&self, history: &NormalizedHistory) -> CashflowMetrics {
        let txns = &history.transactions;
        let history_days = history.history_days();

        let (income_median, income_cv) = self.income_metrics(txns);
        let (essential_spend_median, discretionary_spend_median) = self.spend_medians(txns);
        let buffer_days = self.buffer_days(txns, history_days);

        let series = self.detector.detect(txns);
        let monthly_recurring_obligations: Amount =
            series.iter().map(RecurringSeries::typical_amount).sum();
        let payment_burden = payment_burden(monthly_recurring_obligations, income_median);
        let on_time_ratio = self.on_time_ratio(&series);
        let nsf_count_90d = self.nsf_count(txns);

        let metrics = CashflowMetrics {
            income_median,
            income_cv,
            essential_spend_median,
            discretionary_spend_median,
            buffer_days,
            payment_burden,
            on_time_ratio,
            nsf_count_90d,
            transaction_count: txns.len(),
            monthly_recurring_obligations,
            recurring_series_count: series.len(),
            history_days,
        };

        log::debug!(
            "cashflow: txns={} income_median={:.2} cv={:.3} buffer_days={:.1} burden={:.3} on_time={:.3} nsf={} detector={}",
            metrics.transaction_count,
            metrics.income_median,
            metrics.income_cv,
            metrics.buffer_days,
            metrics.payment_burden,
            metrics.on_time_ratio,
            metrics.nsf_count_90d,
            self.detector.name()
        );

        metrics
    }

    pub fn is_income(&self, t: &Transaction) -> bool {
        if !t.is_credit() {
            return false;
        }
        match t.transaction_type {
            TransactionType::Income   => true,
            TransactionType::Transfer => false,
            TransactionType::Expense  => t.descriptor().contains_any(&self.classification.income_keywords),
        }
    }

    /// Returns None for anything that is not expense spend.
    pub fn classify_spend(&self, t: &Transaction) -> Option<SpendClass> {
        if !t.is_debit() || t.transaction_type != TransactionType::Expense {
            return None;
        }
        if t.descriptor().contains_any(&self.classification.essential_keywords) {
            Some(SpendClass::Essential)
        } else {
            Some(SpendClass::Discretionary)
        }
    }

    /// Fee debits only. A credited refund of an NSF fee is not an event.
    pub fn is_nsf_event(&self, t: &Transaction) -> bool {
        t.is_debit() && t.descriptor().contains_any(&self.classification.nsf_keywords)
    }

    fn income_metrics(&self, txns: &[Transaction]) -> (Amount, f64) {
        let mut monthly: BTreeMap<MonthKey, Amount> = BTreeMap::new();
        for t in txns.iter().filter(|t| self.is_income(t)) {
            *monthly.entry(month_key(t.date())).or_default() += t.signed_amount;
        }
        let sums: Vec<f64> = monthly.into_values().collect();
        let income_median = median(&sums);

        if sums.len() < 2 {
            return (income_median, 1.0);
        }
        let mean = sums.iter().sum::<f64>() / sums.len() as f64;
        if mean <= 0.0 {
            return (income_median, 1.0);
        }
        let variance = sums.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / sums.len() as f64;
        (income_median, variance.sqrt() / mean)
    }

    fn spend_medians(&self, txns: &[Transaction]) -> (Amount, Amount) {
        let mut essential: BTreeMap<MonthKey, Amount> = BTreeMap::new();
        let mut discretionary: BTreeMap<MonthKey, Amount> = BTreeMap::new();
        for t in txns {
            let bucket = match self.classify_spend(t) {
                Some(SpendClass::Essential)     => &mut essential,
                Some(SpendClass::Discretionary) => &mut discretionary,
                None => continue,
            };
            *bucket.entry(month_key(t.date())).or_default() += t.signed_amount.abs();
        }
        let essential: Vec<f64> = essential.into_values().collect();
        let discretionary: Vec<f64> = discretionary.into_values().collect();
        (median(&essential), median(&discretionary))
    }

    /// Net cashflow over the window divided by the median spend of
    /// days that carried spend. Floored at zero, uncapped above.
    fn buffer_days(&self, txns: &[Transaction], history_days: i64) -> f64 {
        let net: Amount = txns.iter().map(|t| t.signed_amount).sum();

        let mut daily: BTreeMap<NaiveDate, Amount> = BTreeMap::new();
        for t in txns.iter().filter(|t| self.classify_spend(t).is_some()) {
            *daily.entry(t.date()).or_default() += t.signed_amount.abs();
        }
        let spend_days: Vec<f64> = daily.into_values().collect();
        let median_daily = median(&spend_days);

        if median_daily <= 0.0 {
            return if net > 0.0 { history_days as f64 } else { 0.0 };
        }
        (net / median_daily).max(0.0)
    }

    fn on_time_ratio(&self, series: &[RecurringSeries]) -> f64 {
        let (on_time, evaluated) = series
            .iter()
            .map(|s| s.on_time_counts(self.recurrence.due_tolerance_days))
            .fold((0, 0), |(a, b), (c, d)| (a + c, b + d));
        if evaluated == 0 {
            1.0
        } else {
            on_time as f64 / evaluated as f64
        }
    }

    fn nsf_count(&self, txns: &[Transaction]) -> u32 {
        txns.iter().filter(|t| self.is_nsf_event(t)).count() as u32
    }
}

fn payment_burden(obligations: Amount, income_median: Amount) -> f64 {
    if obligations <= 0.0 {
        return 0.0;
    }
    if income_median <= 0.0 {
        return PAYMENT_BURDEN_CAP;
    }
    (obligations / income_median).min(PAYMENT_BURDEN_CAP)
}
