//! Transaction normalizer: validates, deduplicates, windows and orders
//! one applicant's transaction feed.
//!
//! RULES:
//!   - Any malformed record fails the whole batch. No partial output.
//!   - Out-of-window records are dropped and counted, never fatal.
//!   - No wall clock: the window is anchored on as_of, which defaults
//!     to the latest transaction timestamp.

use crate::{
    config::WindowConfig,
    error::{EngineError, EngineResult},
    transaction::{RawTransaction, Transaction, DEFAULT_CURRENCY},
};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NormalizationReport {
    pub received:               usize,
    pub duplicates_removed:     usize,
    pub dropped_outside_window: usize,
    pub retained:               usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHistory {
    /// Deduplicated, ordered by (timestamp, id).
    pub transactions: Vec<Transaction>,
    pub window_start: Option<DateTime<Utc>>,
    pub window_end:   Option<DateTime<Utc>>,
    pub report:       NormalizationReport,
}

impl NormalizedHistory {
    /// Inclusive calendar days between the first and last retained
    /// transaction. Zero when nothing was retained.
    pub fn history_days(&self) -> i64 {
        match (self.transactions.first(), self.transactions.last()) {
            (Some(first), Some(last)) => (last.date() - first.date()).num_days() + 1,
            _ => 0,
        }
    }
}

pub struct TransactionNormalizer {
    lookback_days: i64,
}

impl TransactionNormalizer {
    pub fn new(window: &WindowConfig) -> Self {
        Self {
            lookback_days: window.lookback_days,
        }
    }

    pub fn normalize(
        &self,
        raw: &[RawTransaction],
        as_of: Option<DateTime<Utc>>,
    ) -> EngineResult<NormalizedHistory> {
        let mut validated = raw
            .iter()
            .enumerate()
            .map(|(index, r)| validate(index, r))
            .collect::<EngineResult<Vec<_>>>()?;

        validated.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then_with(|| a.id.cmp(&b.id)));

        let mut seen = HashSet::new();
        let before_dedup = validated.len();
        validated.retain(|t| seen.insert(t.id.clone()));
        let duplicates_removed = before_dedup - validated.len();

        let window_end = as_of.or_else(|| validated.last().map(|t| t.timestamp));
        let window_start = window_end.map(|end| end - Duration::days(self.lookback_days));

        let before_window = validated.len();
        if let (Some(start), Some(end)) = (window_start, window_end) {
            validated.retain(|t| t.timestamp >= start && t.timestamp <= end);
        }
        let dropped_outside_window = before_window - validated.len();

        let report = NormalizationReport {
            received: raw.len(),
            duplicates_removed,
            dropped_outside_window,
            retained: validated.len(),
        };

        if duplicates_removed > 0 || dropped_outside_window > 0 {
            log::debug!(
                "normalizer: received={} duplicates={} outside_window={} retained={}",
                report.received,
                report.duplicates_removed,
                report.dropped_outside_window,
                report.retained
            );
        }

        Ok(NormalizedHistory {
            transactions: validated,
            window_start,
            window_end,
            report,
        })
    }
}

fn validate(index: usize, raw: &RawTransaction) -> EngineResult<Transaction> {
    let field = |name: &str| format!("transactions[{index}].{name}");

    if raw.id.trim().is_empty() {
        return Err(EngineError::validation(field("id"), "missing"));
    }

    let account_id = match raw.account_id.as_deref().map(str::trim) {
        Some(a) if !a.is_empty() => a.to_string(),
        _ => return Err(EngineError::validation(field("account_id"), "missing")),
    };

    let timestamp = raw
        .timestamp
        .ok_or_else(|| EngineError::validation(field("timestamp"), "missing"))?;

    let signed_amount = raw
        .signed_amount
        .ok_or_else(|| EngineError::validation(field("signed_amount"), "missing"))?;
    if !signed_amount.is_finite() || signed_amount == 0.0 {
        return Err(EngineError::validation(
            field("signed_amount"),
            format!("must be a non-zero finite amount, got {signed_amount}"),
        ));
    }

    let currency = raw
        .currency
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .unwrap_or(DEFAULT_CURRENCY)
        .to_uppercase();

    Ok(Transaction {
        id: raw.id.clone(),
        account_id,
        timestamp,
        signed_amount,
        currency,
        merchant_or_counterparty: raw.merchant_or_counterparty.clone(),
        category_hint: raw.category_hint.clone(),
        transaction_type: raw.transaction_type,
    })
}
