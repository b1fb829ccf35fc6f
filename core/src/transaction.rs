//! Bank transactions as received from the data portal and after normalization.

use crate::types::Amount;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CURRENCY: &str = "USD";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Income,
    Expense,
    Transfer,
}

/// A transaction exactly as the collaborator feed delivered it.
/// Required fields are optional here so that missing values can be
/// reported as validation errors instead of deserialization failures.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RawTransaction {
    pub id: String,
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub signed_amount: Option<Amount>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub merchant_or_counterparty: Option<String>,
    #[serde(default)]
    pub category_hint: Option<String>,
    pub transaction_type: TransactionType,
}

impl RawTransaction {
    pub fn new(
        id: impl Into<String>,
        account_id: impl Into<String>,
        timestamp: DateTime<Utc>,
        signed_amount: Amount,
        transaction_type: TransactionType,
    ) -> Self {
        Self {
            id:                       id.into(),
            account_id:               Some(account_id.into()),
            timestamp:                Some(timestamp),
            signed_amount:            Some(signed_amount),
            currency:                 None,
            merchant_or_counterparty: None,
            category_hint:            None,
            transaction_type,
        }
    }

    pub fn with_counterparty(mut self, counterparty: impl Into<String>) -> Self {
        self.merchant_or_counterparty = Some(counterparty.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category_hint = Some(category.into());
        self
    }

    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = Some(currency.into());
        self
    }
}

/// A validated transaction. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    pub id:                       String,
    pub account_id:               String,
    pub timestamp:                DateTime<Utc>,
    pub signed_amount:            Amount,
    pub currency:                 String,
    pub merchant_or_counterparty: Option<String>,
    pub category_hint:            Option<String>,
    pub transaction_type:         TransactionType,
}

impl Transaction {
    pub fn is_debit(&self) -> bool {
        self.signed_amount < 0.0
    }

    pub fn is_credit(&self) -> bool {
        self.signed_amount > 0.0
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Lower-cased word tokens of the category hint and counterparty.
    pub fn descriptor(&self) -> Descriptor {
        let mut text = String::new();
        if let Some(category) = &self.category_hint {
            text.push_str(category);
            text.push(' ');
        }
        if let Some(counterparty) = &self.merchant_or_counterparty {
            text.push_str(counterparty);
        }
        Descriptor::from_text(&text)
    }
}

/// Tokenized free text used for keyword lookups.
///
/// Matching is on whole tokens so that "nsf" does not fire inside
/// "transfer". Multi-word terms match consecutive tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    tokens: Vec<String>,
}

impl Descriptor {
    pub fn from_text(text: &str) -> Self {
        let tokens = text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        Self { tokens }
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    pub fn contains_term(&self, term: &str) -> bool {
        let parts: Vec<String> = term
            .split_whitespace()
            .map(|p| p.to_lowercase())
            .collect();
        if parts.is_empty() || parts.len() > self.tokens.len() {
            return false;
        }
        self.tokens
            .windows(parts.len())
            .any(|window| window.iter().zip(&parts).all(|(a, b)| a == b))
    }

    pub fn contains_any<S: AsRef<str>>(&self, terms: &[S]) -> bool {
        terms.iter().any(|t| self.contains_term(t.as_ref()))
    }
}
