//! Synthetic bank histories for demos and tests.
//!
//! Each profile produces a 90-day feed ending at `as_of` that exercises
//! a different path through the pipeline:
//!   steady    salaried, punctual, comfortable buffer
//!   stretched irregular gig income, a late loan, overdraft fees
//!   thin      only five days of history
//!
//! Same (profile, seed, as_of), same feed, bit for bit.

use crate::{
    applicant::{ApplicantFacts, EmploymentStatus},
    rng::{SeededRng, Stream},
    transaction::{RawTransaction, TransactionType},
    types::Amount,
};
use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub const HISTORY_DAYS: i64 = 90;
const THIN_DAYS: i64 = 5;
const ACCOUNT_ID: &str = "acct-001";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HistoryProfile {
    Steady,
    Stretched,
    Thin,
}

impl HistoryProfile {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Steady    => "steady",
            Self::Stretched => "stretched",
            Self::Thin      => "thin",
        }
    }

    /// Declared facts that go with the profile's history.
    pub fn facts(&self, jurisdiction: &str) -> ApplicantFacts {
        let (employment_status, monthly_income, tenure_months) = match self {
            Self::Steady    => (EmploymentStatus::FullTime, 3600.0, 30),
            Self::Stretched => (EmploymentStatus::SelfEmployed, 2100.0, 4),
            Self::Thin      => (EmploymentStatus::PartTime, 1800.0, 8),
        };
        ApplicantFacts {
            employment_status,
            monthly_income,
            tenure_months,
            jurisdiction: jurisdiction.to_string(),
        }
    }
}

impl FromStr for HistoryProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "steady"    => Ok(Self::Steady),
            "stretched" => Ok(Self::Stretched),
            "thin"      => Ok(Self::Thin),
            other       => Err(format!("unknown profile '{other}' (steady|stretched|thin)")),
        }
    }
}

struct Feed {
    prefix: &'static str,
    seq:    u32,
    out:    Vec<RawTransaction>,
}

impl Feed {
    fn push(
        &mut self,
        at: DateTime<Utc>,
        amount: Amount,
        transaction_type: TransactionType,
        counterparty: Option<&str>,
        category: &str,
    ) {
        self.seq += 1;
        let mut txn = RawTransaction::new(
            format!("{}-{:05}", self.prefix, self.seq),
            ACCOUNT_ID,
            at,
            amount,
            transaction_type,
        )
        .with_category(category);
        if let Some(name) = counterparty {
            txn = txn.with_counterparty(name);
        }
        self.out.push(txn);
    }
}

pub fn generate(profile: HistoryProfile, seed: u64, as_of: DateTime<Utc>) -> Vec<RawTransaction> {
    let days = match profile {
        HistoryProfile::Thin => THIN_DAYS,
        _ => HISTORY_DAYS,
    };
    let mut feed = Feed {
        prefix: profile.name(),
        seq:    0,
        out:    Vec::new(),
    };
    let mut income = Stream::Income.rng(seed);
    let mut essential = Stream::Essential.rng(seed);
    let mut discretionary = Stream::Discretionary.rng(seed);
    let mut obligations = Stream::Obligations.rng(seed);
    let mut incidents = Stream::Incidents.rng(seed);

    let mut late_loan_day: Option<u32> = None;

    for offset in (0..days).rev() {
        let at = as_of - Duration::days(offset);
        let dom = at.day();

        match profile {
            HistoryProfile::Steady => steady_day(
                &mut feed,
                at,
                dom,
                &mut income,
                &mut essential,
                &mut discretionary,
            ),
            HistoryProfile::Stretched => {
                stretched_day(
                    &mut feed,
                    at,
                    dom,
                    &mut income,
                    &mut essential,
                    &mut discretionary,
                );
                if dom == 3 {
                    late_loan_day = Some(3 + obligations.next_u64_below(12) as u32);
                }
                if late_loan_day == Some(dom) {
                    feed.push(at, -350.0, TransactionType::Expense, Some("QuickCash Loan"), "loan payment");
                    late_loan_day = None;
                }
                if dom == 15 || incidents.chance(0.05) {
                    feed.push(at, -35.0, TransactionType::Expense, Some("Bank Fee"), "overdraft fee");
                }
            }
            HistoryProfile::Thin => {
                if offset == days - 1 {
                    feed.push(at, 900.0, TransactionType::Income, Some("Dinerco Payroll"), "payroll");
                }
                feed.push(
                    at,
                    -essential.uniform(20.0, 60.0).round(),
                    TransactionType::Expense,
                    Some("FreshMart"),
                    "groceries",
                );
            }
        }
    }

    log::debug!(
        "synth: profile={} seed={seed} generated {} transactions",
        profile.name(),
        feed.out.len()
    );
    feed.out
}

fn steady_day(
    feed: &mut Feed,
    at: DateTime<Utc>,
    dom: u32,
    income: &mut SeededRng,
    essential: &mut SeededRng,
    discretionary: &mut SeededRng,
) {
    if dom == 1 {
        let pay = income.jitter(3600.0, 0.02);
        feed.push(at, pay, TransactionType::Income, Some("Acme Corp Payroll"), "payroll");
    }
    if dom == 3 {
        feed.push(at, -1100.0, TransactionType::Expense, Some("Parkview Apartments"), "rent");
    }
    if dom == 10 {
        let bill = -essential.jitter(90.0, 0.04);
        feed.push(at, bill, TransactionType::Expense, Some("City Power & Light"), "utilities");
    }
    if at.weekday().num_days_from_monday() == 5 {
        let shop = -essential.jitter(85.0, 0.03);
        feed.push(at, shop, TransactionType::Expense, Some("FreshMart"), "groceries");
    }
    if discretionary.chance(0.5) {
        let spend = -discretionary.uniform(8.0, 40.0).round();
        feed.push(at, spend, TransactionType::Expense, None, "dining");
    }
}

fn stretched_day(
    feed: &mut Feed,
    at: DateTime<Utc>,
    dom: u32,
    income: &mut SeededRng,
    essential: &mut SeededRng,
    discretionary: &mut SeededRng,
) {
    if income.chance(0.08) {
        let payout = income.uniform(150.0, 600.0).round();
        feed.push(at, payout, TransactionType::Income, Some("Rideshare Payout"), "gig income");
    }
    if dom == 1 {
        feed.push(at, -1100.0, TransactionType::Expense, Some("Parkview Apartments"), "rent");
    }
    if at.weekday().num_days_from_monday() == 5 {
        let shop = -essential.jitter(110.0, 0.03);
        feed.push(at, shop, TransactionType::Expense, Some("FreshMart"), "groceries");
    }
    if discretionary.chance(0.7) {
        let spend = -discretionary.uniform(15.0, 70.0).round();
        feed.push(at, spend, TransactionType::Expense, None, "shopping");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn as_of() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 9, 30, 18, 0, 0).unwrap()
    }

    #[test]
    fn same_seed_same_feed() {
        let a = generate(HistoryProfile::Stretched, 11, as_of());
        let b = generate(HistoryProfile::Stretched, 11, as_of());
        assert_eq!(a, b);
    }

    #[test]
    fn thin_profile_spans_five_days() {
        let feed = generate(HistoryProfile::Thin, 1, as_of());
        let first = feed.first().and_then(|t| t.timestamp).unwrap();
        let last = feed.last().and_then(|t| t.timestamp).unwrap();
        assert_eq!((last.date_naive() - first.date_naive()).num_days() + 1, 5);
    }

    #[test]
    fn profile_names_parse() {
        assert_eq!("steady".parse::<HistoryProfile>(), Ok(HistoryProfile::Steady));
        assert!("lavish".parse::<HistoryProfile>().is_err());
    }
}
