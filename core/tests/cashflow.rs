use chrono::{DateTime, Duration, TimeZone, Utc};
use underwriting_core::{
    cashflow::{CashflowExtractor, CashflowMetrics, SpendClass},
    config::{ClassificationConfig, RecurrenceConfig, WindowConfig},
    normalizer::{NormalizedHistory, TransactionNormalizer},
    recurrence::{CadenceDetector, KeywordDetector, RecurrenceDetector},
    transaction::{RawTransaction, TransactionType},
};

fn at(month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, month, day, 10, 0, 0).unwrap()
}

fn txn(
    id: &str,
    when: DateTime<Utc>,
    amount: f64,
    kind: TransactionType,
    counterparty: &str,
    category: &str,
) -> RawTransaction {
    RawTransaction::new(id, "acct-1", when, amount, kind)
        .with_counterparty(counterparty)
        .with_category(category)
}

fn payroll(id: &str, when: DateTime<Utc>, amount: f64) -> RawTransaction {
    txn(id, when, amount, TransactionType::Income, "Acme Corp", "payroll")
}

fn rent(id: &str, when: DateTime<Utc>) -> RawTransaction {
    txn(id, when, -1000.0, TransactionType::Expense, "Parkview Apartments", "rent")
}

fn history(raw: &[RawTransaction]) -> NormalizedHistory {
    TransactionNormalizer::new(&WindowConfig::default())
        .normalize(raw, None)
        .unwrap()
}

fn extract_with(detector: &dyn RecurrenceDetector, raw: &[RawTransaction]) -> CashflowMetrics {
    let classification = ClassificationConfig::default();
    let recurrence = RecurrenceConfig::default();
    CashflowExtractor::new(&classification, &recurrence, detector).extract(&history(raw))
}

fn extract(raw: &[RawTransaction]) -> CashflowMetrics {
    extract_with(&CadenceDetector::new(RecurrenceConfig::default()), raw)
}

fn salaried_with_rent(third_rent: DateTime<Utc>) -> Vec<RawTransaction> {
    vec![
        payroll("p1", at(6, 1), 3000.0),
        payroll("p2", at(7, 1), 3000.0),
        payroll("p3", at(8, 1), 3000.0),
        rent("r1", at(6, 3)),
        rent("r2", at(7, 3)),
        rent("r3", third_rent),
    ]
}

#[test]
fn monthly_rent_is_detected_as_recurring_and_on_time() {
    let m = extract(&salaried_with_rent(at(8, 2)));

    assert_eq!(m.recurring_series_count, 1);
    assert_eq!(m.monthly_recurring_obligations, 1000.0);
    assert_eq!(m.income_median, 3000.0);
    assert_eq!(m.income_cv, 0.0);
    assert!((m.payment_burden - 1000.0 / 3000.0).abs() < 1e-12);
    assert_eq!(m.on_time_ratio, 1.0);
}

#[test]
fn late_payment_lowers_on_time_ratio() {
    let m = extract(&salaried_with_rent(at(8, 12)));

    assert_eq!(m.recurring_series_count, 1);
    assert_eq!(m.on_time_ratio, 0.5);
}

#[test]
fn no_recurring_payments_means_perfect_punctuality_and_zero_burden() {
    let raw = vec![
        payroll("p1", at(6, 1), 2500.0),
        payroll("p2", at(7, 1), 2500.0),
        txn("g1", at(6, 5), -80.0, TransactionType::Expense, "FreshMart", "groceries"),
    ];

    let m = extract(&raw);

    assert_eq!(m.recurring_series_count, 0);
    assert_eq!(m.on_time_ratio, 1.0);
    assert_eq!(m.payment_burden, 0.0);
}

#[test]
fn dissimilar_amounts_to_one_payee_are_not_a_series() {
    let raw = vec![
        payroll("p1", at(6, 1), 3000.0),
        txn("s1", at(6, 10), -30.0, TransactionType::Expense, "Gym Co", "fitness"),
        txn("s2", at(7, 10), -80.0, TransactionType::Expense, "Gym Co", "fitness"),
        txn("s3", at(8, 10), -30.0, TransactionType::Expense, "Gym Co", "fitness"),
    ];

    let m = extract(&raw);

    // The two -30 payments are 61 days apart: outside the monthly window.
    assert_eq!(m.recurring_series_count, 0);
}

#[test]
fn weekly_purchases_are_not_monthly_obligations() {
    let raw: Vec<RawTransaction> = (0..8)
        .map(|w| {
            txn(
                &format!("g{w}"),
                at(6, 2) + Duration::days(w * 7),
                -60.0,
                TransactionType::Expense,
                "FreshMart",
                "groceries",
            )
        })
        .collect();

    assert_eq!(extract(&raw).recurring_series_count, 0);
}

#[test]
fn keyword_detector_accepts_irregular_loan_payments() {
    let raw = vec![
        payroll("p1", at(6, 1), 3000.0),
        payroll("p2", at(7, 1), 3000.0),
        txn("l1", at(6, 2), -300.0, TransactionType::Expense, "QuickCash", "loan payment"),
        txn("l2", at(7, 8), -300.0, TransactionType::Expense, "QuickCash", "loan payment"),
    ];

    let cadence = extract(&raw);
    let config = RecurrenceConfig::default();
    let keyword = extract_with(&KeywordDetector::new(&ClassificationConfig::default(), config), &raw);

    assert_eq!(cadence.recurring_series_count, 0);
    assert_eq!(keyword.recurring_series_count, 1);
    assert!((keyword.payment_burden - 0.1).abs() < 1e-12);
    // 36 days elapsed against a 31-day cadence: late.
    assert_eq!(keyword.on_time_ratio, 0.0);
}

#[test]
fn nsf_events_match_whole_keywords() {
    let raw = vec![
        payroll("p1", at(6, 1), 3000.0),
        txn("n1", at(6, 4), -35.0, TransactionType::Expense, "Bank", "Overdraft Fee"),
        txn("n2", at(6, 9), -25.0, TransactionType::Expense, "Bank", "NSF charge"),
        txn("t1", at(6, 12), -500.0, TransactionType::Transfer, "Savings", "internal transfer"),
        txn("n3", at(6, 20), -40.0, TransactionType::Expense, "Utility", "returned payment"),
    ];

    assert_eq!(extract(&raw).nsf_count_90d, 3);
}

#[test]
fn credited_nsf_fee_refund_is_not_an_nsf_event() {
    let raw = vec![
        payroll("p1", at(6, 1), 3000.0),
        txn("n1", at(6, 4), -35.0, TransactionType::Expense, "Bank", "NSF fee"),
        txn("f1", at(6, 6), 35.0, TransactionType::Transfer, "Bank", "NSF fee refund"),
    ];

    assert_eq!(extract(&raw).nsf_count_90d, 1);
}

#[test]
fn buffer_days_is_net_over_median_daily_spend() {
    let mut raw = vec![payroll("p1", at(6, 1), 3000.0)];
    for d in 0..10 {
        raw.push(txn(
            &format!("d{d}"),
            at(6, 2 + d),
            -100.0,
            TransactionType::Expense,
            "Corner Cafe",
            "dining",
        ));
    }

    let m = extract(&raw);

    assert_eq!(m.buffer_days, 20.0);
    assert_eq!(m.income_cv, 1.0);
    assert_eq!(m.discretionary_spend_median, 1000.0);
    assert_eq!(m.essential_spend_median, 0.0);
}

#[test]
fn negative_net_cashflow_floors_buffer_at_zero() {
    let raw = vec![
        payroll("p1", at(6, 1), 500.0),
        txn("x1", at(6, 3), -900.0, TransactionType::Expense, "Electronics Hub", "shopping"),
    ];

    assert_eq!(extract(&raw).buffer_days, 0.0);
}

#[test]
fn income_keywords_count_for_untyped_credits_but_not_transfers() {
    let classification = ClassificationConfig::default();
    let recurrence = RecurrenceConfig::default();
    let detector = CadenceDetector::new(recurrence.clone());
    let extractor = CashflowExtractor::new(&classification, &recurrence, &detector);

    let raw = vec![
        txn("a", at(6, 1), 1200.0, TransactionType::Expense, "Acme", "salary"),
        txn("b", at(6, 2), 800.0, TransactionType::Transfer, "Acme", "salary"),
        txn("c", at(6, 3), -45.0, TransactionType::Expense, "City Water", "utilities"),
        txn("d", at(6, 4), -45.0, TransactionType::Expense, "Cinema", "entertainment"),
    ];
    let h = history(&raw);

    assert!(extractor.is_income(&h.transactions[0]));
    assert!(!extractor.is_income(&h.transactions[1]));
    assert_eq!(extractor.classify_spend(&h.transactions[2]), Some(SpendClass::Essential));
    assert_eq!(extractor.classify_spend(&h.transactions[3]), Some(SpendClass::Discretionary));
    assert_eq!(extractor.classify_spend(&h.transactions[0]), None);
}

#[test]
fn extraction_is_bit_identical_for_identical_input() {
    let raw = salaried_with_rent(at(8, 12));
    let a = extract(&raw);
    let b = extract(&raw);

    assert_eq!(a, b);
    assert_eq!(a.buffer_days.to_bits(), b.buffer_days.to_bits());
    assert_eq!(a.income_cv.to_bits(), b.income_cv.to_bits());
}
