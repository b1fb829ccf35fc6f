use chrono::{DateTime, TimeZone, Utc};
use underwriting_core::{
    applicant::FraudGate,
    config::{ClassificationConfig, RecurrenceConfig},
    engine::{AnalysisRequest, UnderwritingEngine},
    error::EngineError,
    policy::DeclineCode,
    recurrence::KeywordDetector,
    synth::{self, HistoryProfile},
};

fn as_of() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 30, 18, 0, 0).unwrap()
}

fn request(profile: HistoryProfile, jurisdiction: &str) -> AnalysisRequest {
    AnalysisRequest {
        applicant_id: format!("pipe-{}", profile.name()),
        transactions: synth::generate(profile, 42, as_of()),
        facts:        profile.facts(jurisdiction),
        fraud_gate:   FraudGate::passed(),
        jurisdiction: jurisdiction.into(),
        as_of:        Some(as_of()),
    }
}

#[test]
fn steady_history_is_approved_end_to_end() {
    let _ = env_logger::builder().is_test(true).try_init();
    let engine = UnderwritingEngine::build_test().unwrap();

    let record = engine.analyze(&request(HistoryProfile::Steady, "US")).unwrap();

    assert!(record.approved, "declines: {:?}", record.declines);
    assert!(record.credit_limit > 0.0);
    assert!(record.apr.is_some());

    let metrics = record.cashflow_metrics.as_ref().unwrap();
    assert!(metrics.recurring_series_count >= 2);
    assert_eq!(metrics.on_time_ratio, 1.0);
    assert_eq!(metrics.nsf_count_90d, 0);
    assert!(metrics.history_days >= 88);

    let report = record.normalization.as_ref().unwrap();
    assert_eq!(report.retained, metrics.transaction_count);
    assert_eq!(record.model_version, "cashflow-pd-1.0.0");
    assert_eq!(record.policy_version, "2025-10-01");
}

#[test]
fn stretched_history_is_declined_with_reasons() {
    let engine = UnderwritingEngine::build_test().unwrap();

    let record = engine.analyze(&request(HistoryProfile::Stretched, "US")).unwrap();

    assert!(!record.approved);
    assert!(record.apr.is_none());
    assert!(record
        .declines
        .iter()
        .any(|d| d.code == DeclineCode::BufferBelowMinimum));
    assert!(!record.reasons.is_empty());
    assert!(!record.counterfactuals.is_empty());
    assert!(record.cashflow_metrics.as_ref().unwrap().nsf_count_90d >= 1);
}

#[test]
fn thin_history_is_an_error_not_a_decline() {
    let engine = UnderwritingEngine::build_test().unwrap();

    let err = engine.analyze(&request(HistoryProfile::Thin, "US")).unwrap_err();

    assert!(matches!(err, EngineError::InsufficientData { days: 5, .. }), "{err}");
}

#[test]
fn failed_fraud_gate_declines_even_without_enough_history() {
    let engine = UnderwritingEngine::build_test().unwrap();
    let mut req = request(HistoryProfile::Thin, "US");
    req.fraud_gate = FraudGate::failed(vec!["deepfake_suspected".into()]);

    let record = engine.analyze(&req).unwrap();

    assert!(!record.approved);
    assert!(!record.fraud_gate_passed);
    assert_eq!(record.declines[0].code, DeclineCode::FraudGateFailed);
    assert!(record.cashflow_metrics.is_none());
    assert!(record.normalization.is_some());
}

#[test]
fn malformed_transaction_fails_the_request() {
    let engine = UnderwritingEngine::build_test().unwrap();
    let mut req = request(HistoryProfile::Steady, "US");
    req.transactions[3].account_id = None;

    let err = engine.analyze(&req).unwrap_err();

    assert!(matches!(err, EngineError::Validation { .. }), "{err}");
}

#[test]
fn unknown_jurisdiction_fails_before_scoring() {
    let engine = UnderwritingEngine::build_test().unwrap();

    let err = engine.analyze(&request(HistoryProfile::Steady, "DE")).unwrap_err();

    assert!(matches!(err, EngineError::PolicyConfiguration(_)), "{err}");
}

#[test]
fn uk_records_carry_uk_loss_given_default() {
    let engine = UnderwritingEngine::build_test().unwrap();

    let record = engine.analyze(&request(HistoryProfile::Steady, "UK")).unwrap();

    assert_eq!(record.jurisdiction, "UK");
    assert_eq!(record.risk_assessment.as_ref().map(|r| r.lgd), Some(0.50));
}

#[test]
fn recurrence_detector_can_be_swapped() {
    let detector = KeywordDetector::new(&ClassificationConfig::default(), RecurrenceConfig::default());
    let engine = UnderwritingEngine::build_test()
        .unwrap()
        .with_recurrence_detector(Box::new(detector));

    let record = engine.analyze(&request(HistoryProfile::Steady, "US")).unwrap();

    // Only rent carries a recurring keyword in the steady feed.
    assert_eq!(record.cashflow_metrics.as_ref().unwrap().recurring_series_count, 1);
}

#[test]
fn decision_record_serializes_codes_in_screaming_snake_case() {
    let engine = UnderwritingEngine::build_test().unwrap();
    let record = engine.analyze(&request(HistoryProfile::Stretched, "US")).unwrap();

    let json = serde_json::to_value(&record).unwrap();

    assert_eq!(json["declines"][0]["code"], "BUFFER_BELOW_MINIMUM");
    assert_eq!(json["joint_effects_not_modeled"], true);
    assert!(json["apr"].is_null());
}
