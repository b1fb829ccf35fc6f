use underwriting_core::{
    config::{JurisdictionPolicy, ModelConfig},
    pd_model::{Direction, Feature, FeatureVector, PdModel},
    policy::PolicyEngine,
};

fn model() -> PdModel {
    PdModel::new(ModelConfig::default()).unwrap()
}

fn baseline() -> FeatureVector {
    FeatureVector {
        buffer_days:    25.0,
        payment_burden: 0.28,
        on_time_ratio:  1.0,
        nsf_count:      0.0,
        income_cv:      0.08,
        monthly_income: 2800.0,
        tenure_months:  18.0,
    }
}

fn worst() -> FeatureVector {
    FeatureVector {
        buffer_days:    0.0,
        payment_burden: 2.0,
        on_time_ratio:  0.0,
        nsf_count:      12.0,
        income_cv:      3.0,
        monthly_income: 0.0,
        tenure_months:  0.0,
    }
}

fn best() -> FeatureVector {
    FeatureVector {
        buffer_days:    400.0,
        payment_burden: 0.0,
        on_time_ratio:  1.0,
        nsf_count:      0.0,
        income_cv:      0.0,
        monthly_income: 25_000.0,
        tenure_months:  240.0,
    }
}

/// Values ordered from worst to best for the feature.
fn sweep(feature: Feature) -> Vec<f64> {
    let raw: Vec<f64> = match feature {
        Feature::BufferDays      => (0..=60).map(|d| d as f64).collect(),
        Feature::PaymentBurden   => (0..=40).map(|i| i as f64 * 0.05).collect(),
        Feature::OnTimeRatio     => (0..=100).map(|i| i as f64 / 100.0).collect(),
        Feature::NsfCount        => (0..=8).map(|n| n as f64).collect(),
        Feature::IncomeStability => (0..=60).map(|i| i as f64 * 0.02).collect(),
        Feature::IncomeLevel     => (0..=60).map(|i| i as f64 * 100.0).collect(),
        Feature::Tenure          => (0..=48).map(|m| m as f64).collect(),
    };
    match feature.direction() {
        Direction::HigherIsBetter => raw,
        Direction::LowerIsBetter  => raw.into_iter().rev().collect(),
    }
}

#[test]
fn improving_any_feature_never_increases_pd() {
    let model = model();
    for start in [baseline(), worst(), best()] {
        for feature in Feature::ALL {
            let mut previous = f64::INFINITY;
            for value in sweep(feature) {
                let pd = model.score_features(&start.with(feature, value)).pd_12m;
                assert!(
                    pd <= previous + 1e-12,
                    "{} = {value}: pd rose from {previous} to {pd}",
                    feature.name()
                );
                previous = pd;
            }
        }
    }
}

#[test]
fn pd_stays_within_floor_and_ceiling() {
    let model = model();
    let worst = model.score_features(&worst());
    let best = model.score_features(&best());

    assert!((worst.pd_12m - 0.245).abs() < 1e-9, "pd={}", worst.pd_12m);
    assert_eq!(best.pd_12m, 0.01);
    assert!((best.raw_pd - (0.08 - 0.100)).abs() < 1e-9);

    for feature in Feature::ALL {
        for value in sweep(feature) {
            let pd = model.score_features(&baseline().with(feature, value)).pd_12m;
            assert!((0.01..=0.30).contains(&pd), "pd={pd}");
        }
    }
}

#[test]
fn raw_pd_above_ceiling_is_clamped() {
    let config = ModelConfig {
        base_pd: 0.20,
        ..ModelConfig::default()
    };
    let model = PdModel::new(config).unwrap();
    let score = model.score_features(&worst());
    assert!(score.raw_pd > 0.30);
    assert_eq!(score.pd_12m, 0.30);
}

#[test]
fn contributions_sum_to_raw_pd() {
    let model = model();
    let score = model.score_features(&baseline());
    let sum: f64 = score.contributions.iter().map(|c| c.adjustment).sum();
    assert!((0.08 + sum - score.raw_pd).abs() < 1e-12);
    assert_eq!(score.contributions.len(), Feature::ALL.len());
    assert_eq!(
        score.contribution(Feature::OnTimeRatio).map(|c| c.adjustment),
        Some(-0.015)
    );
}

#[test]
fn scoring_is_bit_identical_across_calls() {
    let model = model();
    let a = model.score_features(&baseline());
    let b = model.score_features(&baseline());
    assert_eq!(a.pd_12m.to_bits(), b.pd_12m.to_bits());
    assert_eq!(a, b);
}

fn applicant(
    buffer_days: f64,
    payment_burden: f64,
    on_time_ratio: f64,
    nsf_count: f64,
    income_cv: f64,
    monthly_income: f64,
    tenure_months: f64,
) -> FeatureVector {
    FeatureVector {
        buffer_days,
        payment_burden,
        on_time_ratio,
        nsf_count,
        income_cv,
        monthly_income,
        tenure_months,
    }
}

#[test]
fn pd_on_a_tier_boundary_lands_in_that_tier() {
    let model = model();
    let policy = JurisdictionPolicy::us();
    let policy_engine = PolicyEngine::new(&policy);

    // Each bracket sum is exactly the tier's max_pd.
    let cases = [
        (applicant(30.0, 0.30, 1.0, 0.0, 0.1, 3000.0, 18.0), 0.03, "prime"),
        (applicant(12.0, 0.40, 1.0, 0.0, 0.1, 5000.0, 30.0), 0.06, "near-prime"),
        (applicant(12.0, 0.30, 1.0, 1.0, 0.3, 3000.0, 30.0), 0.09, "starter"),
        (applicant(12.0, 0.40, 0.9, 1.0, 0.3, 3000.0, 30.0), 0.12, "high-risk"),
    ];

    for (features, expected_pd, expected_tier) in cases {
        let score = model.score_features(&features);
        assert_eq!(score.pd_12m, expected_pd, "raw={}", score.raw_pd);
        let tier = policy_engine.tier_for(score.pd_12m).map(|(_, t)| t.name.as_str());
        assert_eq!(tier, Some(expected_tier), "pd={}", score.pd_12m);
    }
}

#[test]
fn pd_is_reported_to_the_basis_point() {
    let model = model();
    for feature in Feature::ALL {
        for value in sweep(feature) {
            let pd = model.score_features(&baseline().with(feature, value)).pd_12m;
            let bps = pd * 10_000.0;
            assert!((bps - bps.round()).abs() < 1e-6, "pd={pd}");
        }
    }
}
