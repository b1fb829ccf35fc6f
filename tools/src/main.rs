//! underwrite: headless runner for the cashflow underwriting engine.
//!
//! Usage:
//!   underwrite --profile steady --seed 42 --jurisdiction US
//!   underwrite --transactions txns.json --facts facts.json --jurisdiction UK --json
//!   underwrite --profile stretched --detector keyword --fraud-gate-failed

use anyhow::Result;
use chrono::Utc;
use std::env;
use underwriting_core::{
    applicant::{ApplicantFacts, FraudGate},
    config::EngineConfig,
    decision::DecisionRecord,
    engine::{AnalysisRequest, UnderwritingEngine},
    recurrence::KeywordDetector,
    synth::{self, HistoryProfile},
    transaction::RawTransaction,
};

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let json = args.iter().any(|a| a == "--json");
    let fraud_gate_failed = args.iter().any(|a| a == "--fraud-gate-failed");
    let data_dir = str_arg(&args, "--data-dir").unwrap_or("./data");
    let jurisdiction = str_arg(&args, "--jurisdiction").unwrap_or("US");
    let applicant_id = str_arg(&args, "--applicant").unwrap_or("applicant-001");
    let detector = str_arg(&args, "--detector").unwrap_or("cadence");
    let profile: HistoryProfile = str_arg(&args, "--profile")
        .unwrap_or("steady")
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;

    let config = EngineConfig::load(data_dir)?;
    let mut engine = UnderwritingEngine::new(config)?;
    match detector {
        "cadence" => {}
        "keyword" => {
            let cfg = engine.config();
            let keyword = KeywordDetector::new(&cfg.classification, cfg.recurrence.clone());
            engine = engine.with_recurrence_detector(Box::new(keyword));
        }
        other => anyhow::bail!("unknown detector '{other}' (cadence|keyword)"),
    }

    let (transactions, facts) = match str_arg(&args, "--transactions") {
        Some(path) => {
            let transactions: Vec<RawTransaction> = read_json(path)?;
            let facts: ApplicantFacts = match str_arg(&args, "--facts") {
                Some(facts_path) => read_json(facts_path)?,
                None => anyhow::bail!("--facts is required with --transactions"),
            };
            (transactions, facts)
        }
        None => {
            log::info!("runner: synthetic history profile={} seed={seed}", profile.name());
            (
                synth::generate(profile, seed, Utc::now()),
                profile.facts(jurisdiction),
            )
        }
    };

    let fraud_gate = if fraud_gate_failed {
        FraudGate::failed(multi_arg(&args, "--fraud-flag"))
    } else {
        FraudGate::passed()
    };

    if !json {
        println!("underwrite: cashflow underwriting runner");
        println!("  applicant:    {applicant_id}");
        println!("  jurisdiction: {jurisdiction}");
        println!("  data_dir:     {data_dir}");
        println!("  detector:     {detector}");
        println!("  transactions: {}", transactions.len());
        println!();
    }

    let request = AnalysisRequest {
        applicant_id: applicant_id.to_string(),
        transactions,
        facts,
        fraud_gate,
        jurisdiction: jurisdiction.to_string(),
        as_of: None,
    };
    let record = engine.analyze(&request)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        print_summary(&record);
    }
    Ok(())
}

fn print_summary(record: &DecisionRecord) {
    println!("=== DECISION ===");
    println!("  decision_id:  {}", record.decision_id);
    println!("  approved:     {}", record.approved);
    println!("  tier:         {}", record.tier.as_deref().unwrap_or("-"));
    println!("  credit_limit: {:.0}", record.credit_limit);
    match record.apr {
        Some(apr) => println!("  apr:          {apr:.2}%"),
        None => println!("  apr:          -"),
    }
    if let Some(risk) = &record.risk_assessment {
        println!("  pd_12m:       {:.4}", risk.pd_12m);
        println!("  lgd:          {:.2}", risk.lgd);
        println!("  expected loss: {:.2}", risk.expected_loss);
    }
    println!("  policy:       {} / model {}", record.policy_version, record.model_version);

    if let Some(m) = &record.cashflow_metrics {
        println!();
        println!("=== CASHFLOW ===");
        println!("  income median:  {:.2} (cv {:.3})", m.income_median, m.income_cv);
        println!("  buffer days:    {:.1}", m.buffer_days);
        println!("  payment burden: {:.3}", m.payment_burden);
        println!("  on-time ratio:  {:.3}", m.on_time_ratio);
        println!("  nsf (90d):      {}", m.nsf_count_90d);
        println!("  transactions:   {}", m.transaction_count);
    }

    if !record.declines.is_empty() {
        println!();
        println!("=== DECLINES ===");
        for d in &record.declines {
            println!("  {:<30} {}", d.code.as_str(), d.description);
        }
    }

    println!();
    println!("=== REASONS ===");
    for r in &record.reasons {
        println!(
            "  {:+.3} {:?} {:?}: {}",
            r.signed_impact_on_pd, r.severity, r.code, r.description
        );
    }

    if !record.counterfactuals.is_empty() {
        println!();
        println!("=== WHAT WOULD HELP (one change at a time) ===");
        for c in &record.counterfactuals {
            println!("  {:+.3} [{:?}] {}", c.pd_delta, c.feasibility, c.action);
        }
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
    Ok(serde_json::from_str(&content)?)
}

fn str_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn multi_arg(args: &[String], flag: &str) -> Vec<String> {
    args.windows(2)
        .filter(|w| w[0] == flag)
        .map(|w| w[1].clone())
        .collect()
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
