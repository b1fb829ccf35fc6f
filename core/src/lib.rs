//! underwriting-core: deterministic, explainable cashflow underwriting.
//!
//! transactions + facts → cashflow metrics → PD → policy decision
//! → reasons + counterfactuals → DecisionRecord.

pub mod applicant;
pub mod cashflow;
pub mod config;
pub mod decision;
pub mod engine;
pub mod error;
pub mod explain;
pub mod normalizer;
pub mod pd_model;
pub mod policy;
pub mod recurrence;
pub mod rng;
pub mod synth;
pub mod transaction;
pub mod types;
