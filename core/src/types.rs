//! Shared primitive types used across the whole engine.

/// Stable identifier of the applicant being underwritten.
pub type ApplicantId = String;

/// Jurisdiction code as it appears in the policy table ("US", "UK").
pub type JurisdictionCode = String;

/// A monetary amount in the currency of the applicant's account.
pub type Amount = f64;
