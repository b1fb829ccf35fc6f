use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation failed for {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("Insufficient transaction history: {days} day(s) available, {required} required")]
    InsufficientData { days: i64, required: i64 },

    #[error("Policy configuration error: {0}")]
    PolicyConfiguration(String),

    #[error("Model configuration error: {0}")]
    ModelConfiguration(String),

    #[error("Engine configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field:  field.into(),
            reason: reason.into(),
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
