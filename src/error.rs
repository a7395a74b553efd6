use thiserror::Error;

use crate::validator::ValidationReport;

/// Error codes surfaced to callers across the engine boundary (spec §6/§7).
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("data source unavailable: {0}")]
    DataSourceUnavailable(String),

    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("validation failed with {} error(s)", .report.error_count())]
    ValidationFailed { report: ValidationReport },

    #[error("invalid distribution parameters: {0}")]
    InvalidDistribution(String),

    #[error("numerical error: {0}")]
    NumericalError(String),

    #[error("run cancelled")]
    Cancelled,

    #[error("tool error: {0}")]
    ToolError(String),
}

impl EngineError {
    /// The stable `SCREAMING_SNAKE_CASE` code for this error, for callers
    /// that need to switch on error identity rather than message text.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::DataSourceUnavailable(_) => "DATA_SOURCE_UNAVAILABLE",
            EngineError::InsufficientData(_) => "INSUFFICIENT_DATA",
            EngineError::ValidationFailed { .. } => "VALIDATION_FAILED",
            EngineError::InvalidDistribution(_) => "INVALID_DISTRIBUTION",
            EngineError::NumericalError(_) => "NUMERICAL_ERROR",
            EngineError::Cancelled => "CANCELLED",
            EngineError::ToolError(_) => "TOOL_ERROR",
        }
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
