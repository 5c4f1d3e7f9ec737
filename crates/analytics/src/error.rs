//! Analytics error types

use thiserror::Error;

/// Degradations and feed failures surfaced by the analytics core.
///
/// The first three variants never reach ingestion callers: components
/// report them to the coordinator, which logs and counts them.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalyticsError {
    /// A field the computation needs was absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A numeric field was NaN, infinite or otherwise unusable
    #[error("Invalid numeric value for {field}: {value}")]
    InvalidNumeric { field: &'static str, value: f64 },

    /// Not enough samples for the requested statistic
    #[error("Window underflow: need {needed} samples, have {available}")]
    WindowUnderflow { needed: usize, available: usize },

    /// Feed source failure
    #[error("Feed error: {0}")]
    Feed(String),

    /// Event payload could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),
}

impl AnalyticsError {
    /// Short label used for the degradation counter
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingField(_) => "missing_field",
            Self::InvalidNumeric { .. } => "invalid_numeric",
            Self::WindowUnderflow { .. } => "window_underflow",
            Self::Feed(_) => "feed",
            Self::Decode(_) => "decode",
        }
    }

    pub fn invalid(field: &'static str, value: f64) -> Self {
        Self::InvalidNumeric { field, value }
    }
}
