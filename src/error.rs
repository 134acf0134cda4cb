//! Error types for Autosens

use crate::stats::StatsError;
use thiserror::Error;

/// Errors that can occur while detecting sensitivity
#[derive(Debug, Error)]
pub enum AutosensError {
    #[error("Missing required input: {0}")]
    MissingInput(String),

    #[error("Not enough glucose data to calculate autosens: {found} readings, need {required}")]
    InsufficientGlucose { found: usize, required: usize },

    #[error("ISF is expected to be expressed in mg/dL, found {0}")]
    UnsupportedUnits(String),

    #[error("Could not parse input data: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid profile: {0}")]
    InvalidProfile(String),

    #[error("Invalid basal schedule: {0}")]
    InvalidBasalSchedule(String),

    #[error("Invalid settings: {0}")]
    InvalidSettings(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(#[from] StatsError),
}

impl AutosensError {
    /// True for errors caused by the shape or content of an input document
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            AutosensError::ParseError(_)
                | AutosensError::JsonError(_)
                | AutosensError::MissingField(_)
                | AutosensError::DateParseError(_)
                | AutosensError::InvalidProfile(_)
                | AutosensError::InvalidBasalSchedule(_)
        )
    }

    /// Process exit status for this error.
    ///
    /// `2` insufficient glucose history, `3` unsupported ISF units, `4` malformed
    /// input, `1` anything else.
    pub fn exit_code(&self) -> u8 {
        match self {
            AutosensError::InsufficientGlucose { .. } => 2,
            AutosensError::UnsupportedUnits(_) => 3,
            e if e.is_malformed_input() => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_are_distinct() {
        let insufficient = AutosensError::InsufficientGlucose { found: 10, required: 72 };
        let units = AutosensError::UnsupportedUnits("mmol/L".to_string());
        let malformed = AutosensError::ParseError("glucose data".to_string());

        assert_eq!(insufficient.exit_code(), 2);
        assert_eq!(units.exit_code(), 3);
        assert_eq!(malformed.exit_code(), 4);
    }

    #[test]
    fn test_malformed_input_exit_code() {
        let json_error = serde_json::from_str::<Vec<f64>>("[1,").unwrap_err();
        for err in [
            AutosensError::JsonError(json_error),
            AutosensError::MissingField("sens".to_string()),
            AutosensError::DateParseError("yesterday".to_string()),
            AutosensError::InvalidProfile("sens".to_string()),
            AutosensError::InvalidBasalSchedule("empty".to_string()),
        ] {
            assert_eq!(err.exit_code(), 4, "{err}");
        }
    }

    #[test]
    fn test_general_exit_code() {
        assert_eq!(AutosensError::MissingInput("profile".to_string()).exit_code(), 1);
        assert_eq!(AutosensError::InvalidSettings("bounds".to_string()).exit_code(), 1);
        assert_eq!(
            AutosensError::InvalidArgument(StatsError::NonNumericRank(f64::NAN)).exit_code(),
            1
        );
    }
}
