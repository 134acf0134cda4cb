//! Detection settings
//!
//! Thresholds used by the deviation and ratio stages. Every field has a default,
//! so a settings file only needs to name the values it overrides.

use crate::error::AutosensError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Minimum number of glucose readings required for a run
pub const DEFAULT_MIN_READINGS: usize = 72;

/// Readings below this value (mg/dL) are treated as sensor artifacts
pub const DEFAULT_MIN_GLUCOSE_MGDL: f64 = 40.0;

/// Tunable thresholds for sensitivity detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosensConfig {
    pub min_readings: usize,
    pub min_glucose_mgdl: f64,
    /// Distance in samples between the two readings of a comparison pair
    pub comparison_offset: usize,
    /// Nominal sampling cadence (minutes)
    pub sample_minutes: f64,
    pub sensitive_percentile: f64,
    pub resistant_percentile: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
}

impl Default for AutosensConfig {
    fn default() -> Self {
        Self {
            min_readings: DEFAULT_MIN_READINGS,
            min_glucose_mgdl: DEFAULT_MIN_GLUCOSE_MGDL,
            comparison_offset: 3,
            sample_minutes: 5.0,
            sensitive_percentile: 0.50,
            resistant_percentile: 0.30,
            min_ratio: 0.5,
            max_ratio: 2.0,
        }
    }
}

impl AutosensConfig {
    /// Load settings from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, AutosensError> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| {
            AutosensError::InvalidSettings(format!("{}: {}", path.as_ref().display(), e))
        })?;
        Self::from_json(&content)
    }

    /// Parse and validate settings from JSON
    pub fn from_json(json: &str) -> Result<Self, AutosensError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| AutosensError::InvalidSettings(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), AutosensError> {
        if self.comparison_offset == 0 {
            return Err(AutosensError::InvalidSettings(
                "comparison_offset must be at least 1".to_string(),
            ));
        }
        if !(self.sample_minutes > 0.0) {
            return Err(AutosensError::InvalidSettings(
                "sample_minutes must be positive".to_string(),
            ));
        }
        for (name, p) in [
            ("sensitive_percentile", self.sensitive_percentile),
            ("resistant_percentile", self.resistant_percentile),
        ] {
            if !(0.0..=1.0).contains(&p) {
                return Err(AutosensError::InvalidSettings(format!(
                    "{name} must be within [0, 1], got {p}"
                )));
            }
        }
        if !(self.min_ratio > 0.0 && self.min_ratio <= self.max_ratio) {
            return Err(AutosensError::InvalidSettings(format!(
                "ratio bounds must satisfy 0 < min <= max, got [{}, {}]",
                self.min_ratio, self.max_ratio
            )));
        }
        Ok(())
    }

    /// Sample periods per hour, used to turn a per-sample deficit into U/hr
    pub fn samples_per_hour(&self) -> f64 {
        60.0 / self.sample_minutes
    }
}
