//! Core types for the Autosens pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: glucose readings, profile snapshots, deviation samples, the ratio
//! analysis and the final report.

use crate::error::AutosensError;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Default duration of insulin action (hours)
pub const DEFAULT_DIA_HOURS: f64 = 3.0;

/// A single glucose reading (mg/dL) at a wall-clock time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlucoseReading {
    pub timestamp: NaiveDateTime,
    pub glucose: f64,
}

/// Glucose readings in the order they were supplied
///
/// CGM exports list the most recent reading first; the series keeps that order
/// and the deviation stage compares entries by index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GlucoseSeries {
    readings: Vec<GlucoseReading>,
}

impl GlucoseSeries {
    pub fn new(readings: Vec<GlucoseReading>) -> Self {
        Self { readings }
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn readings(&self) -> &[GlucoseReading] {
        &self.readings
    }

    /// Most recent reading (the first entry)
    pub fn latest(&self) -> Option<&GlucoseReading> {
        self.readings.first()
    }
}

impl From<Vec<GlucoseReading>> for GlucoseSeries {
    fn from(readings: Vec<GlucoseReading>) -> Self {
        Self::new(readings)
    }
}

/// Sensitivity profile constants
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityProfile {
    /// Insulin sensitivity factor (mg/dL per unit)
    pub sensitivity_factor: f64,
    /// Highest scheduled basal rate (U/hr)
    pub max_daily_basal: f64,
    /// Duration of insulin action (hours)
    pub dia: f64,
}

impl SensitivityProfile {
    pub fn new(sensitivity_factor: f64, max_daily_basal: f64) -> Self {
        Self {
            sensitivity_factor,
            max_daily_basal,
            dia: DEFAULT_DIA_HOURS,
        }
    }

    /// Reject values the ratio arithmetic cannot divide by
    pub fn validate(&self) -> Result<(), AutosensError> {
        if !(self.sensitivity_factor.is_finite() && self.sensitivity_factor > 0.0) {
            return Err(AutosensError::InvalidProfile(format!(
                "sensitivity factor must be positive, got {}",
                self.sensitivity_factor
            )));
        }
        if !(self.max_daily_basal.is_finite() && self.max_daily_basal > 0.0) {
            return Err(AutosensError::InvalidProfile(format!(
                "max daily basal must be positive, got {}",
                self.max_daily_basal
            )));
        }
        if !(self.dia.is_finite() && self.dia > 0.0) {
            return Err(AutosensError::InvalidProfile(format!(
                "dia must be positive, got {}",
                self.dia
            )));
        }
        Ok(())
    }

    /// Immutable per-sample view with the basal rate active at that time
    pub fn snapshot(&self, current_basal: f64) -> ProfileSnapshot {
        ProfileSnapshot {
            sensitivity_factor: self.sensitivity_factor,
            max_daily_basal: self.max_daily_basal,
            dia: self.dia,
            current_basal,
        }
    }
}

/// Profile as seen by collaborators for one evaluated timestamp
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    pub sensitivity_factor: f64,
    pub max_daily_basal: f64,
    pub dia: f64,
    /// Scheduled basal rate at the evaluated timestamp (U/hr)
    pub current_basal: f64,
}

/// Residual insulin at a point in time
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct InsulinOnBoard {
    /// Units still on board
    pub iob: f64,
    /// Insulin activity (U/min)
    pub activity: f64,
}

/// Observed versus predicted glucose change for one comparison pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeviationSample {
    /// Index of the newer reading of the pair
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub glucose: f64,
    /// Observed change per 5 minutes (mg/dL)
    pub average_delta: f64,
    /// Blood-glucose impact predicted from insulin activity (mg/dL per 5 minutes)
    pub bgi: f64,
    pub deviation: f64,
    pub activity: f64,
    pub current_basal: f64,
}

/// Comparison pair rejected because a reading looked like a sensor artifact
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SkippedPair {
    pub index: usize,
    pub timestamp: NaiveDateTime,
    pub glucose: f64,
    pub compared_glucose: f64,
}

/// Outcome of evaluating one comparison pair
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum PairOutcome {
    Used(DeviationSample),
    Skipped(SkippedPair),
}

impl PairOutcome {
    pub fn index(&self) -> usize {
        match self {
            PairOutcome::Used(sample) => sample.index,
            PairOutcome::Skipped(skipped) => skipped.index,
        }
    }

    /// Progress marker used on the diagnostic channel
    pub fn marker(&self) -> char {
        match self {
            PairOutcome::Used(_) => '.',
            PairOutcome::Skipped(_) => '!',
        }
    }
}

/// Sensitivity classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    ExcessSensitivity,
    ExcessResistance,
    WithinNormalRange,
}

impl Classification {
    pub fn message(&self) -> &'static str {
        match self {
            Classification::ExcessSensitivity => "Excess insulin sensitivity detected",
            Classification::ExcessResistance => "Excess insulin resistance detected",
            Classification::WithinNormalRange => "Sensitivity within normal ranges",
        }
    }
}

/// Intermediate values behind the sensitivity ratio
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RatioAnalysis {
    pub p_sensitive: f64,
    pub p_resistant: f64,
    /// Absent when every comparison pair was skipped
    pub mean_deviation: Option<f64>,
    pub classification: Classification,
    /// Implied basal adjustment (U/hr)
    pub basal_offset: f64,
    pub ratio: f64,
    pub new_sensitivity_factor: f64,
}

impl RatioAnalysis {
    pub fn result(&self) -> SensitivityResult {
        SensitivityResult { ratio: self.ratio }
    }
}

/// The externally observable output
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SensitivityResult {
    pub ratio: f64,
}

/// One row of the diagnostic percentile table
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PercentileRow {
    pub p: f64,
    pub average_delta: f64,
    pub bgi: f64,
    pub deviation: f64,
}

/// Producer metadata attached to every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Producer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Full structured output of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AutosensReport {
    pub producer: Producer,
    pub computed_at_utc: String,
    /// Number of glucose readings supplied
    pub readings: usize,
    pub latest_glucose: Option<GlucoseReading>,
    /// Every comparison pair in index order
    pub pairs: Vec<PairOutcome>,
    pub percentiles: Vec<PercentileRow>,
    pub analysis: RatioAnalysis,
    pub result: SensitivityResult,
}

impl AutosensReport {
    pub fn samples(&self) -> impl Iterator<Item = &DeviationSample> {
        self.pairs.iter().filter_map(|pair| match pair {
            PairOutcome::Used(sample) => Some(sample),
            PairOutcome::Skipped(_) => None,
        })
    }

    pub fn skipped_count(&self) -> usize {
        self.pairs
            .iter()
            .filter(|pair| matches!(pair, PairOutcome::Skipped(_)))
            .count()
    }
}
