//! Pipeline orchestration
//!
//! This module provides the public API for Autosens.
//! It orchestrates the full pipeline from raw input documents to the report.

use crate::collaborators::{BasalRateLookup, InsulinActivityEstimator};
use crate::config::AutosensConfig;
use crate::deviation::DeviationComputer;
use crate::error::AutosensError;
use crate::ratio::RatioDeriver;
use crate::report::{percentile_rows, ReportEncoder};
use crate::schema::InputAdapter;
use crate::types::{AutosensReport, GlucoseSeries, SensitivityProfile};
use log::{debug, info};

/// The five raw input documents
#[derive(Debug, Clone, Copy)]
pub struct AutosensInputs<'a> {
    pub glucose: &'a str,
    pub pump_history: &'a str,
    pub isf: &'a str,
    pub basal_profile: &'a str,
    pub profile: &'a str,
}

impl AutosensInputs<'_> {
    fn check_present(&self) -> Result<(), AutosensError> {
        for (name, document) in [
            ("glucose", self.glucose),
            ("pump history", self.pump_history),
            ("insulin sensitivities", self.isf),
            ("basal profile", self.basal_profile),
            ("profile", self.profile),
        ] {
            if document.trim().is_empty() {
                return Err(AutosensError::MissingInput(name.to_string()));
            }
        }
        Ok(())
    }
}

/// Detect sensitivity from the five raw JSON documents with default settings.
///
/// # Returns
/// The full report; `report.result` holds the sensitivity ratio.
///
/// # Example
/// ```ignore
/// let report = detect_sensitivity(AutosensInputs {
///     glucose: &glucose_json,
///     pump_history: &pump_json,
///     isf: &isf_json,
///     basal_profile: &basal_json,
///     profile: &profile_json,
/// })?;
/// println!("{}", report.result.ratio);
/// ```
pub fn detect_sensitivity(inputs: AutosensInputs<'_>) -> Result<AutosensReport, AutosensError> {
    AutosensProcessor::new().process_json(inputs)
}

/// Runs the pipeline with a fixed configuration.
///
/// Pipeline stages:
/// 1. InputAdapter - Parse input documents into domain types
/// 2. DeviationComputer - Observed minus predicted glucose change per pair
/// 3. SortedSeries - Percentiles of the deviation distribution
/// 4. RatioDeriver - Classification and clamped ratio
/// 5. ReportEncoder - Structured report
pub struct AutosensProcessor {
    config: AutosensConfig,
    encoder: ReportEncoder,
}

impl Default for AutosensProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl AutosensProcessor {
    /// Create a new processor with default settings
    pub fn new() -> Self {
        Self {
            config: AutosensConfig::default(),
            encoder: ReportEncoder::new(),
        }
    }

    /// Create a processor with validated custom settings
    pub fn with_config(config: AutosensConfig) -> Result<Self, AutosensError> {
        config.validate()?;
        Ok(Self {
            config,
            encoder: ReportEncoder::new(),
        })
    }

    pub fn config(&self) -> &AutosensConfig {
        &self.config
    }

    /// Parse the input documents and run the pipeline.
    ///
    /// The glucose history length is checked before any other document is
    /// parsed, so "not enough data" is reported even when other inputs are bad.
    pub fn process_json(
        &self,
        inputs: AutosensInputs<'_>,
    ) -> Result<AutosensReport, AutosensError> {
        inputs.check_present()?;

        let glucose_records = InputAdapter::parse_glucose_records(inputs.glucose)?;
        if glucose_records.len() < self.config.min_readings {
            return Err(AutosensError::InsufficientGlucose {
                found: glucose_records.len(),
                required: self.config.min_readings,
            });
        }

        let history = InputAdapter::parse_dose_history(inputs.pump_history)?;
        let profile = InputAdapter::parse_profile(inputs.profile)?;
        let series = InputAdapter::to_glucose_series(&glucose_records)?;
        if let Some(latest) = series.latest() {
            debug!("latest glucose {} mg/dL at {}", latest.glucose, latest.timestamp);
        }
        InputAdapter::check_isf_units(inputs.isf)?;
        let basal = InputAdapter::parse_basal_schedule(inputs.basal_profile)?;

        debug!(
            "loaded {} glucose readings, {} doses, {} basal segments",
            series.len(),
            history.len(),
            basal.entries().len()
        );

        self.process(&series, &history, &basal, &profile)
    }

    /// Run the pipeline over already-parsed inputs and caller-supplied collaborators
    pub fn process(
        &self,
        series: &GlucoseSeries,
        estimator: &dyn InsulinActivityEstimator,
        basal: &dyn BasalRateLookup,
        profile: &SensitivityProfile,
    ) -> Result<AutosensReport, AutosensError> {
        profile.validate()?;

        let deviations =
            DeviationComputer::new(&self.config).compute(series, estimator, basal, profile)?;

        let sorted_deviations = deviations.sorted_deviations()?;
        let percentiles = percentile_rows(
            &deviations.sorted_average_deltas()?,
            &deviations.sorted_bgis()?,
            &sorted_deviations,
        )?;

        let analysis = RatioDeriver::new(&self.config).derive(
            &sorted_deviations,
            deviations.deviation_sum(),
            profile,
        )?;
        info!(
            "ratio {} from {} deviations ({} skipped)",
            analysis.ratio,
            sorted_deviations.len(),
            deviations.skipped_count()
        );

        Ok(self.encoder.encode(series, deviations, percentiles, analysis))
    }
}
