//! Sensitivity ratio derivation
//!
//! Classifies the deviation distribution as sensitive, resistant or normal and
//! turns the relevant percentile into a basal offset and a clamped ratio.

use crate::config::AutosensConfig;
use crate::error::AutosensError;
use crate::stats::{round_to, SortedSeries};
use crate::types::{Classification, RatioAnalysis, SensitivityProfile};
use log::{info, warn};

/// Derives the sensitivity ratio from sorted deviations
pub struct RatioDeriver<'a> {
    config: &'a AutosensConfig,
}

impl<'a> RatioDeriver<'a> {
    pub fn new(config: &'a AutosensConfig) -> Self {
        Self { config }
    }

    pub fn derive(
        &self,
        deviations: &SortedSeries,
        deviation_sum: f64,
        profile: &SensitivityProfile,
    ) -> Result<RatioAnalysis, AutosensError> {
        profile.validate()?;

        let p_sensitive = deviations.percentile(self.config.sensitive_percentile)?;
        let p_resistant = deviations.percentile(self.config.resistant_percentile)?;

        let mean_deviation = if deviations.is_empty() {
            warn!("no usable glucose pairs; sensitivity assumed normal");
            None
        } else {
            Some(deviation_sum / deviations.len() as f64)
        };

        // mg/dL per sample deficit -> U/hr
        let to_basal = |p: f64| p * self.config.samples_per_hour() / profile.sensitivity_factor;

        let (classification, basal_offset) = if p_sensitive < 0.0 {
            (Classification::ExcessSensitivity, to_basal(p_sensitive))
        } else if p_resistant > 0.0 {
            (Classification::ExcessResistance, to_basal(p_resistant))
        } else {
            (Classification::WithinNormalRange, 0.0)
        };
        info!("{}", classification.message());

        let ratio = 1.0 + basal_offset / profile.max_daily_basal;
        let ratio = ratio.max(self.config.min_ratio).min(self.config.max_ratio);
        let ratio = round_to(ratio, 2);

        Ok(RatioAnalysis {
            p_sensitive,
            p_resistant,
            mean_deviation,
            classification,
            basal_offset,
            ratio,
            new_sensitivity_factor: profile.sensitivity_factor / ratio,
        })
    }
}
