//! Deviation computation
//!
//! Compares each glucose reading with the one `comparison_offset` samples
//! later, converts the difference into a per-sample average delta and
//! subtracts the glucose impact predicted from insulin activity.

use crate::collaborators::{BasalRateLookup, InsulinActivityEstimator};
use crate::config::AutosensConfig;
use crate::error::AutosensError;
use crate::stats::{round_half_up, round_to, SortedSeries};
use crate::types::{
    DeviationSample, GlucoseSeries, PairOutcome, SensitivityProfile, SkippedPair,
};
use log::debug;

/// Ordered result of the deviation stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviationSeries {
    pairs: Vec<PairOutcome>,
    deviation_sum: f64,
}

impl DeviationSeries {
    /// Every evaluated pair, used or skipped, in index order
    pub fn pairs(&self) -> &[PairOutcome] {
        &self.pairs
    }

    pub fn into_pairs(self) -> Vec<PairOutcome> {
        self.pairs
    }

    pub fn samples(&self) -> impl Iterator<Item = &DeviationSample> {
        self.pairs.iter().filter_map(|pair| match pair {
            PairOutcome::Used(sample) => Some(sample),
            PairOutcome::Skipped(_) => None,
        })
    }

    pub fn sample_count(&self) -> usize {
        self.samples().count()
    }

    pub fn skipped_count(&self) -> usize {
        self.pairs.len() - self.sample_count()
    }

    pub fn deviation_sum(&self) -> f64 {
        self.deviation_sum
    }

    pub fn sorted_deviations(&self) -> Result<SortedSeries, AutosensError> {
        Ok(SortedSeries::from_unsorted(
            self.samples().map(|s| s.deviation).collect(),
        )?)
    }

    pub fn sorted_average_deltas(&self) -> Result<SortedSeries, AutosensError> {
        Ok(SortedSeries::from_unsorted(
            self.samples().map(|s| s.average_delta).collect(),
        )?)
    }

    pub fn sorted_bgis(&self) -> Result<SortedSeries, AutosensError> {
        Ok(SortedSeries::from_unsorted(
            self.samples().map(|s| s.bgi).collect(),
        )?)
    }
}

/// Produces deviation samples from a glucose series
pub struct DeviationComputer<'a> {
    config: &'a AutosensConfig,
}

impl<'a> DeviationComputer<'a> {
    pub fn new(config: &'a AutosensConfig) -> Self {
        Self { config }
    }

    /// Evaluate every comparison pair of `series`.
    ///
    /// Fails with `InsufficientGlucose` before evaluating anything when the
    /// series is shorter than the configured minimum.
    pub fn compute(
        &self,
        series: &GlucoseSeries,
        estimator: &dyn InsulinActivityEstimator,
        basal: &dyn BasalRateLookup,
        profile: &SensitivityProfile,
    ) -> Result<DeviationSeries, AutosensError> {
        if series.len() < self.config.min_readings {
            return Err(AutosensError::InsufficientGlucose {
                found: series.len(),
                required: self.config.min_readings,
            });
        }

        let readings = series.readings();
        let offset = self.config.comparison_offset;
        let pair_count = readings.len().saturating_sub(offset);
        let mut result = DeviationSeries {
            pairs: Vec::with_capacity(pair_count),
            deviation_sum: 0.0,
        };

        for (index, (reading, compared)) in
            readings.iter().zip(readings.iter().skip(offset)).enumerate()
        {
            if reading.glucose < self.config.min_glucose_mgdl
                || compared.glucose < self.config.min_glucose_mgdl
            {
                debug!(
                    "skipping pair {} at {}: {} vs {} mg/dL",
                    index, reading.timestamp, reading.glucose, compared.glucose
                );
                result.pairs.push(PairOutcome::Skipped(SkippedPair {
                    index,
                    timestamp: reading.timestamp,
                    glucose: reading.glucose,
                    compared_glucose: compared.glucose,
                }));
                continue;
            }

            let average_delta = round_to((reading.glucose - compared.glucose) / offset as f64, 2);

            let snapshot = profile.snapshot(basal.rate_at(reading.timestamp));
            let insulin = estimator.estimate(&snapshot, reading.timestamp);

            let bgi = predicted_effect(
                insulin.activity,
                snapshot.sensitivity_factor,
                self.config.sample_minutes,
            );
            let deviation = round_to(average_delta - bgi, 2);

            result.deviation_sum += deviation;
            result.pairs.push(PairOutcome::Used(DeviationSample {
                index,
                timestamp: reading.timestamp,
                glucose: reading.glucose,
                average_delta,
                bgi,
                deviation,
                activity: insulin.activity,
                current_basal: snapshot.current_basal,
            }));
        }

        debug!(
            "evaluated {} pairs: {} used, {} skipped",
            result.pairs.len(),
            result.sample_count(),
            result.skipped_count()
        );

        Ok(result)
    }
}

/// Glucose change (mg/dL) predicted over one sample period from insulin activity.
///
/// Ties round toward positive infinity, so `-0.625` becomes `-0.62`.
pub fn predicted_effect(activity: f64, sensitivity_factor: f64, sample_minutes: f64) -> f64 {
    round_half_up(-activity * sensitivity_factor * sample_minutes, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{BasalEntry, BasalSchedule, Dose, DoseHistory};
    use crate::types::{GlucoseReading, InsulinOnBoard, ProfileSnapshot};
    use chrono::{Duration, NaiveDate, NaiveDateTime};
    use std::cell::RefCell;

    /// Estimator returning a fixed activity
    struct ConstantActivity(f64);

    impl InsulinActivityEstimator for ConstantActivity {
        fn estimate(&self, _profile: &ProfileSnapshot, _at: NaiveDateTime) -> InsulinOnBoard {
            InsulinOnBoard { iob: 0.0, activity: self.0 }
        }
    }

    /// Estimator recording the basal rate it was handed
    #[derive(Default)]
    struct RecordingEstimator {
        seen: RefCell<Vec<f64>>,
    }

    impl InsulinActivityEstimator for RecordingEstimator {
        fn estimate(&self, profile: &ProfileSnapshot, _at: NaiveDateTime) -> InsulinOnBoard {
            self.seen.borrow_mut().push(profile.current_basal);
            InsulinOnBoard::default()
        }
    }

    fn start() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 6, 13)
            .unwrap()
            .and_hms_opt(23, 55, 0)
            .unwrap()
    }

    /// Most recent first, 5 minutes apart
    fn make_series(values: &[f64]) -> GlucoseSeries {
        values
            .iter()
            .enumerate()
            .map(|(i, &glucose)| GlucoseReading {
                timestamp: start() - Duration::minutes(5 * i as i64),
                glucose,
            })
            .collect::<Vec<_>>()
            .into()
    }

    fn flat_schedule() -> BasalSchedule {
        BasalSchedule::new(vec![BasalEntry { index: 0, minutes: 0, rate: 1.0 }]).unwrap()
    }

    #[test]
    fn test_insufficient_readings_fail_before_evaluation() {
        let config = AutosensConfig::default();
        let estimator = RecordingEstimator::default();
        let series = make_series(&[120.0; 71]);

        let result = DeviationComputer::new(&config).compute(
            &series,
            &estimator,
            &flat_schedule(),
            &SensitivityProfile::new(50.0, 1.0),
        );

        assert!(matches!(
            result,
            Err(AutosensError::InsufficientGlucose { found: 71, required: 72 })
        ));
        assert!(estimator.seen.borrow().is_empty());
    }

    #[test]
    fn test_sample_count_is_length_minus_offset() {
        let config = AutosensConfig::default();
        let series = make_series(&[110.0; 80]);

        let deviations = DeviationComputer::new(&config)
            .compute(
                &series,
                &DoseHistory::default(),
                &flat_schedule(),
                &SensitivityProfile::new(50.0, 1.0),
            )
            .unwrap();

        assert_eq!(deviations.sample_count(), 77);
        assert_eq!(deviations.skipped_count(), 0);
        assert_eq!(deviations.deviation_sum(), 0.0);
    }

    #[test]
    fn test_low_readings_skip_their_pairs() {
        let config = AutosensConfig::default();
        let mut values = vec![120.0; 80];
        values[10] = 39.0;
        let series = make_series(&values);

        let deviations = DeviationComputer::new(&config)
            .compute(
                &series,
                &DoseHistory::default(),
                &flat_schedule(),
                &SensitivityProfile::new(50.0, 1.0),
            )
            .unwrap();

        // index 10 is the newer reading of pair 10 and the older reading of pair 7
        assert_eq!(deviations.skipped_count(), 2);
        assert_eq!(deviations.sample_count(), 80 - 3 - 2);
        let skipped: Vec<usize> = deviations
            .pairs()
            .iter()
            .filter(|p| matches!(p, PairOutcome::Skipped(_)))
            .map(|p| p.index())
            .collect();
        assert_eq!(skipped, vec![7, 10]);
    }

    #[test]
    fn test_reading_at_threshold_is_kept() {
        let config = AutosensConfig::default();
        let mut values = vec![120.0; 72];
        values[0] = 40.0;
        let deviations = DeviationComputer::new(&config)
            .compute(
                &make_series(&values),
                &DoseHistory::default(),
                &flat_schedule(),
                &SensitivityProfile::new(50.0, 1.0),
            )
            .unwrap();
        assert_eq!(deviations.skipped_count(), 0);
    }

    #[test]
    fn test_deviation_against_predicted_effect() {
        let config = AutosensConfig::default();
        // newer reading 30 mg/dL above the one 15 minutes earlier
        let mut values = vec![100.0; 72];
        values[0] = 130.0;

        let deviations = DeviationComputer::new(&config)
            .compute(
                &make_series(&values),
                &ConstantActivity(-0.04),
                &flat_schedule(),
                &SensitivityProfile::new(40.0, 1.0),
            )
            .unwrap();

        let first = deviations.samples().next().unwrap();
        assert_eq!(first.average_delta, 10.0);
        assert_eq!(first.bgi, 8.0);
        assert_eq!(first.deviation, 2.0);
    }

    #[test]
    fn test_average_delta_rounded() {
        let config = AutosensConfig::default();
        let mut values = vec![100.0; 72];
        values[0] = 110.0;

        let deviations = DeviationComputer::new(&config)
            .compute(
                &make_series(&values),
                &DoseHistory::default(),
                &flat_schedule(),
                &SensitivityProfile::new(40.0, 1.0),
            )
            .unwrap();

        assert_eq!(deviations.samples().next().unwrap().average_delta, 3.33);
    }

    #[test]
    fn test_each_sample_sees_its_own_basal_rate() {
        let config = AutosensConfig::default();
        let schedule = BasalSchedule::new(vec![
            BasalEntry { index: 0, minutes: 0, rate: 0.5 },
            BasalEntry { index: 1, minutes: 23 * 60, rate: 1.5 },
        ])
        .unwrap();
        let estimator = RecordingEstimator::default();

        DeviationComputer::new(&config)
            .compute(
                &make_series(&[120.0; 72]),
                &estimator,
                &schedule,
                &SensitivityProfile::new(50.0, 1.0),
            )
            .unwrap();

        let seen = estimator.seen.borrow();
        assert_eq!(seen.len(), 69);
        // 23:55 back to 23:00 falls in the late segment, earlier readings do not
        assert_eq!(seen[0], 1.5);
        assert_eq!(seen[11], 1.5);
        assert_eq!(seen[12], 0.5);
    }

    #[test]
    fn test_bolus_history_lowers_deviation() {
        let config = AutosensConfig::default();
        let history = DoseHistory::new(vec![Dose::Bolus {
            time: start() - Duration::minutes(60),
            units: 2.0,
        }]);

        let deviations = DeviationComputer::new(&config)
            .compute(
                &make_series(&[100.0; 72]),
                &history,
                &flat_schedule(),
                &SensitivityProfile::new(50.0, 1.0),
            )
            .unwrap();

        let first = deviations.samples().next().unwrap();
        // flat glucose while insulin is active means glucose fell less than predicted
        assert!(first.bgi < 0.0);
        assert!(first.deviation > 0.0);
        assert!(first.activity > 0.0);
    }

    #[test]
    fn test_predicted_effect() {
        assert_eq!(predicted_effect(-0.04, 40.0, 5.0), 8.0);
        assert_eq!(predicted_effect(0.0, 40.0, 5.0), 0.0);
        assert_eq!(predicted_effect(0.01, 50.0, 5.0), -2.5);
    }

    #[test]
    fn test_predicted_effect_negative_tie_rounds_up() {
        // -0.015625 * 8 * 5 is exactly -0.625
        assert_eq!(predicted_effect(0.015625, 8.0, 5.0), -0.62);
        assert_eq!(predicted_effect(-0.015625, 8.0, 5.0), 0.63);
    }

    #[test]
    fn test_negative_tie_carries_into_deviation() {
        let config = AutosensConfig::default();
        let deviations = DeviationComputer::new(&config)
            .compute(
                &make_series(&[100.0; 72]),
                &ConstantActivity(0.015625),
                &flat_schedule(),
                &SensitivityProfile::new(8.0, 1.0),
            )
            .unwrap();

        let first = deviations.samples().next().unwrap();
        assert_eq!(first.bgi, -0.62);
        assert_eq!(first.deviation, 0.62);
    }
}
