//! Insulin activity from pump history
//!
//! Uses a bilinear activity curve: activity rises linearly to a peak at 75
//! minutes and falls back to zero at 180 minutes, with both times stretched by
//! the profile's duration of insulin action. Temporary basal rates are turned
//! into a train of small net boluses relative to the scheduled rate.

use super::InsulinActivityEstimator;
use crate::stats::round_to;
use crate::types::{InsulinOnBoard, ProfileSnapshot};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

const PEAK_MINUTES: f64 = 75.0;
const END_MINUTES: f64 = 180.0;

/// Size of each net bolus a temporary basal is split into (U)
const TEMP_BOLUS_UNITS: f64 = 0.05;

/// An insulin delivery event
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Dose {
    Bolus {
        time: NaiveDateTime,
        units: f64,
    },
    TempBasal {
        time: NaiveDateTime,
        /// Absolute rate (U/hr)
        rate: f64,
        duration_minutes: f64,
    },
}

/// Dosing history used to estimate insulin on board
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DoseHistory {
    doses: Vec<Dose>,
}

impl DoseHistory {
    pub fn new(doses: Vec<Dose>) -> Self {
        Self { doses }
    }

    pub fn doses(&self) -> &[Dose] {
        &self.doses
    }

    pub fn len(&self) -> usize {
        self.doses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.doses.is_empty()
    }

    /// Expand doses into (time, units) insulin events.
    ///
    /// Temporary basals become net boluses against `current_basal`, so a temp
    /// below the scheduled rate contributes negative insulin.
    fn insulin_events(&self, current_basal: f64) -> Vec<(NaiveDateTime, f64)> {
        let mut events = Vec::new();

        for dose in &self.doses {
            match *dose {
                Dose::Bolus { time, units } => events.push((time, units)),
                Dose::TempBasal {
                    time,
                    rate,
                    duration_minutes,
                } => {
                    let net_rate = rate - current_basal;
                    let bolus_size = if net_rate < 0.0 {
                        -TEMP_BOLUS_UNITS
                    } else {
                        TEMP_BOLUS_UNITS
                    };
                    let net_amount = round_to(net_rate * duration_minutes / 60.0, 2);
                    let count = (net_amount / bolus_size).round();
                    if count < 1.0 {
                        continue;
                    }
                    let spacing_minutes = duration_minutes / count;
                    for j in 0..count as usize {
                        let offset_ms = (j as f64 * spacing_minutes * 60_000.0).round() as i64;
                        events.push((time + Duration::milliseconds(offset_ms), bolus_size));
                    }
                }
            }
        }

        events
    }
}

impl InsulinActivityEstimator for DoseHistory {
    fn estimate(&self, profile: &ProfileSnapshot, at: NaiveDateTime) -> InsulinOnBoard {
        self.insulin_events(profile.current_basal)
            .into_iter()
            .filter(|(time, _)| *time <= at)
            .map(|(time, units)| {
                let minutes_ago = (at - time).num_milliseconds() as f64 / 60_000.0;
                bilinear_contribution(units, minutes_ago, profile.dia)
            })
            .fold(InsulinOnBoard::default(), |total, contrib| InsulinOnBoard {
                iob: total.iob + contrib.iob,
                activity: total.activity + contrib.activity,
            })
    }
}

/// IOB and activity contributed by `units` delivered `minutes_ago`
fn bilinear_contribution(units: f64, minutes_ago: f64, dia: f64) -> InsulinOnBoard {
    let scaled = minutes_ago * 3.0 / dia;

    if scaled < PEAK_MINUTES {
        let x = scaled / 5.0 + 1.0;
        InsulinOnBoard {
            iob: units * (1.0 - 0.001852 * x * x + 0.001852 * x),
            activity: units * (2.0 / dia / 60.0 / PEAK_MINUTES) * scaled,
        }
    } else if scaled < END_MINUTES {
        let y = (scaled - PEAK_MINUTES) / 5.0;
        InsulinOnBoard {
            iob: units * (0.001323 * y * y - 0.054233 * y + 0.55556),
            activity: units
                * (2.0 / dia / 60.0
                    - (scaled - PEAK_MINUTES) * 2.0 / dia / 60.0 / (END_MINUTES - PEAK_MINUTES)),
        }
    } else {
        InsulinOnBoard::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SensitivityProfile;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 6, 13)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn snapshot(current_basal: f64) -> ProfileSnapshot {
        SensitivityProfile::new(50.0, 1.0).snapshot(current_basal)
    }

    #[test]
    fn test_activity_peaks_at_75_minutes() {
        let history = DoseHistory::new(vec![Dose::Bolus { time: at(10, 0), units: 1.0 }]);
        let peak = history.estimate(&snapshot(1.0), at(11, 15));
        // 2 / 3 / 60 U/min at the peak for a 3 hour dia
        assert!((peak.activity - 2.0 / 180.0).abs() < 1e-9);

        let early = history.estimate(&snapshot(1.0), at(10, 30));
        let late = history.estimate(&snapshot(1.0), at(12, 30));
        assert!(early.activity < peak.activity);
        assert!(late.activity < peak.activity);
    }

    #[test]
    fn test_activity_ends_after_dia() {
        let history = DoseHistory::new(vec![Dose::Bolus { time: at(10, 0), units: 2.0 }]);
        let after = history.estimate(&snapshot(1.0), at(13, 5));
        assert_eq!(after, InsulinOnBoard::default());
    }

    #[test]
    fn test_future_doses_ignored() {
        let history = DoseHistory::new(vec![Dose::Bolus { time: at(12, 0), units: 3.0 }]);
        let before = history.estimate(&snapshot(1.0), at(11, 0));
        assert_eq!(before.activity, 0.0);
        assert_eq!(before.iob, 0.0);
    }

    #[test]
    fn test_iob_starts_at_full_dose() {
        let history = DoseHistory::new(vec![Dose::Bolus { time: at(10, 0), units: 2.0 }]);
        let now = history.estimate(&snapshot(1.0), at(10, 0));
        assert!((now.iob - 2.0).abs() < 1e-9);
        assert_eq!(now.activity, 0.0);
    }

    #[test]
    fn test_temp_basal_net_of_scheduled_rate() {
        let history = DoseHistory::new(vec![Dose::TempBasal {
            time: at(10, 0),
            rate: 2.0,
            duration_minutes: 30.0,
        }]);

        // 1 U/hr above schedule for 30 minutes = 0.5 U as ten 0.05 U boluses
        let events = history.insulin_events(1.0);
        assert_eq!(events.len(), 10);
        assert!(events.iter().all(|(_, units)| (*units - 0.05).abs() < 1e-12));
        assert_eq!(events[1].0, at(10, 3));

        // matching the scheduled rate delivers no net insulin
        assert!(history.insulin_events(2.0).is_empty());
    }

    #[test]
    fn test_low_temp_gives_negative_activity() {
        let history = DoseHistory::new(vec![Dose::TempBasal {
            time: at(10, 0),
            rate: 0.0,
            duration_minutes: 60.0,
        }]);
        let estimate = history.estimate(&snapshot(1.0), at(11, 0));
        assert!(estimate.activity < 0.0);
        assert!(estimate.iob < 0.0);
    }

    #[test]
    fn test_longer_dia_flattens_curve() {
        let history = DoseHistory::new(vec![Dose::Bolus { time: at(10, 0), units: 1.0 }]);
        let mut profile = snapshot(1.0);
        profile.dia = 4.0;
        let estimate = history.estimate(&profile, at(12, 30));
        // still active at 150 minutes with a 4 hour dia
        assert!(estimate.activity > 0.0);
    }

    #[test]
    fn test_activity_falls_to_zero_at_end_of_longer_dia() {
        let history = DoseHistory::new(vec![Dose::Bolus { time: at(10, 0), units: 1.0 }]);
        let mut profile = snapshot(1.0);
        profile.dia = 4.0;

        // peak at 100 minutes for a 4 hour dia
        let peak = history.estimate(&profile, at(11, 40));
        assert!((peak.activity - 2.0 / 240.0).abs() < 1e-9);

        // 239 minutes is 179.25 scaled minutes, one minute before the curve ends
        let almost_done = history.estimate(&profile, at(13, 59));
        assert!(almost_done.activity > 0.0);
        assert!(almost_done.activity < 1e-4);

        let done = history.estimate(&profile, at(14, 0));
        assert_eq!(done.activity, 0.0);
    }
}
