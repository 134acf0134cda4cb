//! Basal schedule lookup

use super::BasalRateLookup;
use crate::error::AutosensError;
use crate::stats::round_to;
use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

/// One segment of a daily basal schedule
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BasalEntry {
    /// Position of the segment within the schedule
    pub index: usize,
    /// Minutes after midnight at which the segment starts
    pub minutes: u32,
    /// Rate (U/hr)
    pub rate: f64,
}

/// Daily basal schedule ordered by segment index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasalSchedule {
    entries: Vec<BasalEntry>,
}

impl BasalSchedule {
    pub fn new(mut entries: Vec<BasalEntry>) -> Result<Self, AutosensError> {
        entries.sort_by_key(|e| e.index);

        let Some(last) = entries.last() else {
            return Err(AutosensError::InvalidBasalSchedule(
                "schedule has no entries".to_string(),
            ));
        };
        if last.rate == 0.0 {
            return Err(AutosensError::InvalidBasalSchedule(
                "final segment has a zero rate".to_string(),
            ));
        }
        if let Some(bad) = entries.iter().find(|e| !(e.rate.is_finite() && e.rate >= 0.0)) {
            return Err(AutosensError::InvalidBasalSchedule(format!(
                "segment {} has invalid rate {}",
                bad.index, bad.rate
            )));
        }

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[BasalEntry] {
        &self.entries
    }
}

impl BasalRateLookup for BasalSchedule {
    fn rate_at(&self, at: NaiveDateTime) -> f64 {
        let now_minutes = at.hour() * 60 + at.minute();

        // Falls back to the final segment, which also covers times before the first start
        let rate = self
            .entries
            .windows(2)
            .find(|pair| now_minutes >= pair[0].minutes && now_minutes < pair[1].minutes)
            .or_else(|| self.entries.last().map(std::slice::from_ref))
            .map(|pair| pair[0].rate)
            .unwrap_or(0.0);

        round_to(rate, 3)
    }
}
