//! Percentile statistics
//!
//! Interpolated percentile and its inverse (percent rank) over a sequence that is
//! sorted once at construction. The module knows nothing about glucose or insulin
//! and can be used on any numeric series.

use serde::Serialize;
use std::cmp::Ordering;
use thiserror::Error;

/// Argument errors raised by the statistics functions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StatsError {
    #[error("percentile rank must be a number, got {0}")]
    NonNumericRank(f64),

    #[error("value must be a number, got {0}")]
    NonNumericValue(f64),
}

/// Numeric sequence sorted in ascending order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct SortedSeries {
    values: Vec<f64>,
}

impl SortedSeries {
    /// Sort `values` ascending. Fails if any value is NaN.
    pub fn from_unsorted(mut values: Vec<f64>) -> Result<Self, StatsError> {
        if let Some(&bad) = values.iter().find(|v| v.is_nan()) {
            return Err(StatsError::NonNumericValue(bad));
        }
        values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        Ok(Self { values })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    pub fn min(&self) -> Option<f64> {
        self.values.first().copied()
    }

    pub fn max(&self) -> Option<f64> {
        self.values.last().copied()
    }

    /// Value at fractional rank `p` using linear interpolation between closest ranks.
    ///
    /// `p <= 0` yields the minimum and `p >= 1` the maximum. Otherwise the rank
    /// `len * p` is split into an integer index and a weight that blends that entry
    /// with the next one. An empty series yields 0.
    pub fn percentile(&self, p: f64) -> Result<f64, StatsError> {
        if p.is_nan() {
            return Err(StatsError::NonNumericRank(p));
        }

        let n = self.values.len();
        if n == 0 {
            return Ok(0.0);
        }
        if p <= 0.0 {
            return Ok(self.values[0]);
        }
        if p >= 1.0 {
            return Ok(self.values[n - 1]);
        }

        let index = n as f64 * p;
        let lower = index.floor() as usize;
        let upper = lower + 1;
        let weight = index.fract();

        if upper >= n {
            return Ok(self.values[lower]);
        }
        Ok(self.values[lower] * (1.0 - weight) + self.values[upper] * weight)
    }

    /// Fractional rank at which `value` sits in the series.
    ///
    /// Values at or below the minimum rank 0 and values at or above the maximum
    /// rank 1. An exact match ranks past every entry equal to it. Anything else
    /// takes the index of the next larger entry plus the interpolated fraction of
    /// the gap below it, so `percent_rank(percentile(p))` lands one entry above `p`.
    pub fn percent_rank(&self, value: f64) -> Result<f64, StatsError> {
        if value.is_nan() {
            return Err(StatsError::NonNumericValue(value));
        }

        let n = self.values.len();
        let (Some(min), Some(max)) = (self.min(), self.max()) else {
            return Ok(0.0);
        };
        if value <= min {
            return Ok(0.0);
        }
        if value >= max {
            return Ok(1.0);
        }

        // min < value < max, so 1 <= rank <= n - 1
        let rank = self.values.partition_point(|&x| x < value);
        if self.values[rank] == value {
            let past_equal = self.values.partition_point(|&x| x <= value);
            return Ok(past_equal as f64 / n as f64);
        }

        let below = self.values[rank - 1];
        let above = self.values[rank];
        let fraction = (value - below) / (above - below);
        Ok((rank as f64 + fraction) / n as f64)
    }
}

/// Round `value` to `places` decimal places, halves away from zero.
pub fn round_to(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale).round() / scale
}

/// Round `value` to `places` decimal places, halves toward positive infinity.
///
/// `-0.625` rounds to `-0.62` here but to `-0.63` with [`round_to`].
pub fn round_half_up(value: f64, places: i32) -> f64 {
    let scale = 10f64.powi(places);
    (value * scale + 0.5).floor() / scale
}

impl TryFrom<Vec<f64>> for SortedSeries {
    type Error = StatsError;

    fn try_from(values: Vec<f64>) -> Result<Self, Self::Error> {
        Self::from_unsorted(values)
    }
}
