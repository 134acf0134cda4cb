//! Collaborators queried by the deviation stage
//!
//! The deviation stage needs two facts per evaluated timestamp: the scheduled
//! basal rate and the residual insulin activity. Both are expressed as traits
//! over the collaborator's own data and the query time, so the core never
//! depends on how they are computed.

mod basal;
mod iob;

pub use basal::{BasalEntry, BasalSchedule};
pub use iob::{Dose, DoseHistory};

use crate::types::{InsulinOnBoard, ProfileSnapshot};
use chrono::NaiveDateTime;

/// Scheduled basal rate lookup by time of day
pub trait BasalRateLookup {
    /// Basal rate (U/hr) active at `at`
    fn rate_at(&self, at: NaiveDateTime) -> f64;
}

/// Residual insulin estimation from dosing history
pub trait InsulinActivityEstimator {
    /// Insulin on board and activity at `at`, given the profile in force then
    fn estimate(&self, profile: &ProfileSnapshot, at: NaiveDateTime) -> InsulinOnBoard;
}
