//! Autosens - insulin sensitivity detection from glucose history
//!
//! Autosens compares observed glucose changes with the changes predicted from
//! insulin activity and turns the distribution of the differences into a
//! sensitivity ratio: deviation computation → percentile statistics → ratio
//! derivation → report encoding.
//!
//! A ratio below 1.0 means the body is more sensitive to insulin than the
//! profile assumes; above 1.0 means more resistant. Ratios are clamped to the
//! configured bounds, `[0.5, 2.0]` by default.

pub mod collaborators;
pub mod config;
pub mod deviation;
pub mod error;
pub mod pipeline;
pub mod ratio;
pub mod report;
pub mod schema;
pub mod stats;
pub mod types;

pub use collaborators::{BasalRateLookup, BasalSchedule, DoseHistory, InsulinActivityEstimator};
pub use config::AutosensConfig;
pub use error::AutosensError;
pub use pipeline::{detect_sensitivity, AutosensInputs, AutosensProcessor};
pub use stats::SortedSeries;
pub use types::{AutosensReport, Classification, SensitivityResult};

/// Autosens version embedded in every report
pub const AUTOSENS_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "autosens";
