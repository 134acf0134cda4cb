//! Raw input records
//!
//! Field names follow the pump and CGM export formats, so most fields are
//! optional and renamed.

use serde::{Deserialize, Serialize};

/// Units the ISF record must declare
pub const ISF_UNITS: &str = "mg/dL";

/// One entry of the glucose document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlucoseRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glucose: Option<f64>,

    /// Nightscout sensor glucose value, used when `glucose` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sgv: Option<f64>,

    /// Receiver display time (wall clock)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_time: Option<String>,

    #[serde(
        default,
        rename = "dateString",
        skip_serializing_if = "Option::is_none"
    )]
    pub date_string: Option<String>,

    /// Epoch milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<f64>,
}

impl GlucoseRecord {
    pub fn value(&self) -> Option<f64> {
        self.glucose.or(self.sgv)
    }
}

/// One entry of the pump history document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PumpHistoryRecord {
    #[serde(rename = "_type")]
    pub kind: String,

    #[serde(default)]
    pub timestamp: Option<String>,

    /// Bolus amount (U)
    #[serde(default)]
    pub amount: Option<f64>,

    /// Temporary basal rate (U/hr or percent, see `temp`)
    #[serde(default)]
    pub rate: Option<f64>,

    /// "absolute" or "percent"
    #[serde(default)]
    pub temp: Option<String>,

    #[serde(default, rename = "duration (min)")]
    pub duration_minutes: Option<f64>,
}

/// Pump history record types the adapter understands
pub mod record_kind {
    pub const BOLUS: &str = "Bolus";
    pub const TEMP_BASAL: &str = "TempBasal";
    pub const TEMP_BASAL_DURATION: &str = "TempBasalDuration";
}

/// The insulin sensitivity document; only the units are checked
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsfRecord {
    #[serde(default)]
    pub units: Option<String>,

    #[serde(default)]
    pub sensitivities: Vec<serde_json::Value>,
}

/// One segment of the basal profile document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BasalProfileRecord {
    #[serde(default)]
    pub i: Option<usize>,

    /// Start time of day, "HH:MM:SS"
    #[serde(default)]
    pub start: Option<String>,

    /// Start as minutes after midnight
    #[serde(default)]
    pub minutes: Option<u32>,

    pub rate: f64,
}

/// The profile document; unknown fields are ignored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileRecord {
    #[serde(default, alias = "sensitivityFactor")]
    pub sens: Option<f64>,

    #[serde(default, alias = "maxDailyBasal")]
    pub max_daily_basal: Option<f64>,

    /// Duration of insulin action (hours)
    #[serde(default)]
    pub dia: Option<f64>,
}
