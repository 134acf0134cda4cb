//! Adapter from input documents to pipeline types

use crate::collaborators::{BasalEntry, BasalSchedule, Dose, DoseHistory};
use crate::error::AutosensError;
use crate::schema::records::*;
use crate::types::{GlucoseReading, GlucoseSeries, SensitivityProfile, DEFAULT_DIA_HOURS};
use chrono::{DateTime, NaiveDateTime, NaiveTime, Timelike};
use log::debug;
use std::collections::HashMap;

/// Adapter for converting input documents
pub struct InputAdapter;

impl InputAdapter {
    /// Parse the glucose document without converting it
    pub fn parse_glucose_records(json: &str) -> Result<Vec<GlucoseRecord>, AutosensError> {
        serde_json::from_str(json)
            .map_err(|e| AutosensError::ParseError(format!("glucose data: {}", e)))
    }

    /// Convert glucose records, keeping their order
    pub fn to_glucose_series(records: &[GlucoseRecord]) -> Result<GlucoseSeries, AutosensError> {
        records
            .iter()
            .enumerate()
            .map(|(index, record)| {
                let glucose = record.value().ok_or_else(|| {
                    AutosensError::MissingField(format!("glucose (entry {})", index))
                })?;
                let timestamp = glucose_time(record).ok_or_else(|| {
                    AutosensError::MissingField(format!(
                        "display_time, dateString or date (entry {})",
                        index
                    ))
                })??;
                Ok(GlucoseReading { timestamp, glucose })
            })
            .collect::<Result<Vec<_>, _>>()
            .map(GlucoseSeries::new)
    }

    /// Parse the pump history document into a dose history.
    ///
    /// Temporary basals are paired with the duration record sharing their
    /// timestamp. Record types that carry no insulin are ignored.
    pub fn parse_dose_history(json: &str) -> Result<DoseHistory, AutosensError> {
        let records: Vec<PumpHistoryRecord> = serde_json::from_str(json)
            .map_err(|e| AutosensError::ParseError(format!("pump history: {}", e)))?;

        let durations: HashMap<&str, f64> = records
            .iter()
            .filter(|r| r.kind == record_kind::TEMP_BASAL_DURATION)
            .filter_map(|r| Some((r.timestamp.as_deref()?, r.duration_minutes?)))
            .collect();

        let mut doses = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match record.kind.as_str() {
                record_kind::BOLUS => {
                    let units = record.amount.ok_or_else(|| {
                        AutosensError::MissingField(format!(
                            "amount (pump history entry {})",
                            index
                        ))
                    })?;
                    doses.push(Dose::Bolus {
                        time: record_time(record, index)?,
                        units,
                    });
                }
                record_kind::TEMP_BASAL => {
                    if record.temp.as_deref() == Some("percent") {
                        debug!("ignoring percent temp basal at entry {}", index);
                        continue;
                    }
                    let rate = record.rate.ok_or_else(|| {
                        AutosensError::MissingField(format!("rate (pump history entry {})", index))
                    })?;
                    let time = record_time(record, index)?;
                    let Some(&duration_minutes) =
                        record.timestamp.as_deref().and_then(|t| durations.get(t))
                    else {
                        debug!("temp basal at entry {} has no duration record", index);
                        continue;
                    };
                    doses.push(Dose::TempBasal {
                        time,
                        rate,
                        duration_minutes,
                    });
                }
                record_kind::TEMP_BASAL_DURATION => {}
                other => debug!("ignoring pump history record {} ({})", index, other),
            }
        }

        Ok(DoseHistory::new(doses))
    }

    /// Check that the ISF document is expressed in mg/dL
    pub fn check_isf_units(json: &str) -> Result<IsfRecord, AutosensError> {
        let record: IsfRecord = serde_json::from_str(json)
            .map_err(|e| AutosensError::ParseError(format!("insulin sensitivities: {}", e)))?;
        match record.units.as_deref() {
            Some(ISF_UNITS) => Ok(record),
            Some(other) => Err(AutosensError::UnsupportedUnits(other.to_string())),
            None => Err(AutosensError::UnsupportedUnits("no units".to_string())),
        }
    }

    pub fn parse_basal_schedule(json: &str) -> Result<BasalSchedule, AutosensError> {
        let records: Vec<BasalProfileRecord> = serde_json::from_str(json)
            .map_err(|e| AutosensError::ParseError(format!("basal profile: {}", e)))?;

        let entries = records
            .iter()
            .enumerate()
            .map(|(position, record)| {
                let minutes = match (record.minutes, record.start.as_deref()) {
                    (Some(minutes), _) => minutes,
                    (None, Some(start)) => start_minutes(start)?,
                    (None, None) => {
                        return Err(AutosensError::MissingField(format!(
                            "minutes or start (basal entry {})",
                            position
                        )))
                    }
                };
                Ok(BasalEntry {
                    index: record.i.unwrap_or(position),
                    minutes,
                    rate: record.rate,
                })
            })
            .collect::<Result<Vec<_>, AutosensError>>()?;

        BasalSchedule::new(entries)
    }

    pub fn parse_profile(json: &str) -> Result<SensitivityProfile, AutosensError> {
        let record: ProfileRecord = serde_json::from_str(json)
            .map_err(|e| AutosensError::ParseError(format!("profile: {}", e)))?;

        let profile = SensitivityProfile {
            sensitivity_factor: record
                .sens
                .ok_or_else(|| AutosensError::MissingField("sens".to_string()))?,
            max_daily_basal: record
                .max_daily_basal
                .ok_or_else(|| AutosensError::MissingField("max_daily_basal".to_string()))?,
            dia: record.dia.unwrap_or(DEFAULT_DIA_HOURS),
        };
        profile.validate()?;
        Ok(profile)
    }
}

/// Parse a wall-clock timestamp.
///
/// Accepts RFC 3339, ISO 8601 with or without an offset, and a space in place
/// of the `T` separator. Offsets are applied and then dropped, leaving the
/// local wall-clock time.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, AutosensError> {
    let trimmed = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.naive_local());
    }

    let normalized = trimmed.replacen(' ', "T", 1);
    if let Ok(dt) = DateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Ok(dt.naive_local());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Ok(dt);
        }
    }

    Err(AutosensError::DateParseError(raw.to_string()))
}

fn glucose_time(record: &GlucoseRecord) -> Option<Result<NaiveDateTime, AutosensError>> {
    if let Some(display_time) = &record.display_time {
        return Some(parse_timestamp(display_time));
    }
    if let Some(date_string) = &record.date_string {
        return Some(parse_timestamp(date_string));
    }
    record.date.map(|millis| {
        DateTime::from_timestamp_millis(millis as i64)
            .map(|dt| dt.naive_utc())
            .ok_or_else(|| AutosensError::DateParseError(format!("epoch millis {}", millis)))
    })
}

fn record_time(record: &PumpHistoryRecord, index: usize) -> Result<NaiveDateTime, AutosensError> {
    let raw = record.timestamp.as_deref().ok_or_else(|| {
        AutosensError::MissingField(format!("timestamp (pump history entry {})", index))
    })?;
    parse_timestamp(raw)
}

fn start_minutes(start: &str) -> Result<u32, AutosensError> {
    NaiveTime::parse_from_str(start, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(start, "%H:%M"))
        .map(|t| t.hour() * 60 + t.minute())
        .map_err(|_| AutosensError::DateParseError(format!("basal start {}", start)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::BasalRateLookup;
    use chrono::NaiveDate;

    fn at(hour: u32, minute: u32, second: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2016, 6, 13)
            .unwrap()
            .and_hms_opt(hour, minute, second)
            .unwrap()
    }

    #[test]
    fn test_parse_timestamp_formats() {
        assert_eq!(parse_timestamp("2016-06-13T12:59:48").unwrap(), at(12, 59, 48));
        assert_eq!(parse_timestamp("2016-06-13 12:59:48").unwrap(), at(12, 59, 48));
        assert_eq!(parse_timestamp("2016-06-13T12:59:48-07:00").unwrap(), at(12, 59, 48));
        assert_eq!(parse_timestamp("2016-06-13T12:59:48.000Z").unwrap(), at(12, 59, 48));
        assert_eq!(parse_timestamp("2016-06-13T12:59:48-0700").unwrap(), at(12, 59, 48));
        assert_eq!(parse_timestamp("2016-06-13T12:59").unwrap(), at(12, 59, 0));
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(AutosensError::DateParseError(_))
        ));
    }

    #[test]
    fn test_glucose_series_from_records() {
        let json = r#"[
            {"glucose": 120, "display_time": "2016-06-13T12:10:00", "dateString": "2016-06-13T19:10:00Z"},
            {"sgv": 115, "dateString": "2016-06-13T12:05:00-07:00"},
            {"glucose": 110, "date": 1465819200000}
        ]"#;
        let records = InputAdapter::parse_glucose_records(json).unwrap();
        let series = InputAdapter::to_glucose_series(&records).unwrap();

        let readings = series.readings();
        assert_eq!(readings.len(), 3);
        // display_time wins over dateString
        assert_eq!(readings[0].timestamp, at(12, 10, 0));
        assert_eq!(readings[1].glucose, 115.0);
        assert_eq!(readings[1].timestamp, at(12, 5, 0));
        assert_eq!(readings[2].timestamp, at(12, 0, 0));
    }

    #[test]
    fn test_glucose_without_time_is_missing_field() {
        let records = InputAdapter::parse_glucose_records(r#"[{"glucose": 120}]"#).unwrap();
        assert!(matches!(
            InputAdapter::to_glucose_series(&records),
            Err(AutosensError::MissingField(_))
        ));
    }

    #[test]
    fn test_glucose_not_an_array() {
        assert!(matches!(
            InputAdapter::parse_glucose_records(r#"{"glucose": 120}"#),
            Err(AutosensError::ParseError(_))
        ));
    }

    #[test]
    fn test_dose_history_pairs_temp_basal_durations() {
        let json = r#"[
            {"_type": "Bolus", "amount": 1.5, "timestamp": "2016-06-13T11:00:00"},
            {"_type": "TempBasalDuration", "duration (min)": 30, "timestamp": "2016-06-13T11:30:00"},
            {"_type": "TempBasal", "temp": "absolute", "rate": 0.5, "timestamp": "2016-06-13T11:30:00"},
            {"_type": "TempBasal", "temp": "absolute", "rate": 2.0, "timestamp": "2016-06-13T11:45:00"},
            {"_type": "TempBasal", "temp": "percent", "rate": 150, "timestamp": "2016-06-13T11:50:00"},
            {"_type": "BGReceived", "amount": 140, "timestamp": "2016-06-13T11:55:00"}
        ]"#;
        let history = InputAdapter::parse_dose_history(json).unwrap();

        assert_eq!(
            history.doses(),
            &[
                Dose::Bolus { time: at(11, 0, 0), units: 1.5 },
                Dose::TempBasal {
                    time: at(11, 30, 0),
                    rate: 0.5,
                    duration_minutes: 30.0,
                },
            ]
        );
    }

    #[test]
    fn test_bolus_without_amount_rejected() {
        let json = r#"[{"_type": "Bolus", "timestamp": "2016-06-13T11:00:00"}]"#;
        assert!(matches!(
            InputAdapter::parse_dose_history(json),
            Err(AutosensError::MissingField(_))
        ));
    }

    #[test]
    fn test_isf_units() {
        let isf = r#"{"units": "mg/dL", "sensitivities": []}"#;
        assert!(InputAdapter::check_isf_units(isf).is_ok());
        assert!(matches!(
            InputAdapter::check_isf_units(r#"{"units": "mmol/L"}"#),
            Err(AutosensError::UnsupportedUnits(units)) if units == "mmol/L"
        ));
        assert!(matches!(
            InputAdapter::check_isf_units("{}"),
            Err(AutosensError::UnsupportedUnits(_))
        ));
    }

    #[test]
    fn test_basal_schedule_from_start_strings() {
        let json = r#"[
            {"i": 0, "start": "00:00:00", "rate": 0.9},
            {"i": 1, "start": "06:30:00", "rate": 1.1},
            {"i": 2, "start": "22:00:00", "minutes": 1320, "rate": 0.8}
        ]"#;
        let schedule = InputAdapter::parse_basal_schedule(json).unwrap();
        assert_eq!(schedule.entries()[1].minutes, 390);
        assert_eq!(schedule.rate_at(at(6, 29, 0)), 0.9);
        assert_eq!(schedule.rate_at(at(6, 30, 0)), 1.1);
        assert_eq!(schedule.rate_at(at(23, 0, 0)), 0.8);
    }

    #[test]
    fn test_basal_schedule_missing_start() {
        assert!(matches!(
            InputAdapter::parse_basal_schedule(r#"[{"rate": 1.0}]"#),
            Err(AutosensError::MissingField(_))
        ));
    }

    #[test]
    fn test_profile_defaults_dia() {
        let json = r#"{"sens": 45, "max_daily_basal": 1.3, "current_basal": 0.9}"#;
        let profile = InputAdapter::parse_profile(json).unwrap();
        assert_eq!(profile.sensitivity_factor, 45.0);
        assert_eq!(profile.max_daily_basal, 1.3);
        assert_eq!(profile.dia, DEFAULT_DIA_HOURS);
    }

    #[test]
    fn test_profile_missing_sens() {
        assert!(matches!(
            InputAdapter::parse_profile(r#"{"max_daily_basal": 1.3}"#),
            Err(AutosensError::MissingField(_))
        ));
    }
}
