//! Report encoding
//!
//! Builds the structured report for a run and renders its two outputs: the
//! `{"ratio": n}` result document and the human-readable diagnostic lines.

use crate::deviation::DeviationSeries;
use crate::error::AutosensError;
use crate::stats::SortedSeries;
use crate::types::{
    AutosensReport, GlucoseSeries, PercentileRow, Producer, RatioAnalysis,
};
use crate::{AUTOSENS_VERSION, PRODUCER_NAME};
use chrono::Utc;
use uuid::Uuid;

/// First (highest) percentile of the diagnostic table
pub const TABLE_START: f64 = 0.60;
/// Distance between table rows
pub const TABLE_STEP: f64 = 0.02;
/// Rows from p=0.60 down to p=0.26
pub const TABLE_ROWS: usize = 18;

/// Percentile table of average delta, BGI and deviation
pub fn percentile_rows(
    average_deltas: &SortedSeries,
    bgis: &SortedSeries,
    deviations: &SortedSeries,
) -> Result<Vec<PercentileRow>, AutosensError> {
    (0..TABLE_ROWS)
        .map(|row| {
            let p = TABLE_START - TABLE_STEP * row as f64;
            Ok(PercentileRow {
                p,
                average_delta: average_deltas.percentile(p)?,
                bgi: bgis.percentile(p)?,
                deviation: deviations.percentile(p)?,
            })
        })
        .collect()
}

/// Report encoder carrying the producer identity of this process
pub struct ReportEncoder {
    instance_id: String,
}

impl Default for ReportEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl ReportEncoder {
    /// Create a new encoder with a unique instance ID
    pub fn new() -> Self {
        Self {
            instance_id: Uuid::new_v4().to_string(),
        }
    }

    /// Create an encoder with a specific instance ID
    pub fn with_instance_id(instance_id: String) -> Self {
        Self { instance_id }
    }

    pub fn encode(
        &self,
        series: &GlucoseSeries,
        deviations: DeviationSeries,
        percentiles: Vec<PercentileRow>,
        analysis: RatioAnalysis,
    ) -> AutosensReport {
        AutosensReport {
            producer: Producer {
                name: PRODUCER_NAME.to_string(),
                version: AUTOSENS_VERSION.to_string(),
                instance_id: self.instance_id.clone(),
            },
            computed_at_utc: Utc::now().to_rfc3339(),
            readings: series.len(),
            latest_glucose: series.latest().copied(),
            pairs: deviations.into_pairs(),
            percentiles,
            result: analysis.result(),
            analysis,
        }
    }
}

/// The result document, `{"ratio": n}`
pub fn result_json(report: &AutosensReport) -> Result<String, AutosensError> {
    serde_json::to_string(&report.result).map_err(AutosensError::JsonError)
}

/// The full report as pretty-printed JSON
pub fn report_json(report: &AutosensReport) -> Result<String, AutosensError> {
    serde_json::to_string_pretty(report).map_err(AutosensError::JsonError)
}

/// One marker per comparison pair: `.` used, `!` skipped
pub fn progress_markers(report: &AutosensReport) -> String {
    report.pairs.iter().map(|pair| pair.marker()).collect()
}

/// Percentile table and summary lines for the diagnostic channel
pub fn diagnostic_lines(report: &AutosensReport) -> Vec<String> {
    let analysis = &report.analysis;
    let mut lines: Vec<String> = report
        .percentiles
        .iter()
        .map(|row| {
            format!(
                "p={:.2}: {:.2}, {:.2}, {:.2}",
                row.p, row.average_delta, row.bgi, row.deviation
            )
        })
        .collect();

    lines.push(match analysis.mean_deviation {
        Some(mean) => format!("Mean deviation: {:.2}", mean),
        None => "Mean deviation: n/a".to_string(),
    });
    lines.push(analysis.classification.message().to_string());
    lines.push(format!("Basal adjustment {:.2}U/hr", analysis.basal_offset));
    lines.push(format!(
        "Ratio: {:.0}%: new ISF: {:.1}mg/dL/U",
        analysis.ratio * 100.0,
        analysis.new_sensitivity_factor
    ));

    lines
}
