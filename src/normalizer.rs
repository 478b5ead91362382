//! Dataset normalization
//!
//! Turns extracted records into one time-ordered table:
//! - Union of source fields across categories
//! - Parsed `Date` per row; rows without a usable date are rejected and reported
//! - Stable ascending sort by date
//! - `TimeDiff` between consecutive rows

use crate::config::{PipelineConfig, DEFAULT_DATE_FORMATS};
use crate::error::ConvertError;
use crate::types::{
    ActivityRecord, Category, NormalizedDataset, NormalizedRow, RejectedRecord, SourceTimestamp,
    DATE_COLUMN, RESERVED_COLUMNS,
};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;
use tracing::{debug, warn};

/// Offset-aware formats tried after RFC 3339
const OFFSET_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// Normalizer for converting extracted records into a dataset
#[derive(Debug, Clone)]
pub struct DatasetNormalizer {
    date_formats: Vec<String>,
}

impl Default for DatasetNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect())
    }
}

impl DatasetNormalizer {
    /// Create a normalizer trying the given naive date formats in order
    pub fn new(date_formats: Vec<String>) -> Self {
        Self { date_formats }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.date_formats.clone())
    }

    /// Normalize records extracted for `categories`
    pub fn normalize(
        &self,
        records: Vec<ActivityRecord>,
        categories: &[Category],
    ) -> NormalizedDataset {
        let mut rows = Vec::with_capacity(records.len());
        let mut rejected = Vec::new();

        for (position, record) in records.into_iter().enumerate() {
            let parsed = match record.field(DATE_COLUMN) {
                Some(value) => parse_activity_date(value, &self.date_formats),
                None => Err(ConvertError::DateParseError(format!(
                    "missing {} field",
                    DATE_COLUMN
                ))),
            };

            match parsed {
                Ok(date) => rows.push(NormalizedRow {
                    fields: record.fields,
                    source_category: record.source_category,
                    date,
                    time_diff_sec: None,
                }),
                Err(e) => rejected.push(RejectedRecord {
                    position,
                    source_category: record.source_category,
                    reason: e.to_string(),
                }),
            }
        }

        if !rejected.is_empty() {
            warn!(
                rejected = rejected.len(),
                kept = rows.len(),
                "excluded records without a usable date"
            );
        }

        let columns = collect_columns(&rows);

        // sort_by_key is stable: equal dates keep extraction order
        rows.sort_by_key(|row| row.date.at);
        fill_time_diffs(&mut rows);

        debug!(rows = rows.len(), columns = columns.len(), "normalized dataset");

        NormalizedDataset {
            columns,
            rows,
            rejected,
            categories: categories.to_vec(),
        }
    }
}

/// Parse a `Date` value, keeping whatever offset the source gave
pub fn parse_activity_date(
    value: &Value,
    date_formats: &[String],
) -> Result<SourceTimestamp, ConvertError> {
    let raw = match value {
        Value::String(s) => s.trim(),
        Value::Null => {
            return Err(ConvertError::DateParseError(format!(
                "{} is null",
                DATE_COLUMN
            )))
        }
        other => {
            return Err(ConvertError::DateParseError(format!(
                "expected a string, found {}",
                other
            )))
        }
    };

    if raw.is_empty() {
        return Err(ConvertError::DateParseError(format!(
            "{} is empty",
            DATE_COLUMN
        )));
    }

    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Ok(SourceTimestamp::with_offset(at));
    }

    for format in OFFSET_DATE_FORMATS {
        if let Ok(at) = DateTime::parse_from_str(raw, format) {
            return Ok(SourceTimestamp::with_offset(at));
        }
    }

    for format in date_formats {
        if let Ok(local) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(SourceTimestamp::naive(local));
        }
    }

    // Date-only values mean midnight
    if let Some(local) = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
    {
        return Ok(SourceTimestamp::naive(local));
    }

    Err(ConvertError::DateParseError(format!(
        "unrecognised date '{}'",
        raw
    )))
}

/// Union of field names in first-seen order, pipeline-owned names excluded
fn collect_columns(rows: &[NormalizedRow]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for row in rows {
        for name in row.fields.keys() {
            if RESERVED_COLUMNS.contains(&name.as_str()) || columns.contains(name) {
                continue;
            }
            columns.push(name.clone());
        }
    }
    columns
}

/// Seconds between each row and the previous one
fn fill_time_diffs(rows: &mut [NormalizedRow]) {
    for i in 1..rows.len() {
        let gap = rows[i].date.at - rows[i - 1].date.at;
        rows[i].time_diff_sec = Some(match gap.num_nanoseconds() {
            Some(nanos) => nanos as f64 / 1e9,
            // Beyond ~292 years nanoseconds overflow i64
            None => gap.num_milliseconds() as f64 / 1000.0,
        });
    }
}
