//! Core types for the DDP Convert pipeline
//!
//! This module defines the data structures that flow through each stage of the
//! pipeline: extracted activity records, the normalized dataset, monthly
//! aggregates, the engagement estimate, and export files.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ConvertError;

/// Column holding the parsed activity timestamp
pub const DATE_COLUMN: &str = "Date";

/// Column holding the category tag
pub const SOURCE_COLUMN: &str = "Source";

/// Column holding seconds elapsed since the previous row
pub const TIME_DIFF_COLUMN: &str = "TimeDiff";

/// Columns the pipeline owns; source fields with these names are not repeated
pub const RESERVED_COLUMNS: [&str; 3] = [DATE_COLUMN, SOURCE_COLUMN, TIME_DIFF_COLUMN];

/// Activity category an extracted record came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "video_history", alias = "browsing")]
    Browsing,
    #[serde(alias = "favorite_video", alias = "favorite")]
    Favorite,
    #[serde(alias = "item_favorite", alias = "liked")]
    Liked,
}

impl Category {
    /// All categories in extraction order
    pub const ALL: [Category; 3] = [Category::Browsing, Category::Favorite, Category::Liked];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Browsing => "Browsing",
            Category::Favorite => "Favorite",
            Category::Liked => "Liked",
        }
    }

    /// Identifier used by the upload form checklist
    pub fn selection_id(&self) -> &'static str {
        match self {
            Category::Browsing => "video_history",
            Category::Favorite => "favorite_video",
            Category::Liked => "item_favorite",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ConvertError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle) || c.selection_id() == needle)
            .ok_or_else(|| ConvertError::UnknownCategory(s.to_string()))
    }
}

/// One user action as found in the export package
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Fields exactly as present in the source entry
    pub fields: Map<String, Value>,
    /// Category that produced this record
    pub source_category: Category,
}

impl ActivityRecord {
    pub fn new(fields: Map<String, Value>, source_category: Category) -> Self {
        Self {
            fields,
            source_category,
        }
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// Parsed activity timestamp, kept in the offset the source gave
///
/// Timestamps without an offset are pinned to UTC+00:00 without conversion,
/// so their wall-clock value is the one written in the export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceTimestamp {
    pub at: DateTime<FixedOffset>,
    /// Whether the source string carried an explicit offset
    pub has_offset: bool,
}

impl SourceTimestamp {
    pub fn with_offset(at: DateTime<FixedOffset>) -> Self {
        Self {
            at,
            has_offset: true,
        }
    }

    pub fn naive(local: NaiveDateTime) -> Self {
        Self {
            at: Utc.from_utc_datetime(&local).into(),
            has_offset: false,
        }
    }

    /// Wall-clock time as written in the source
    pub fn local(&self) -> NaiveDateTime {
        self.at.naive_local()
    }

    /// Calendar month label, e.g. "2024-03"
    pub fn year_month(&self) -> String {
        self.local().format("%Y-%m").to_string()
    }
}

impl fmt::Display for SourceTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_offset {
            write!(f, "{}", self.at.format("%Y-%m-%d %H:%M:%S%.f%:z"))
        } else {
            write!(f, "{}", self.at.format("%Y-%m-%d %H:%M:%S%.f"))
        }
    }
}

/// One row of the normalized dataset
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    /// Source fields of this row; fields other rows have but this one lacks are absent
    pub fields: Map<String, Value>,
    pub source_category: Category,
    pub date: SourceTimestamp,
    /// Seconds since the previous row's date (None for the first row)
    pub time_diff_sec: Option<f64>,
}

impl NormalizedRow {
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }
}

/// A record excluded during normalization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Position of the record in extraction order
    pub position: usize,
    pub source_category: Category,
    pub reason: String,
}

/// The unified, time-ordered activity table
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NormalizedDataset {
    /// Union of source field names in first-seen order, reserved names excluded
    pub columns: Vec<String>,
    /// Rows sorted ascending by date
    pub rows: Vec<NormalizedRow>,
    /// Records dropped because their date was missing or unparseable
    pub rejected: Vec<RejectedRecord>,
    /// Categories selected for this extraction
    pub categories: Vec<Category>,
}

impl NormalizedDataset {
    /// An empty dataset for the given selection
    pub fn empty(categories: &[Category]) -> Self {
        Self {
            categories: categories.to_vec(),
            ..Default::default()
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rejected_count(&self) -> usize {
        self.rejected.len()
    }

    /// Full header: source columns followed by the pipeline-owned columns
    pub fn header(&self) -> Vec<String> {
        self.columns
            .iter()
            .cloned()
            .chain(RESERVED_COLUMNS.iter().map(|c| c.to_string()))
            .collect()
    }
}

/// Activity counts for one calendar month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyAggregate {
    /// Month label, e.g. "2024-03"
    pub year_month: String,
    pub total_count: u64,
    /// Count per selected category, zero-filled
    pub per_category_counts: BTreeMap<Category, u64>,
}

/// Session-gap based estimate of time spent per item
///
/// This is a heuristic proxy, not a measured watch time. It undercounts when the
/// true viewing gap exceeds the ceiling and overcounts when several actions
/// share one timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEstimate {
    /// Mean of qualifying gaps; None when no gap qualified
    pub average_seconds: Option<f64>,
    /// Gaps at or below the ceiling
    pub sample_count: usize,
    /// Gaps above the ceiling (session breaks)
    pub excluded_count: usize,
    pub ceiling_sec: f64,
}

impl EngagementEstimate {
    pub fn is_available(&self) -> bool {
        self.average_seconds.is_some()
    }
}

/// An export ready to hand to a download mechanism
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportFile {
    /// Suggested filename
    pub filename: String,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Producer metadata embedded in every report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportProducer {
    pub name: String,
    pub version: String,
    pub instance_id: String,
}

/// Tabular view of the dataset for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    /// Column names in display order
    pub columns: Vec<String>,
    /// One object per row, keyed by column name
    pub records: Vec<Map<String, Value>>,
}

/// Monthly series for a category-stacked bar chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportChart {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub months: Vec<MonthlyAggregate>,
}

/// Presentation report handed to a display layer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionReport {
    pub report_version: String,
    pub producer: ReportProducer,
    pub generated_at_utc: String,
    /// Human-readable status line
    pub status: String,
    pub table: ReportTable,
    pub chart: ReportChart,
    pub engagement: EngagementEstimate,
    pub rejected_records: Vec<RejectedRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn test_category_from_str_accepts_names_and_selection_ids() {
        assert_eq!("Browsing".parse::<Category>().unwrap(), Category::Browsing);
        assert_eq!("liked".parse::<Category>().unwrap(), Category::Liked);
        assert_eq!(
            "favorite_video".parse::<Category>().unwrap(),
            Category::Favorite
        );
        assert!(matches!(
            "Shared".parse::<Category>(),
            Err(ConvertError::UnknownCategory(_))
        ));
    }

    #[test]
    fn test_category_serde_aliases() {
        let parsed: Vec<Category> =
            serde_json::from_str(r#"["video_history", "Favorite", "liked"]"#).unwrap();
        assert_eq!(
            parsed,
            vec![Category::Browsing, Category::Favorite, Category::Liked]
        );
        assert_eq!(
            serde_json::to_string(&Category::Liked).unwrap(),
            "\"Liked\""
        );
    }

    #[test]
    fn test_source_timestamp_display() {
        let local = NaiveDate::from_ymd_opt(2024, 3, 5)
            .unwrap()
            .and_hms_opt(9, 7, 1)
            .unwrap();
        let naive = SourceTimestamp::naive(local);
        assert_eq!(naive.to_string(), "2024-03-05 09:07:01");
        assert_eq!(naive.year_month(), "2024-03");

        let zoned = SourceTimestamp::with_offset(
            DateTime::parse_from_rfc3339("2024-03-31T23:30:00+02:00").unwrap(),
        );
        assert_eq!(zoned.to_string(), "2024-03-31 23:30:00+02:00");
        // Month follows the wall clock, not UTC
        assert_eq!(zoned.year_month(), "2024-03");
    }

    #[test]
    fn test_dataset_header_appends_reserved_columns() {
        let dataset = NormalizedDataset {
            columns: vec!["Link".to_string()],
            ..Default::default()
        };
        assert_eq!(dataset.header(), vec!["Link", "Date", "Source", "TimeDiff"]);
    }
}
