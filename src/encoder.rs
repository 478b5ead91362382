//! Report encoding
//!
//! This module encodes a normalized dataset and its derived results into the
//! JSON report a display layer consumes: table rows and columns, the monthly
//! chart series, the engagement estimate and any rejected records.

use crate::engagement::status_line;
use crate::error::ConvertError;
use crate::types::{
    ConversionReport, EngagementEstimate, MonthlyAggregate, NormalizedDataset, NormalizedRow,
    ReportChart, ReportProducer, ReportTable, DATE_COLUMN, SOURCE_COLUMN, TIME_DIFF_COLUMN,
};
use crate::{CONVERTER_VERSION, PRODUCER_NAME};
use chrono::Utc;
use serde_json::{Map, Value};
use uuid::Uuid;

/// Current report schema version
pub const REPORT_VERSION: &str = "1.0.0";

/// Title of the monthly activity chart
pub const CHART_TITLE: &str = "Watched Videos per Month";

/// Report encoder for producing display payloads
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

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Encode pipeline results into a report
    pub fn encode(
        &self,
        dataset: &NormalizedDataset,
        monthly: &[MonthlyAggregate],
        engagement: &EngagementEstimate,
    ) -> ConversionReport {
        let producer = ReportProducer {
            name: PRODUCER_NAME.to_string(),
            version: CONVERTER_VERSION.to_string(),
            instance_id: self.instance_id.clone(),
        };

        let status = if dataset.is_empty() {
            crate::pipeline::NO_ACTIVITY_STATUS.to_string()
        } else {
            status_line(engagement)
        };

        ConversionReport {
            report_version: REPORT_VERSION.to_string(),
            producer,
            generated_at_utc: Utc::now().to_rfc3339(),
            status,
            table: self.build_table(dataset),
            chart: ReportChart {
                title: CHART_TITLE.to_string(),
                x_label: "Month".to_string(),
                y_label: "Number of Videos".to_string(),
                months: monthly.to_vec(),
            },
            engagement: engagement.clone(),
            rejected_records: dataset.rejected.clone(),
        }
    }

    /// Encode to JSON string
    pub fn encode_to_json(
        &self,
        dataset: &NormalizedDataset,
        monthly: &[MonthlyAggregate],
        engagement: &EngagementEstimate,
    ) -> Result<String, ConvertError> {
        let report = self.encode(dataset, monthly, engagement);
        serde_json::to_string(&report).map_err(|e| ConvertError::EncodingError(e.to_string()))
    }

    /// Encode to pretty-printed JSON string
    pub fn encode_to_json_pretty(
        &self,
        dataset: &NormalizedDataset,
        monthly: &[MonthlyAggregate],
        engagement: &EngagementEstimate,
    ) -> Result<String, ConvertError> {
        let report = self.encode(dataset, monthly, engagement);
        serde_json::to_string_pretty(&report)
            .map_err(|e| ConvertError::EncodingError(e.to_string()))
    }

    fn build_table(&self, dataset: &NormalizedDataset) -> ReportTable {
        ReportTable {
            columns: dataset.header(),
            records: dataset
                .rows
                .iter()
                .map(|row| build_record(&dataset.columns, row))
                .collect(),
        }
    }
}

/// Row as a display record; source values keep their JSON type
fn build_record(columns: &[String], row: &NormalizedRow) -> Map<String, Value> {
    let mut record = Map::new();

    for name in columns {
        if let Some(value) = row.field(name) {
            record.insert(name.clone(), value.clone());
        }
    }

    record.insert(DATE_COLUMN.to_string(), Value::String(row.date.to_string()));
    record.insert(
        SOURCE_COLUMN.to_string(),
        Value::String(row.source_category.as_str().to_string()),
    );
    record.insert(
        TIME_DIFF_COLUMN.to_string(),
        row.time_diff_sec.map(Value::from).unwrap_or(Value::Null),
    );

    record
}
