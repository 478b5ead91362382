//! Pipeline configuration
//!
//! Tunables for extraction, date parsing and the engagement heuristic. Loaded
//! from JSON with every field optional; missing fields take their defaults.

use crate::error::ConvertError;
use crate::types::Category;
use serde::{Deserialize, Serialize};

/// Session-gap ceiling used by the stricter variant of the converter (3 minutes)
pub const SHORT_SESSION_GAP_SEC: f64 = 180.0;

/// Session-gap ceiling used by the shipped converter (10 minutes)
pub const LONG_SESSION_GAP_SEC: f64 = 600.0;

/// Field holding the resource link in every known export version
pub const DEFAULT_LINK_FIELD: &str = "Link";

/// Naive date formats tried after the offset-aware ones
///
/// `%.f` also matches a value with no fractional part.
pub const DEFAULT_DATE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Configuration for a conversion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Categories to extract
    pub categories: Vec<Category>,

    /// Gaps above this many seconds count as session breaks
    pub session_gap_ceiling_sec: f64,

    /// Field exported by the link-only export
    pub link_field: String,

    /// chrono formats for dates without an offset
    pub date_formats: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            categories: Category::ALL.to_vec(),
            session_gap_ceiling_sec: LONG_SESSION_GAP_SEC,
            link_field: DEFAULT_LINK_FIELD.to_string(),
            date_formats: DEFAULT_DATE_FORMATS.iter().map(|f| f.to_string()).collect(),
        }
    }
}

impl PipelineConfig {
    /// Parse and validate a configuration from JSON
    pub fn from_json(json: &str) -> Result<Self, ConvertError> {
        let config: PipelineConfig =
            serde_json::from_str(json).map_err(|e| ConvertError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, ConvertError> {
        serde_json::to_string_pretty(self).map_err(|e| ConvertError::EncodingError(e.to_string()))
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_session_gap_ceiling(mut self, ceiling_sec: f64) -> Self {
        self.session_gap_ceiling_sec = ceiling_sec;
        self
    }

    pub fn with_link_field(mut self, link_field: impl Into<String>) -> Self {
        self.link_field = link_field.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConvertError> {
        if !self.session_gap_ceiling_sec.is_finite() || self.session_gap_ceiling_sec <= 0.0 {
            return Err(ConvertError::InvalidConfig(format!(
                "session gap ceiling must be a positive number of seconds, got {}",
                self.session_gap_ceiling_sec
            )));
        }

        if self.link_field.trim().is_empty() {
            return Err(ConvertError::InvalidConfig(
                "link field must not be empty".to_string(),
            ));
        }

        if self.date_formats.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "at least one date format is required".to_string(),
            ));
        }

        for (idx, category) in self.categories.iter().enumerate() {
            if self.categories[..idx].contains(category) {
                return Err(ConvertError::InvalidConfig(format!(
                    "category {} selected more than once",
                    category
                )));
            }
        }

        Ok(())
    }
}
