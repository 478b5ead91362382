//! Pipeline orchestration
//!
//! This module provides the public API for DDP Convert.
//! It orchestrates the full pipeline from uploaded export bytes to the
//! normalized dataset, monthly aggregates and engagement estimate, and keeps
//! the current dataset of a session for on-demand exports.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::aggregator::MonthlyAggregator;
use crate::config::PipelineConfig;
use crate::engagement::{status_line, EngagementEstimator};
use crate::error::ConvertError;
use crate::exporter::DatasetExporter;
use crate::extractor::ExportExtractor;
use crate::normalizer::DatasetNormalizer;
use crate::types::{Category, EngagementEstimate, ExportFile, MonthlyAggregate, NormalizedDataset};

/// Status shown when no selected category yielded a usable record
pub const NO_ACTIVITY_STATUS: &str = "No activity found.";

/// Status shown before anything has been uploaded
pub const NO_UPLOAD_STATUS: &str = "No file uploaded.";

/// Class of a fatal pipeline error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Decode,
    MissingField,
    Config,
    Encoding,
}

/// A fatal error converted into a value at the pipeline boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineFailure {
    pub kind: FailureKind,
    pub message: String,
}

impl From<ConvertError> for PipelineFailure {
    fn from(e: ConvertError) -> Self {
        let kind = match &e {
            ConvertError::DecodeError(_) | ConvertError::DateParseError(_) => FailureKind::Decode,
            ConvertError::MissingField(_) => FailureKind::MissingField,
            ConvertError::InvalidConfig(_) | ConvertError::UnknownCategory(_) => {
                FailureKind::Config
            }
            ConvertError::EncodingError(_) => FailureKind::Encoding,
        };
        Self {
            kind,
            message: e.to_string(),
        }
    }
}

/// Results of a successful pipeline pass
#[derive(Debug, Clone)]
pub struct ConversionSummary {
    pub dataset: Arc<NormalizedDataset>,
    pub monthly: Vec<MonthlyAggregate>,
    pub engagement: EngagementEstimate,
}

impl ConversionSummary {
    pub fn status_line(&self) -> String {
        if self.dataset.is_empty() {
            NO_ACTIVITY_STATUS.to_string()
        } else {
            status_line(&self.engagement)
        }
    }
}

/// Structured result of one pipeline invocation
#[derive(Debug, Clone)]
pub enum PipelineOutcome {
    /// At least one row survived normalization
    Success(ConversionSummary),
    /// Nothing to show; `summary` holds the empty dataset and any rejections
    Empty(ConversionSummary),
    /// Fatal error; no partial result
    Failure(PipelineFailure),
}

impl PipelineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PipelineOutcome::Success(_))
    }

    /// Summary for both the success and the empty case
    pub fn summary(&self) -> Option<&ConversionSummary> {
        match self {
            PipelineOutcome::Success(summary) | PipelineOutcome::Empty(summary) => Some(summary),
            PipelineOutcome::Failure(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&PipelineFailure> {
        match self {
            PipelineOutcome::Failure(failure) => Some(failure),
            _ => None,
        }
    }

    /// Human-readable status for the outcome
    pub fn status_line(&self) -> String {
        match self {
            PipelineOutcome::Success(summary) | PipelineOutcome::Empty(summary) => {
                summary.status_line()
            }
            PipelineOutcome::Failure(failure) => {
                format!("Error processing the file: {}", failure.message)
            }
        }
    }

    fn from_result(result: Result<ConversionSummary, ConvertError>) -> Self {
        match result {
            Ok(summary) if summary.dataset.is_empty() => PipelineOutcome::Empty(summary),
            Ok(summary) => PipelineOutcome::Success(summary),
            Err(e) => PipelineOutcome::Failure(e.into()),
        }
    }
}

/// Convert export bytes using the categories selected in `config` (stateless, one-shot).
///
/// # Arguments
/// * `bytes` - Raw export package bytes, already decoded from any transport encoding
/// * `config` - Pipeline configuration
///
/// # Returns
/// The structured outcome; errors never escape as `Err`
///
/// # Example
/// ```ignore
/// let outcome = convert_export(&bytes, &PipelineConfig::default());
/// println!("{}", outcome.status_line());
/// ```
pub fn convert_export(bytes: &[u8], config: &PipelineConfig) -> PipelineOutcome {
    let extractor = ExportExtractor::default();
    PipelineOutcome::from_result(run_pipeline(&extractor, bytes, &config.categories, config))
}

/// Process export bytes through the full pipeline.
///
/// Pipeline stages:
/// 1. ExportExtractor - Decode and pull tagged records per category
/// 2. DatasetNormalizer - Parse dates, sort, compute TimeDiff
/// 3. EngagementEstimator - Average of gaps within the session ceiling
/// 4. MonthlyAggregator - Per-month totals and category counts
fn run_pipeline(
    extractor: &ExportExtractor,
    bytes: &[u8],
    categories: &[Category],
    config: &PipelineConfig,
) -> Result<ConversionSummary, ConvertError> {
    config.validate()?;

    // Stage 1: Extract records
    let records = extractor.extract_bytes(bytes, categories)?;
    debug!(records = records.len(), "extraction finished");

    // Stage 2: Normalize into a dataset
    let dataset = DatasetNormalizer::from_config(config).normalize(records, categories);

    // Stage 3: Estimate engagement
    let engagement = EngagementEstimator::from_config(config).estimate(&dataset);

    // Stage 4: Aggregate by month
    let monthly = MonthlyAggregator::aggregate(&dataset);

    Ok(ConversionSummary {
        dataset: Arc::new(dataset),
        monthly,
        engagement,
    })
}

/// Session-scoped converter holding the current dataset.
///
/// Each successful ingest replaces the dataset wholesale (last write wins).
/// The dataset sits behind a mutex as an `Arc`: exports take a snapshot under
/// the lock and serialize outside it, so they see either the previous or the
/// new dataset, never a mix.
pub struct ConversionSession {
    id: Uuid,
    config: PipelineConfig,
    extractor: ExportExtractor,
    current: Mutex<Option<Arc<NormalizedDataset>>>,
}

impl ConversionSession {
    /// Create a session with a validated configuration
    pub fn new(config: PipelineConfig) -> Result<Self, ConvertError> {
        Self::with_extractor(config, ExportExtractor::default())
    }

    /// Create a session using a custom key-path layout
    pub fn with_extractor(
        config: PipelineConfig,
        extractor: ExportExtractor,
    ) -> Result<Self, ConvertError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            extractor,
            current: Mutex::new(None),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run the pipeline with the configured category selection
    pub fn ingest(&self, bytes: &[u8]) -> PipelineOutcome {
        self.ingest_with_categories(bytes, &self.config.categories)
    }

    /// Run the pipeline and make its dataset current
    ///
    /// A failed run leaves the previous dataset in place.
    pub fn ingest_with_categories(&self, bytes: &[u8], categories: &[Category]) -> PipelineOutcome {
        let result = run_pipeline(&self.extractor, bytes, categories, &self.config);

        match &result {
            Ok(summary) => {
                let mut current = self.current.lock().unwrap_or_else(PoisonError::into_inner);
                *current = Some(Arc::clone(&summary.dataset));
                info!(
                    session = %self.id,
                    rows = summary.dataset.len(),
                    rejected = summary.dataset.rejected_count(),
                    "replaced current dataset"
                );
            }
            Err(e) => warn!(session = %self.id, error = %e, "ingest failed"),
        }

        PipelineOutcome::from_result(result)
    }

    /// Snapshot of the current dataset, if any ingest has succeeded
    pub fn current(&self) -> Option<Arc<NormalizedDataset>> {
        self.current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Drop the current dataset
    pub fn clear(&self) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Status line for the current dataset
    pub fn status_line(&self) -> String {
        match self.current() {
            None => NO_UPLOAD_STATUS.to_string(),
            Some(dataset) if dataset.is_empty() => NO_ACTIVITY_STATUS.to_string(),
            Some(dataset) => {
                status_line(&EngagementEstimator::from_config(&self.config).estimate(&dataset))
            }
        }
    }

    /// Table export of the current dataset; header only when there is none
    pub fn export_table(&self) -> ExportFile {
        DatasetExporter::table_file(&self.snapshot())
    }

    /// Link export of the current dataset using the configured link field
    pub fn export_links(&self) -> Result<ExportFile, ConvertError> {
        DatasetExporter::links_file(&self.snapshot(), &self.config.link_field)
    }

    fn snapshot(&self) -> Arc<NormalizedDataset> {
        self.current()
            .unwrap_or_else(|| Arc::new(NormalizedDataset::empty(&self.config.categories)))
    }
}
