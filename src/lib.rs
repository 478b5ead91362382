//! DDP Convert - Activity history from social-media data download packages
//!
//! DDP Convert turns a personal data export package into a uniform activity
//! table through a deterministic pipeline: record extraction → normalization
//! → engagement estimation and monthly aggregation → export.
//!
//! ## Modules
//!
//! - **Extraction**: Locate Browsing, Favorite and Liked records across export format versions
//! - **Normalization**: One time-ordered table with a `TimeDiff` column
//! - **Derivation**: Session-gap engagement estimate and monthly category counts
//! - **Export**: Full CSV table, link list and a JSON display report

pub mod aggregator;
pub mod config;
pub mod encoder;
pub mod engagement;
pub mod error;
pub mod exporter;
pub mod extractor;
pub mod normalizer;
pub mod pipeline;
pub mod types;

pub use config::PipelineConfig;
pub use error::ConvertError;
pub use pipeline::{convert_export, ConversionSession, PipelineOutcome};
pub use types::{Category, MonthlyAggregate, NormalizedDataset};

/// Converter version embedded in all reports
pub const CONVERTER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for reports
pub const PRODUCER_NAME: &str = "ddp-convert";
