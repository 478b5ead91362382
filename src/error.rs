//! Error types for DDP Convert

use thiserror::Error;

/// Errors that can occur while converting an export package
#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("Failed to decode export package: {0}")]
    DecodeError(String),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Date parse error: {0}")]
    DateParseError(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown category: {0}")]
    UnknownCategory(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),
}
