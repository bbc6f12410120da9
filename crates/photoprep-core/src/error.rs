//! Error types for the photoprep pipeline.
//!
//! Errors are organized by stage. Most pipeline errors are *non-fatal*: they
//! travel next to a still-usable descriptor instead of aborting the caller.

use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for photoprep operations.
#[derive(Error, Debug)]
pub enum PhotoPrepError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Pipeline processing errors
    #[error("Pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    /// General I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read the config file from disk
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse TOML configuration
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Configuration values are invalid
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

/// Pipeline errors, one variant per failure class.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Source is unreadable, corrupt or in an unsupported format
    #[error("Decode error for {path}: {message}")]
    Decode { path: PathBuf, message: String },

    /// Re-encoding the oriented buffer failed
    #[error("Encode error for {path}: {message}")]
    Encode { path: PathBuf, message: String },

    /// Destination directory or file could not be created or written
    #[error("Storage unavailable at {path}: {message}")]
    StorageUnavailable { path: PathBuf, message: String },

    /// EXIF block missing the expected structure or unreadable
    #[error("Metadata read failed for {path}: {message}")]
    MetadataRead { path: PathBuf, message: String },

    /// Copy-then-delete across storage roots failed
    #[error("Relocation of {from} to {to} failed: {message}")]
    Relocation {
        from: PathBuf,
        to: PathBuf,
        message: String,
    },

    /// Source file is larger than the configured limit
    #[error("File too large: {path} ({size_mb}MB > {max_mb}MB)")]
    FileTooLarge {
        path: PathBuf,
        size_mb: u64,
        max_mb: u64,
    },

    /// Operation timed out
    #[error("Timeout in {stage} stage for {path} after {timeout_ms}ms")]
    Timeout {
        path: PathBuf,
        stage: String,
        timeout_ms: u64,
    },

    /// File not found
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// Request parameters outside the input contract
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl PipelineError {
    /// Short machine-readable code for the response layer.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Decode { .. } => "decode_failure",
            Self::Encode { .. } => "encode_failure",
            Self::StorageUnavailable { .. } => "storage_unavailable",
            Self::MetadataRead { .. } => "metadata_read_failure",
            Self::Relocation { .. } => "relocation_failure",
            Self::FileTooLarge { .. } => "file_too_large",
            Self::Timeout { .. } => "timeout",
            Self::FileNotFound(_) => "file_not_found",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }
}

/// Convenience type alias for photoprep results.
pub type Result<T> = std::result::Result<T, PhotoPrepError>;

/// Convenience type alias for pipeline-specific results.
pub type PipelineResult<T> = std::result::Result<T, PipelineError>;
