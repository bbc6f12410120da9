//! Sub-configuration structs with their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Storage roots and copy behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Public pictures root; caller subdirectories are created beneath it
    pub pictures_dir: PathBuf,

    /// Permanent gallery root that kept photos are relocated into
    pub gallery_dir: PathBuf,

    /// App-scoped pictures directory, not indexed by the media scanner
    pub private_dir: PathBuf,

    /// Buffer size for streaming copies, in KiB
    pub copy_buffer_kb: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let pictures_dir = directories::UserDirs::new()
            .and_then(|dirs| dirs.picture_dir().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("~/Pictures"));
        let private_dir = directories::ProjectDirs::from("com", "photoprep", "photoprep")
            .map(|dirs| dirs.data_dir().join("pictures"))
            .unwrap_or_else(|| PathBuf::from("~/.photoprep/pictures"));

        Self {
            pictures_dir,
            gallery_dir: PathBuf::from("~/DCIM"),
            private_dir,
            copy_buffer_kb: 64,
        }
    }
}

/// Resource limits to protect against problematic inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum source file size in megabytes
    pub max_file_size_mb: u64,

    /// Maximum decoded dimension (width or height)
    pub max_image_dimension: u32,

    /// Upper bound on decoder allocations in megabytes
    pub max_alloc_mb: u64,

    /// Timeout for the async entry point, in milliseconds
    pub decode_timeout_ms: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size_mb: 100,
            max_image_dimension: 20000,
            max_alloc_mb: 1024,
            decode_timeout_ms: 30000,
        }
    }
}

impl LimitsConfig {
    pub fn max_file_size_bytes(&self) -> u64 {
        self.max_file_size_mb.saturating_mul(1024 * 1024)
    }

    pub fn max_alloc_bytes(&self) -> u64 {
        self.max_alloc_mb.saturating_mul(1024 * 1024)
    }
}

/// Output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Default output format ("json" or "jsonl")
    pub format: String,

    /// Pretty-print JSON output
    pub pretty: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "json".to_string(),
            pretty: false,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: error, warn, info, debug, trace
    pub level: String,

    /// Log format: "pretty" or "json"
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}
