//! Cheap checks on the source file before any decoding.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::config::LimitsConfig;
use crate::error::PipelineError;

/// Validates source files before they reach the decoder.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Check that the file exists, is within the size limit, and starts with
    /// a known image signature.
    pub fn validate(&self, path: &Path) -> Result<(), PipelineError> {
        let metadata = std::fs::metadata(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => PipelineError::FileNotFound(path.to_path_buf()),
            _ => PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot read metadata: {e}"),
            },
        })?;

        let max_bytes = self.limits.max_file_size_bytes();
        if metadata.len() > max_bytes {
            return Err(PipelineError::FileTooLarge {
                path: path.to_path_buf(),
                size_mb: metadata.len() / (1024 * 1024),
                max_mb: self.limits.max_file_size_mb,
            });
        }

        let mut header = [0u8; 12];
        let bytes_read = File::open(path)
            .and_then(|mut f| f.read(&mut header))
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot open file: {e}"),
            })?;

        match sniff_format(&header[..bytes_read]) {
            Some(format) => {
                tracing::trace!("  Signature: {}", format);
                Ok(())
            }
            None => Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: "Unrecognized image format (invalid magic bytes)".to_string(),
            }),
        }
    }
}

/// Name the image format a header belongs to, if it is one we decode.
fn sniff_format(header: &[u8]) -> Option<&'static str> {
    match header {
        [0xFF, 0xD8, 0xFF, ..] => Some("jpeg"),
        [0x89, b'P', b'N', b'G', ..] => Some("png"),
        [b'G', b'I', b'F', b'8', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        [b'B', b'M', ..] => Some("bmp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("tiff"),
        _ => None,
    }
}
