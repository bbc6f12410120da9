//! Core data types threaded through the photoprep pipeline.
//!
//! Descriptors are values: every transform returns a new descriptor rather
//! than mutating the one it was given.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, PipelineResult};

/// Rotations a caller may request, in degrees.
pub const VALID_ROTATIONS: [u32; 4] = [0, 90, 180, 270];

/// A photo's file locations and the sizing parameters applied to it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDescriptor {
    /// Source file. Owned by the caller and never deleted implicitly.
    pub original: PathBuf,

    /// Derived file, present only after a successful resize
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized: Option<PathBuf>,

    /// Maximum output width, 0 for unconstrained
    pub max_width: u32,

    /// Maximum output height, 0 for unconstrained
    pub max_height: u32,

    /// Re-encode quality (0-100)
    pub quality: u8,

    /// Caller-requested rotation in degrees, applied on top of EXIF
    pub rotation: u32,
}

impl ImageDescriptor {
    /// Descriptor for a source file with no constraints.
    pub fn new(original: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            resized: None,
            max_width: 0,
            max_height: 0,
            quality: 100,
            rotation: 0,
        }
    }

    pub fn with_max_width(self, max_width: u32) -> Self {
        Self { max_width, ..self }
    }

    pub fn with_max_height(self, max_height: u32) -> Self {
        Self { max_height, ..self }
    }

    pub fn with_quality(self, quality: u8) -> Self {
        Self { quality, ..self }
    }

    pub fn with_rotation(self, rotation: u32) -> Self {
        Self { rotation, ..self }
    }

    pub fn with_original_file(self, original: impl Into<PathBuf>) -> Self {
        Self {
            original: original.into(),
            ..self
        }
    }

    pub fn with_resized_file(self, resized: impl Into<PathBuf>) -> Self {
        Self {
            resized: Some(resized.into()),
            ..self
        }
    }

    /// The file the pipeline currently considers authoritative.
    ///
    /// `resized` supersedes `original` once populated.
    pub fn current(&self) -> &Path {
        self.resized.as_deref().unwrap_or(&self.original)
    }

    /// Whether any resizing was requested at all.
    pub fn is_constrained(&self) -> bool {
        self.max_width != 0 || self.max_height != 0
    }

    /// Check the descriptor against the input contract.
    pub fn validate(&self) -> PipelineResult<()> {
        if self.quality > 100 {
            return Err(PipelineError::InvalidRequest(format!(
                "quality must be between 0 and 100, got {}",
                self.quality
            )));
        }
        if !VALID_ROTATIONS.contains(&self.rotation) {
            return Err(PipelineError::InvalidRequest(format!(
                "rotation must be one of 0, 90, 180, 270, got {}",
                self.rotation
            )));
        }
        Ok(())
    }
}

/// Canonical EXIF orientation, reduced to the four rotations we correct for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    #[default]
    Normal,
    Rotate90,
    Rotate180,
    Rotate270,
}

impl Orientation {
    /// Map a raw EXIF orientation tag value (1-8).
    ///
    /// Only the pure rotations are recognised; mirrored and unknown codes
    /// fall back to `Normal`.
    pub fn from_exif_code(code: u32) -> Self {
        match code {
            6 => Self::Rotate90,
            3 => Self::Rotate180,
            8 => Self::Rotate270,
            _ => Self::Normal,
        }
    }

    /// Clockwise rotation needed for correct display.
    pub fn degrees(self) -> u32 {
        match self {
            Self::Normal => 0,
            Self::Rotate90 => 90,
            Self::Rotate180 => 180,
            Self::Rotate270 => 270,
        }
    }

    /// Historical response flag: `false` for the quarter turns, `true` otherwise.
    pub fn is_vertical(self) -> bool {
        !matches!(self, Self::Rotate90 | Self::Rotate270)
    }
}

/// Metadata recovered from the original (pre-resize) file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExifRecord {
    /// GPS latitude in signed decimal degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    /// GPS longitude in signed decimal degrees
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    /// Orientation reported by the EXIF block
    pub orientation: Orientation,

    /// Raw EXIF DateTime string ("YYYY:MM:DD HH:MM:SS")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,

    /// Resolved ISO-8601 UTC timestamp with a literal `Z`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl ExifRecord {
    pub fn original_rotation(&self) -> u32 {
        self.orientation.degrees()
    }

    pub fn is_vertical(&self) -> bool {
        self.orientation.is_vertical()
    }
}

/// What started the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// A live camera capture; the produced files belong to us
    Capture,
    /// A pick from an existing gallery item; the source belongs to the user
    Pick,
}

impl Trigger {
    pub fn is_capture(self) -> bool {
        matches!(self, Self::Capture)
    }
}

/// Caller-supplied storage options.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageOptions {
    /// Subdirectory under the public pictures root
    pub path: Option<String>,

    /// Move the final file into the permanent gallery
    pub keep: bool,
}

impl StorageOptions {
    /// The subdirectory, if one was given and it is not blank.
    pub fn sub_path(&self) -> Option<&str> {
        self.path.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// A descriptor paired with the non-fatal error met while producing it.
///
/// A populated error next to a valid descriptor is a degraded success.
#[derive(Debug)]
pub struct TransformResult {
    pub descriptor: ImageDescriptor,
    pub error: Option<PipelineError>,
}

impl TransformResult {
    pub fn ok(descriptor: ImageDescriptor) -> Self {
        Self {
            descriptor,
            error: None,
        }
    }

    pub fn degraded(descriptor: ImageDescriptor, error: PipelineError) -> Self {
        Self {
            descriptor,
            error: Some(error),
        }
    }

    pub fn is_degraded(&self) -> bool {
        self.error.is_some()
    }
}

/// Error object carried in a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
}

impl From<&PipelineError> for ResponseError {
    fn from(err: &PipelineError) -> Self {
        Self {
            code: err.code().to_string(),
            message: err.to_string(),
        }
    }
}

/// Everything handed back to the response layer for one photo.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PickResponse {
    /// Absolute path of the source file
    pub original: PathBuf,

    /// Absolute path of the derived file, if one was produced
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resized: Option<PathBuf>,

    /// File name of the current file
    pub file_name: String,

    /// Size in bytes of the current file
    pub file_size: u64,

    /// Pixel width of the current file, when it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Pixel height of the current file, when it could be read
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,

    pub original_rotation: u32,

    pub is_vertical: bool,

    /// First non-fatal failure met along the way
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
}
