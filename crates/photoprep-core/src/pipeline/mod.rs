//! Image normalization pipeline components.
//!
//! - **validate**: Pre-decode checks on the source file
//! - **downsample**: Power-of-two sample factor and coarse reduction
//! - **orientation**: Rotation + scale transform resolution
//! - **metadata**: EXIF metadata and the timestamp fallback
//! - **processor**: Orchestrates the full pipeline

pub mod downsample;
pub mod metadata;
pub mod orientation;
pub mod processor;
pub mod validate;

// Re-exports for convenient access
pub use downsample::sample_factor;
pub use metadata::{ExifOutcome, ExifReader};
pub use orientation::{OrientationResolver, Transform};
pub use processor::{AbortedIn, ImagePipeline, PipelineOutcome, PipelineState};
pub use validate::Validator;
