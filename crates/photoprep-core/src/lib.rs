//! PhotoPrep Core - photo normalization for capture and pick flows.
//!
//! A captured or picked photo goes in; a bounded, upright, re-encoded JPEG
//! comes out, along with the location, timestamp and orientation recovered
//! from the original file.
//!
//! # Architecture
//!
//! ```text
//! Source → Validate → Decode (1/n) → Orient + Scale → Encode → Persist
//!                                                               ↓
//!                          EXIF (original) → Lifecycle (relocate | cleanup)
//! ```
//!
//! Failures are non-fatal wherever possible: the caller always gets the best
//! descriptor available, with the error next to it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use photoprep_core::{Config, PhotoPrep, PickRequest, Trigger};
//!
//! let config = Config::load()?;
//! let prep = PhotoPrep::new(&config);
//!
//! let mut request = PickRequest::new("./capture.jpg", Trigger::Capture);
//! request.max_width = 1280;
//! let response = prep.process(&request).to_response();
//! println!("{} ({:?} x {:?})", response.file_name, response.width, response.height);
//! ```

pub mod config;
pub mod error;
pub mod lifecycle;
pub mod media_index;
pub mod output;
pub mod picker;
pub mod pipeline;
pub mod storage;
pub mod types;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::Config;
pub use error::{ConfigError, PhotoPrepError, PipelineError, PipelineResult, Result};
pub use lifecycle::LifecycleManager;
pub use media_index::{FsMediaIndex, MediaIndex};
pub use output::{OutputFormat, OutputWriter};
pub use picker::{PhotoPrep, PickRequest, Prepared};
pub use pipeline::{ExifReader, ImagePipeline, OrientationResolver};
pub use storage::{DirStorageRoots, FileStore, StorageRoots};
pub use types::{
    ExifRecord, ImageDescriptor, Orientation, PickResponse, StorageOptions, TransformResult,
    Trigger,
};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[tokio::test]
    async fn test_photoprep_from_default_config() {
        let config = Config::default();
        let prep = std::sync::Arc::new(PhotoPrep::new(&config));

        let result = prep
            .process_async(PickRequest::new("/nonexistent/a.jpg", Trigger::Pick))
            .await
            .unwrap();
        assert!(result.is_degraded());
        assert_eq!(result.dimensions, None);
    }
}
