//! Pipeline orchestration: decode → orient → encode → persist.
//!
//! Every exit path hands back a usable descriptor. A failure anywhere aborts
//! the run and returns the descriptor that came in, with the error attached.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Limits};
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::LimitsConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::media_index::MediaIndex;
use crate::storage::FileStore;
use crate::types::{ImageDescriptor, StorageOptions, TransformResult, Trigger};

use super::downsample::{decode_jpeg_scaled, sample_factor, subsample};
use super::metadata::ExifReader;
use super::orientation::{OrientationResolver, Transform};
use super::validate::Validator;

/// Where a pipeline run is, or where it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Decoding,
    Orienting,
    Encoding,
    Persisting,
    Done,
    /// Stopped in the given state; the error says why
    Aborted(AbortedIn),
}

/// The state a run was in when it aborted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortedIn {
    Validating,
    Decoding,
    Encoding,
    Persisting,
}

/// What a pipeline run produced.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub result: TransformResult,
    pub state: PipelineState,
    /// Applied transform, once orientation was resolved
    pub transform: Option<Transform>,
}

impl PipelineOutcome {
    fn done(descriptor: ImageDescriptor, transform: Transform) -> Self {
        Self {
            result: TransformResult::ok(descriptor),
            state: PipelineState::Done,
            transform: Some(transform),
        }
    }

    fn aborted(descriptor: ImageDescriptor, stage: AbortedIn, error: PipelineError) -> Self {
        tracing::warn!("Pipeline aborted while {:?}: {}", stage, error);
        Self {
            result: TransformResult::degraded(descriptor, error),
            state: PipelineState::Aborted(stage),
            transform: None,
        }
    }

    /// Output dimensions, when the run completed.
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        match self.state {
            PipelineState::Done => self.transform.map(|t| t.output_dimensions()),
            _ => None,
        }
    }
}

/// A decoded source buffer and the factor it was reduced by.
struct Decoded {
    image: DynamicImage,
    factor: u32,
}

/// Runs a single photo through the normalization chain.
pub struct ImagePipeline {
    store: FileStore,
    index: Arc<dyn MediaIndex>,
    validator: Validator,
    limits: LimitsConfig,
}

impl ImagePipeline {
    pub fn new(store: FileStore, index: Arc<dyn MediaIndex>, limits: LimitsConfig) -> Self {
        Self {
            store,
            index,
            validator: Validator::new(limits.clone()),
            limits,
        }
    }

    /// Downsample, orient, re-encode and persist `descriptor.original`.
    ///
    /// On success the returned descriptor carries a `resized` path. On any
    /// failure the input descriptor comes back unchanged with the error.
    pub fn run(
        &self,
        descriptor: &ImageDescriptor,
        trigger: Trigger,
        storage: &StorageOptions,
    ) -> PipelineOutcome {
        let start = Instant::now();
        let source = descriptor.original.as_path();
        tracing::debug!("Processing: {:?}", source);

        if let Err(e) = descriptor
            .validate()
            .and_then(|_| self.validator.validate(source))
        {
            return PipelineOutcome::aborted(descriptor.clone(), AbortedIn::Validating, e);
        }

        // Decoding
        let decode_start = Instant::now();
        let decoded = match self.decode(descriptor) {
            Ok(decoded) => decoded,
            Err(e) => return PipelineOutcome::aborted(descriptor.clone(), AbortedIn::Decoding, e),
        };
        tracing::trace!("  Decode (1/{}): {:?}", decoded.factor, decode_start.elapsed());

        // Orienting
        self.enter(PipelineState::Orienting);
        let orient_start = Instant::now();
        let (width, height) = decoded.image.dimensions();
        let orientation = ExifReader::orientation(source);
        let transform = OrientationResolver::resolve(descriptor, orientation, width, height);
        let oriented = OrientationResolver::apply(decoded.image, &transform);
        tracing::trace!("  Orient ({:?}): {:?}", transform, orient_start.elapsed());

        // Encoding
        self.enter(PipelineState::Encoding);
        let encode_start = Instant::now();
        let bytes = match encode_jpeg(oriented, descriptor.quality, source) {
            Ok(bytes) => bytes,
            Err(e) => return PipelineOutcome::aborted(descriptor.clone(), AbortedIn::Encoding, e),
        };
        tracing::trace!("  Encode ({} bytes): {:?}", bytes.len(), encode_start.elapsed());

        // Persisting
        self.enter(PipelineState::Persisting);
        let force_local = !trigger.is_capture();
        let sub_path = storage.sub_path();
        let resized = match self.persist(&bytes, sub_path, force_local) {
            Ok(path) => path,
            Err(e) => {
                return PipelineOutcome::aborted(descriptor.clone(), AbortedIn::Persisting, e)
            }
        };
        drop(bytes);

        if sub_path.is_some() || !force_local {
            self.index.scan(&resized);
        }

        let (out_width, out_height) = transform.output_dimensions();
        tracing::debug!(
            "Processed {:?} in {:?} ({}x{} -> {}x{})",
            source,
            start.elapsed(),
            width,
            height,
            out_width,
            out_height
        );
        self.enter(PipelineState::Done);

        PipelineOutcome::done(descriptor.clone().with_resized_file(resized), transform)
    }

    fn enter(&self, state: PipelineState) {
        tracing::debug!("  -> {:?}", state);
    }

    fn decode_limits(&self) -> Limits {
        let mut limits = Limits::default();
        limits.max_image_width = Some(self.limits.max_image_dimension);
        limits.max_image_height = Some(self.limits.max_image_dimension);
        limits.max_alloc = Some(self.limits.max_alloc_bytes());
        limits
    }

    fn open_reader(&self, path: &Path) -> PipelineResult<ImageReader<BufReader<File>>> {
        let mut reader = ImageReader::open(path)
            .and_then(|r| r.with_guessed_format())
            .map_err(|e| PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!("Cannot open image: {e}"),
            })?;
        reader.limits(self.decode_limits());
        Ok(reader)
    }

    /// Read the header for dimensions, pick a sample factor, then decode at
    /// that factor. JPEGs are reduced inside the decoder; other formats are
    /// decoded in full and reduced before this call returns.
    fn decode(&self, descriptor: &ImageDescriptor) -> PipelineResult<Decoded> {
        self.enter(PipelineState::Decoding);
        let path = descriptor.original.as_path();
        let decode_error = |e: image::ImageError| PipelineError::Decode {
            path: path.to_path_buf(),
            message: e.to_string(),
        };

        let reader = self.open_reader(path)?;
        let format = reader.format();
        let (initial_width, initial_height) = reader.into_dimensions().map_err(decode_error)?;

        let max_dimension = self.limits.max_image_dimension;
        if initial_width > max_dimension || initial_height > max_dimension {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                message: format!(
                    "Image dimensions {initial_width}x{initial_height} exceed limit {max_dimension}"
                ),
            });
        }

        let factor = sample_factor(
            initial_width,
            initial_height,
            descriptor.max_width,
            descriptor.max_height,
        );
        tracing::debug!(
            "  Sample factor {} for {}x{} (max {}x{})",
            factor,
            initial_width,
            initial_height,
            descriptor.max_width,
            descriptor.max_height
        );

        if format == Some(ImageFormat::Jpeg) {
            if let Some(scaled) = decode_jpeg_scaled(path, factor, self.limits.max_alloc_bytes())? {
                return Ok(Decoded {
                    image: subsample(scaled.image, factor / scaled.factor),
                    factor,
                });
            }
        }

        let image = self.open_reader(path)?.decode().map_err(decode_error)?;
        Ok(Decoded {
            image: subsample(image, factor),
            factor,
        })
    }

    /// Allocate a destination and write the encoded bytes to it.
    ///
    /// A failed write removes the allocated file.
    fn persist(
        &self,
        bytes: &[u8],
        sub_path: Option<&str>,
        force_local: bool,
    ) -> PipelineResult<std::path::PathBuf> {
        let path = self.store.allocate(sub_path, force_local)?;

        let written = File::create(&path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            writer.write_all(bytes)?;
            writer.into_inner().map_err(|e| e.into_error())?.sync_all()
        });

        if let Err(e) = written {
            FileStore::delete_if_exists(&path);
            return Err(PipelineError::StorageUnavailable {
                path,
                message: format!("Cannot write file: {e}"),
            });
        }
        Ok(path)
    }
}

/// Re-encode a buffer as JPEG, consuming it.
///
/// Quality is clamped into the encoder's 1-100 range.
fn encode_jpeg(image: DynamicImage, quality: u8, source: &Path) -> PipelineResult<Vec<u8>> {
    let image = match image {
        DynamicImage::ImageRgb8(_) | DynamicImage::ImageLuma8(_) => image,
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    };

    let mut bytes = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100)))
        .map_err(|e| PipelineError::Encode {
            path: source.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(bytes)
}
