//! Coarse power-of-two downsampling ahead of the precise scale pass.
//!
//! JPEG sources are reduced while decoding through DCT scaling (1/2, 1/4,
//! 1/8), so the full-size buffer never exists. Other formats are decoded in
//! full and reduced straight away.

use image::{DynamicImage, GenericImageView, ImageBuffer};
use jpeg_decoder::{Decoder as JpegDecoder, PixelFormat};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// Largest reduction a JPEG decoder applies on its own.
const MAX_DCT_FACTOR: u32 = 8;

/// Smallest power-of-two factor that brings a constrained axis within 2x of its bound.
///
/// Keeps doubling while *every* constrained axis is still more than twice its
/// maximum (an axis with a zero maximum never stops the loop by itself).
/// With both maxima at zero no coarse reduction happens and the factor is 1.
pub fn sample_factor(initial_width: u32, initial_height: u32, max_width: u32, max_height: u32) -> u32 {
    if max_width == 0 && max_height == 0 {
        return 1;
    }

    let mut factor = 1u32;
    let mut width = u64::from(initial_width);
    let mut height = u64::from(initial_height);
    let max_width = u64::from(max_width);
    let max_height = u64::from(max_height);

    while (max_width == 0 || width > 2 * max_width) && (max_height == 0 || height > 2 * max_height) {
        factor *= 2;
        width /= 2;
        height /= 2;
    }
    factor
}

/// Dimensions after halving `factor`'s worth of times.
pub fn sampled_dimensions(width: u32, height: u32, factor: u32) -> (u32, u32) {
    let factor = factor.max(1);
    ((width / factor).max(1), (height / factor).max(1))
}

/// Reduce a freshly decoded image by the sample factor.
///
/// Consumes the full-size buffer so it is released as soon as the reduced
/// one exists.
pub fn subsample(image: DynamicImage, factor: u32) -> DynamicImage {
    if factor <= 1 {
        return image;
    }
    let (width, height) = image.dimensions();
    let (w, h) = sampled_dimensions(width, height, factor);
    tracing::trace!("  Subsample 1/{}: {}x{} -> {}x{}", factor, width, height, w, h);
    image.thumbnail_exact(w, h)
}

/// A JPEG decoded at a fraction of its size.
pub struct ScaledJpeg {
    pub image: DynamicImage,
    /// Reduction applied by the decoder; any rest of the sample factor is
    /// still to be done by [`subsample`]
    pub factor: u32,
}

/// Decode a JPEG at up to `1/factor` of its size.
///
/// The decoded buffer is checked against `max_alloc` bytes before any pixel
/// data is produced. Returns `None` for pixel formats this path does not
/// handle (16-bit luma), leaving the caller to fall back to a full decode.
pub fn decode_jpeg_scaled(
    path: &Path,
    factor: u32,
    max_alloc: u64,
) -> PipelineResult<Option<ScaledJpeg>> {
    let decode_error = |message: String| PipelineError::Decode {
        path: path.to_path_buf(),
        message,
    };

    let file = File::open(path).map_err(|e| decode_error(format!("Cannot open image: {e}")))?;
    let mut decoder = JpegDecoder::new(BufReader::new(file));
    decoder
        .read_info()
        .map_err(|e| decode_error(e.to_string()))?;
    let info = decoder
        .info()
        .ok_or_else(|| decode_error("JPEG header missing".to_string()))?;

    if matches!(info.pixel_format, PixelFormat::L16) {
        return Ok(None);
    }

    let dct = factor.clamp(1, MAX_DCT_FACTOR);
    let requested_width = u32::from(info.width).div_ceil(dct);
    let requested_height = u32::from(info.height).div_ceil(dct);
    let (width, height) = decoder
        .scale(
            u16::try_from(requested_width).unwrap_or(info.width),
            u16::try_from(requested_height).unwrap_or(info.height),
        )
        .map_err(|e| decode_error(e.to_string()))?;
    let (width, height) = (u32::from(width), u32::from(height));

    let needed = u64::from(width) * u64::from(height) * info.pixel_format.pixel_bytes() as u64;
    if needed > max_alloc {
        return Err(decode_error(format!(
            "Memory limit exceeded ({needed} bytes for {width}x{height} at 1/{dct})"
        )));
    }

    let pixels = decoder.decode().map_err(|e| decode_error(e.to_string()))?;
    let image = match info.pixel_format {
        PixelFormat::L8 => {
            ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
        }
        PixelFormat::RGB24 => {
            ImageBuffer::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
        }
        PixelFormat::CMYK32 => {
            ImageBuffer::from_raw(width, height, cmyk_to_rgb(&pixels)).map(DynamicImage::ImageRgb8)
        }
        _ => return Ok(None),
    }
    .ok_or_else(|| decode_error("Decoded buffer size mismatch".to_string()))?;

    tracing::trace!(
        "  Scaled JPEG decode 1/{}: {}x{} -> {}x{}",
        dct,
        info.width,
        info.height,
        width,
        height
    );
    Ok(Some(ScaledJpeg { image, factor: dct }))
}

fn cmyk_to_rgb(pixels: &[u8]) -> Vec<u8> {
    let mut rgb = Vec::with_capacity(pixels.len() / 4 * 3);
    for chunk in pixels.chunks_exact(4) {
        let k = f32::from(chunk[3]) / 255.0;
        for &channel in &chunk[..3] {
            let c = f32::from(channel) / 255.0;
            let value = (1.0 - (c * (1.0 - k) + k)) * 255.0;
            rgb.push(value.clamp(0.0, 255.0) as u8);
        }
    }
    rgb
}
