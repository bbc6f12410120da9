//! Combines the caller's rotation, a uniform scale, and the EXIF rotation
//! into a single transform.

use image::imageops::FilterType;
use image::DynamicImage;

use crate::types::{ImageDescriptor, Orientation};

/// A resolved rotate → scale → rotate transform.
///
/// The scale is uniform, so the two rotations collapse into one clockwise
/// turn applied after scaling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Total clockwise rotation in degrees (0, 90, 180 or 270)
    pub rotation: u32,
    /// Uniform scale factor, never above 1.0
    pub scale: f64,
    /// Width after scaling, before rotation
    pub scaled_width: u32,
    /// Height after scaling, before rotation
    pub scaled_height: u32,
}

impl Transform {
    /// Dimensions of the final, rotated buffer.
    pub fn output_dimensions(&self) -> (u32, u32) {
        if self.swaps_axes() {
            (self.scaled_height, self.scaled_width)
        } else {
            (self.scaled_width, self.scaled_height)
        }
    }

    pub fn swaps_axes(&self) -> bool {
        self.rotation == 90 || self.rotation == 270
    }

    pub fn is_identity(&self) -> bool {
        self.rotation == 0 && self.scale >= 1.0
    }
}

/// Builds and applies orientation transforms.
pub struct OrientationResolver;

impl OrientationResolver {
    /// Resolve the transform for a buffer of `width` x `height` pixels.
    ///
    /// A zero bound, or one larger than the buffer, is clamped to the buffer's
    /// own size first so an unconstrained axis never causes upscaling.
    pub fn resolve(
        descriptor: &ImageDescriptor,
        orientation: Orientation,
        width: u32,
        height: u32,
    ) -> Transform {
        let target_width = clamp_bound(descriptor.max_width, width);
        let target_height = clamp_bound(descriptor.max_height, height);

        let width_ratio = f64::from(target_width) / f64::from(width.max(1));
        let height_ratio = f64::from(target_height) / f64::from(height.max(1));
        let scale = width_ratio.min(height_ratio);

        let scaled_width = scaled(width, scale, target_width);
        let scaled_height = scaled(height, scale, target_height);

        let rotation = (descriptor.rotation + orientation.degrees()) % 360;

        Transform {
            rotation,
            scale,
            scaled_width,
            scaled_height,
        }
    }

    /// Apply a transform, consuming the input buffer.
    pub fn apply(image: DynamicImage, transform: &Transform) -> DynamicImage {
        let scaled = if transform.scale < 1.0 {
            image.resize_exact(
                transform.scaled_width,
                transform.scaled_height,
                FilterType::Triangle,
            )
        } else {
            image
        };

        match transform.rotation {
            90 => scaled.rotate90(),
            180 => scaled.rotate180(),
            270 => scaled.rotate270(),
            _ => scaled,
        }
    }
}

fn clamp_bound(bound: u32, current: u32) -> u32 {
    if bound == 0 || bound > current {
        current
    } else {
        bound
    }
}

fn scaled(dimension: u32, scale: f64, bound: u32) -> u32 {
    let value = (f64::from(dimension) * scale).round() as u32;
    value.clamp(1, bound.max(1))
}
