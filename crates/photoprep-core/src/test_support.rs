//! Shared test utilities: synthetic JPEG fixtures with EXIF blocks.
//!
//! # Usage
//!
//! ```rust,ignore
//! use crate::test_support::*;
//!
//! let dir = tempfile::tempdir().unwrap();
//! let exif = ExifFixture::default().orientation(6).gps(48.8566, 2.3522);
//! let path = write_jpeg(dir.path(), "photo.jpg", 1600, 1200, Some(&exif));
//! ```

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use std::path::{Path, PathBuf};

// =========================================================================
// EXIF block builder
// =========================================================================

const ASCII: u16 = 2;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const RATIONAL: u16 = 5;

/// Fields to embed in a fixture's EXIF block.
#[derive(Debug, Clone, Default)]
pub struct ExifFixture {
    pub orientation: Option<u16>,
    pub datetime: Option<String>,
    pub gps: Option<(f64, f64)>,
}

impl ExifFixture {
    pub fn orientation(mut self, code: u16) -> Self {
        self.orientation = Some(code);
        self
    }

    pub fn datetime(mut self, value: &str) -> Self {
        self.datetime = Some(value.to_string());
        self
    }

    pub fn gps(mut self, latitude: f64, longitude: f64) -> Self {
        self.gps = Some((latitude, longitude));
        self
    }

    /// Little-endian TIFF structure carrying the configured fields.
    pub fn tiff(&self) -> Vec<u8> {
        let mut ifd0: Vec<Entry> = Vec::new();
        if let Some(code) = self.orientation {
            ifd0.push(Entry::new(0x0112, SHORT, 1, code.to_le_bytes().to_vec()));
        }
        if let Some(datetime) = &self.datetime {
            let mut bytes = datetime.as_bytes().to_vec();
            bytes.push(0);
            ifd0.push(Entry::new(0x0132, ASCII, bytes.len() as u32, bytes));
        }

        let gps_ifd = self.gps.map(|(lat, lon)| {
            let lat_ref: &[u8] = if lat < 0.0 { b"S\0" } else { b"N\0" };
            let lon_ref: &[u8] = if lon < 0.0 { b"W\0" } else { b"E\0" };
            vec![
                Entry::new(0x0001, ASCII, 2, lat_ref.to_vec()),
                Entry::new(0x0002, RATIONAL, 3, dms(lat.abs())),
                Entry::new(0x0003, ASCII, 2, lon_ref.to_vec()),
                Entry::new(0x0004, RATIONAL, 3, dms(lon.abs())),
            ]
        });

        if gps_ifd.is_some() {
            // Placeholder pointer, patched once IFD0's size is known
            ifd0.push(Entry::new(0x8825, LONG, 1, vec![0; 4]));
        }

        let ifd0_offset = 8u32;
        let gps_offset = ifd0_offset + ifd_len(&ifd0);
        if gps_ifd.is_some() {
            if let Some(pointer) = ifd0.iter_mut().find(|e| e.tag == 0x8825) {
                pointer.data = gps_offset.to_le_bytes().to_vec();
            }
        }

        let mut out = Vec::new();
        out.extend_from_slice(b"II");
        out.extend_from_slice(&42u16.to_le_bytes());
        out.extend_from_slice(&ifd0_offset.to_le_bytes());
        out.extend(serialize_ifd(&ifd0, ifd0_offset));
        if let Some(gps) = &gps_ifd {
            out.extend(serialize_ifd(gps, gps_offset));
        }
        out
    }

    /// Complete APP1 segment, marker included.
    pub fn app1_segment(&self) -> Vec<u8> {
        let tiff = self.tiff();
        let len = (2 + 6 + tiff.len()) as u16;
        let mut out = vec![0xFF, 0xE1];
        out.extend_from_slice(&len.to_be_bytes());
        out.extend_from_slice(b"Exif\0\0");
        out.extend(tiff);
        out
    }
}

struct Entry {
    tag: u16,
    kind: u16,
    count: u32,
    data: Vec<u8>,
}

impl Entry {
    fn new(tag: u16, kind: u16, count: u32, data: Vec<u8>) -> Self {
        Self {
            tag,
            kind,
            count,
            data,
        }
    }

    fn external_len(&self) -> u32 {
        if self.data.len() > 4 {
            (self.data.len() as u32 + 1) & !1
        } else {
            0
        }
    }
}

fn ifd_len(entries: &[Entry]) -> u32 {
    2 + 12 * entries.len() as u32 + 4 + entries.iter().map(Entry::external_len).sum::<u32>()
}

fn serialize_ifd(entries: &[Entry], offset: u32) -> Vec<u8> {
    let mut head = Vec::new();
    let mut data = Vec::new();
    let data_start = offset + 2 + 12 * entries.len() as u32 + 4;

    head.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    for entry in entries {
        head.extend_from_slice(&entry.tag.to_le_bytes());
        head.extend_from_slice(&entry.kind.to_le_bytes());
        head.extend_from_slice(&entry.count.to_le_bytes());
        if entry.data.len() <= 4 {
            let mut inline = entry.data.clone();
            inline.resize(4, 0);
            head.extend(inline);
        } else {
            let at = data_start + data.len() as u32;
            head.extend_from_slice(&at.to_le_bytes());
            data.extend_from_slice(&entry.data);
            if data.len() % 2 == 1 {
                data.push(0);
            }
        }
    }
    head.extend_from_slice(&0u32.to_le_bytes());
    head.extend(data);
    head
}

/// Degrees/minutes/seconds as three little-endian rationals.
fn dms(value: f64) -> Vec<u8> {
    let degrees = value.trunc();
    let minutes_full = (value - degrees) * 60.0;
    let minutes = minutes_full.trunc();
    let seconds = ((minutes_full - minutes) * 60.0 * 10000.0).round();

    let mut out = Vec::new();
    for (num, denom) in [
        (degrees as u32, 1u32),
        (minutes as u32, 1),
        (seconds as u32, 10000),
    ] {
        out.extend_from_slice(&num.to_le_bytes());
        out.extend_from_slice(&denom.to_le_bytes());
    }
    out
}

// =========================================================================
// JPEG fixtures
// =========================================================================

/// Encode a gradient image as a baseline JPEG.
pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            128,
        ])
    });
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, 90)
        .encode_image(&img)
        .unwrap();
    bytes
}

/// Splice an APP1 EXIF segment right after the SOI marker.
pub fn with_exif(jpeg: Vec<u8>, exif: &ExifFixture) -> Vec<u8> {
    assert_eq!(&jpeg[..2], &[0xFF, 0xD8], "not a JPEG stream");
    let mut out = jpeg[..2].to_vec();
    out.extend(exif.app1_segment());
    out.extend_from_slice(&jpeg[2..]);
    out
}

/// Write a `width` x `height` JPEG to `dir/name`, optionally with EXIF.
pub fn write_jpeg(
    dir: &Path,
    name: &str,
    width: u32,
    height: u32,
    exif: Option<&ExifFixture>,
) -> PathBuf {
    let bytes = jpeg_bytes(width, height);
    let bytes = match exif {
        Some(exif) => with_exif(bytes, exif),
        None => bytes,
    };
    let path = dir.join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}
