//! EXIF metadata extraction: orientation, GPS, and capture timestamp.
//!
//! Always run against the *original* file, since re-encoding drops the
//! EXIF block.

use chrono::{DateTime, Datelike, NaiveDateTime, Utc};
use exif::{In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};
use crate::media_index::MediaIndex;
use crate::types::{ExifRecord, Orientation};

/// Format of the EXIF DateTime field.
const EXIF_DATETIME_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Years accepted when guessing the unit of a "date added" value.
const PLAUSIBLE_YEARS: std::ops::RangeInclusive<i32> = 1971..=2100;

/// A record plus the error met while reading it.
///
/// On failure the record carries default orientation (rotation 0) so the
/// caller can continue without orientation correction.
#[derive(Debug)]
pub struct ExifOutcome {
    pub record: ExifRecord,
    pub error: Option<PipelineError>,
}

impl ExifOutcome {
    pub fn original_rotation(&self) -> u32 {
        self.record.original_rotation()
    }
}

/// Reads EXIF blocks into [`ExifRecord`]s.
pub struct ExifReader;

impl ExifReader {
    /// Parse the EXIF block of `path`.
    ///
    /// A file without an EXIF block yields a default record; only an
    /// unreadable file or a malformed block is an error. The timestamp is
    /// filled from the EXIF DateTime only.
    pub fn read(path: &Path) -> PipelineResult<ExifRecord> {
        let file = File::open(path).map_err(|e| PipelineError::MetadataRead {
            path: path.to_path_buf(),
            message: format!("Cannot open file: {e}"),
        })?;
        let mut reader = BufReader::new(file);

        let exif = match Reader::new().read_from_container(&mut reader) {
            Ok(exif) => exif,
            Err(exif::Error::NotFound(_)) => {
                tracing::debug!("No EXIF block in {:?}", path);
                return Ok(ExifRecord::default());
            }
            Err(e) => {
                return Err(PipelineError::MetadataRead {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                })
            }
        };

        let (latitude, longitude) = Self::get_location(&exif).unzip();
        let orientation = Self::get_u32(&exif, Tag::Orientation)
            .map(Orientation::from_exif_code)
            .unwrap_or_default();
        let datetime = Self::get_ascii(&exif, Tag::DateTime)
            .or_else(|| Self::get_ascii(&exif, Tag::DateTimeOriginal));
        let timestamp = datetime.as_deref().and_then(exif_datetime_to_iso);

        Ok(ExifRecord {
            latitude,
            longitude,
            orientation,
            datetime,
            timestamp,
        })
    }

    /// Read with the timestamp fallback applied.
    ///
    /// When EXIF yields no usable timestamp, the "date added" value is taken
    /// from `date_added` if given, otherwise from `index`, and resolved with
    /// [`timestamp_from_date_added`]. Read failures are returned next to a
    /// default record instead of aborting.
    pub fn read_with_fallback(
        path: &Path,
        index: &dyn MediaIndex,
        date_added: Option<i64>,
    ) -> ExifOutcome {
        let (mut record, error) = match Self::read(path) {
            Ok(record) => (record, None),
            Err(e) => {
                tracing::warn!("{}", e);
                (ExifRecord::default(), Some(e))
            }
        };

        if record.timestamp.is_none() {
            if let Some(datetime) = &record.datetime {
                tracing::debug!("Unparsable EXIF datetime {:?} in {:?}", datetime, path);
            }
            let raw = date_added.or_else(|| index.date_added(path));
            record.timestamp = raw.and_then(|raw| {
                let resolved = timestamp_from_date_added(raw);
                if resolved.is_none() {
                    tracing::warn!("Ignoring implausible date added value {} for {:?}", raw, path);
                }
                resolved
            });
        }

        ExifOutcome { record, error }
    }

    /// Orientation only, treating any failure as `Normal`.
    pub fn orientation(path: &Path) -> Orientation {
        match Self::read(path) {
            Ok(record) => record.orientation,
            Err(e) => {
                tracing::warn!("Skipping orientation correction: {}", e);
                Orientation::Normal
            }
        }
    }

    /// Get a raw ASCII field as a string, without the display formatting
    /// kamadak-exif applies to date fields.
    fn get_ascii(exif: &exif::Exif, tag: Tag) -> Option<String> {
        let field = exif.get_field(tag, In::PRIMARY)?;
        match &field.value {
            Value::Ascii(values) => values.first().map(|bytes| {
                String::from_utf8_lossy(bytes)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string()
            }),
            _ => None,
        }
    }

    fn get_u32(exif: &exif::Exif, tag: Tag) -> Option<u32> {
        exif.get_field(tag, In::PRIMARY)
            .and_then(|f| f.value.get_uint(0))
    }

    /// Latitude and longitude, suppressed when both are exactly zero.
    ///
    /// A genuine (0°, 0°) reading is indistinguishable from an unset one and
    /// is dropped along with it.
    fn get_location(exif: &exif::Exif) -> Option<(f64, f64)> {
        let latitude = Self::get_gps_coord(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef)?;
        let longitude = Self::get_gps_coord(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef)?;
        if latitude == 0.0 && longitude == 0.0 {
            return None;
        }
        Some((latitude, longitude))
    }

    /// Get GPS coordinate, converting from degrees/minutes/seconds to decimal.
    fn get_gps_coord(exif: &exif::Exif, coord_tag: Tag, ref_tag: Tag) -> Option<f64> {
        let coord = exif.get_field(coord_tag, In::PRIMARY)?;
        let degrees = Self::parse_gps_rationals(&coord.value)?;

        let reference = Self::get_ascii(exif, ref_tag)?;
        let sign = if reference.starts_with('S') || reference.starts_with('W') {
            -1.0
        } else {
            1.0
        };

        Some(sign * degrees)
    }

    fn parse_gps_rationals(value: &Value) -> Option<f64> {
        match value {
            Value::Rational(rationals) if rationals.len() >= 3 => {
                if rationals[..3].iter().any(|r| r.denom == 0) {
                    return None;
                }
                let degrees = rationals[0].to_f64();
                let minutes = rationals[1].to_f64();
                let seconds = rationals[2].to_f64();
                Some(degrees + minutes / 60.0 + seconds / 3600.0)
            }
            _ => None,
        }
    }
}

/// Reinterpret a naive EXIF datetime ("YYYY:MM:DD HH:MM:SS") as UTC.
pub fn exif_datetime_to_iso(value: &str) -> Option<String> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), EXIF_DATETIME_FORMAT).ok()?;
    Some(format_iso(&naive.and_utc()))
}

/// Resolve a "date added" value of unknown unit.
///
/// Seconds since epoch are tried first and accepted if the year lands in
/// 1971..=2100; otherwise the same value is tried as milliseconds.
pub fn timestamp_from_date_added(raw: i64) -> Option<String> {
    let plausible = |dt: &DateTime<Utc>| PLAUSIBLE_YEARS.contains(&dt.year());

    if let Some(dt) = DateTime::from_timestamp(raw, 0).filter(plausible) {
        tracing::trace!("  date added {} read as seconds", raw);
        return Some(format_iso(&dt));
    }
    if let Some(dt) = DateTime::from_timestamp_millis(raw).filter(plausible) {
        tracing::trace!("  date added {} read as milliseconds", raw);
        return Some(format_iso(&dt));
    }
    None
}

fn format_iso(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}
