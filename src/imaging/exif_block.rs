//! EXIF block read/update for JPEG files.
//!
//! The TIFF-structured block is parsed and re-serialized with `kamadak-exif`
//! (`exif::Reader` / `exif::experimental::Writer`); splicing it back into the
//! APP1 segment is done by [`JpegFile`].
//!
//! Existing primary-IFD fields are carried over. The thumbnail IFD is dropped
//! because the writer would need the thumbnail bytes re-attached.

use super::jpeg::{APP1, JpegFile, SegmentError};
use exif::experimental::Writer;
use exif::{Context, Field, In, Rational, Reader, Tag, Value};
use std::io::Cursor;
use thiserror::Error;

pub const EXIF_HEADER: &[u8] = b"Exif\0\0";

#[derive(Error, Debug)]
pub enum ExifBlockError {
    #[error("existing EXIF block is unreadable: {0}")]
    Read(exif::Error),
    #[error("failed to serialize EXIF block: {0}")]
    Write(exif::Error),
    #[error("coordinate out of range: {0}")]
    Coordinate(f64),
    #[error(transparent)]
    Segment(#[from] SegmentError),
}

/// A decimal-degree position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsPoint {
    pub latitude: f64,
    pub longitude: f64,
}

/// Capture fields read back from an EXIF block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CaptureFields {
    /// `DateTimeOriginal`, verbatim (`YYYY:MM:DD HH:MM:SS`).
    pub taken_at: Option<String>,
    pub gps: Option<GpsPoint>,
}

/// Primary-IFD fields of the current EXIF block. No block → empty.
pub fn existing_fields(jpeg: &JpegFile) -> Result<Vec<Field>, ExifBlockError> {
    let Some(segment) = jpeg.find(APP1, EXIF_HEADER) else {
        return Ok(Vec::new());
    };
    let exif = Reader::new()
        .read_raw(segment.payload[EXIF_HEADER.len()..].to_vec())
        .map_err(ExifBlockError::Read)?;

    Ok(exif
        .fields()
        .filter(|f| f.ifd_num == In::PRIMARY)
        .filter(|f| !matches!(f.value, Value::Unknown(..)))
        .cloned()
        .collect())
}

/// Degrees → `[deg, min, sec]` rationals, seconds to 1/10000.
fn to_dms(value: f64) -> Vec<Rational> {
    let v = value.abs();
    let degrees = v.trunc();
    let minutes_f = (v - degrees) * 60.0;
    let minutes = minutes_f.trunc();
    let seconds = (minutes_f - minutes) * 60.0;
    vec![
        Rational { num: degrees as u32, denom: 1 },
        Rational { num: minutes as u32, denom: 1 },
        Rational { num: (seconds * 10_000.0).round() as u32, denom: 10_000 },
    ]
}

fn from_dms(value: &Value) -> Option<f64> {
    let Value::Rational(parts) = value else {
        return None;
    };
    if parts.len() < 3 || parts.iter().take(3).any(|r| r.denom == 0) {
        return None;
    }
    Some(parts[0].to_f64() + parts[1].to_f64() / 60.0 + parts[2].to_f64() / 3600.0)
}

fn ascii(value: &str) -> Value {
    Value::Ascii(vec![value.as_bytes().to_vec()])
}

fn first_ascii(value: &Value) -> Option<String> {
    match value {
        Value::Ascii(parts) => parts
            .first()
            .map(|p| String::from_utf8_lossy(p).trim_end_matches('\0').to_string()),
        _ => None,
    }
}

fn field(tag: Tag, value: Value) -> Field {
    Field {
        tag,
        ifd_num: In::PRIMARY,
        value,
    }
}

/// Build a full APP1 payload (`Exif\0\0` + TIFF block).
///
/// `DateTimeOriginal` is always set. With `gps`, every existing GPS field is
/// replaced by version, latitude and longitude (with N/S, E/W refs); without
/// it, existing GPS fields are kept.
pub fn build_payload(
    existing: Vec<Field>,
    taken_at: &str,
    gps: Option<GpsPoint>,
) -> Result<Vec<u8>, ExifBlockError> {
    if let Some(point) = gps {
        if !(-90.0..=90.0).contains(&point.latitude) {
            return Err(ExifBlockError::Coordinate(point.latitude));
        }
        if !(-180.0..=180.0).contains(&point.longitude) {
            return Err(ExifBlockError::Coordinate(point.longitude));
        }
    }

    let mut fields: Vec<Field> = existing
        .into_iter()
        .filter(|f| f.tag != Tag::DateTimeOriginal)
        .filter(|f| gps.is_none() || f.tag.context() != Context::Gps)
        .collect();

    fields.push(field(Tag::DateTimeOriginal, ascii(taken_at)));

    if let Some(point) = gps {
        let lat_ref = if point.latitude < 0.0 { "S" } else { "N" };
        let lon_ref = if point.longitude < 0.0 { "W" } else { "E" };
        fields.push(field(Tag::GPSVersionID, Value::Byte(vec![2, 3, 0, 0])));
        fields.push(field(Tag::GPSLatitudeRef, ascii(lat_ref)));
        fields.push(field(Tag::GPSLatitude, Value::Rational(to_dms(point.latitude))));
        fields.push(field(Tag::GPSLongitudeRef, ascii(lon_ref)));
        fields.push(field(Tag::GPSLongitude, Value::Rational(to_dms(point.longitude))));
    }

    let mut writer = Writer::new();
    for f in &fields {
        writer.push_field(f);
    }
    let mut tiff = Cursor::new(Vec::new());
    writer.write(&mut tiff, false).map_err(ExifBlockError::Write)?;

    let mut payload = EXIF_HEADER.to_vec();
    payload.extend_from_slice(&tiff.into_inner());
    Ok(payload)
}

/// Read the capture timestamp and GPS position from `jpeg`.
pub fn read_capture_fields(jpeg: &JpegFile) -> Result<CaptureFields, ExifBlockError> {
    let fields = existing_fields(jpeg)?;
    let get = |tag: Tag| fields.iter().find(|f| f.tag == tag).map(|f| &f.value);

    let taken_at = get(Tag::DateTimeOriginal).and_then(first_ascii);

    let signed = |coord: Tag, reference: Tag, negative: &str| {
        let magnitude = get(coord).and_then(from_dms)?;
        let is_negative = get(reference)
            .and_then(first_ascii)
            .is_some_and(|r| r.eq_ignore_ascii_case(negative));
        Some(if is_negative { -magnitude } else { magnitude })
    };
    let gps = match (
        signed(Tag::GPSLatitude, Tag::GPSLatitudeRef, "S"),
        signed(Tag::GPSLongitude, Tag::GPSLongitudeRef, "W"),
    ) {
        (Some(latitude), Some(longitude)) => Some(GpsPoint { latitude, longitude }),
        _ => None,
    };

    Ok(CaptureFields { taken_at, gps })
}

/// Replace the EXIF block of `jpeg` with one carrying the capture fields.
///
/// An unreadable existing block is reported through `on_unreadable` and then
/// treated as empty.
pub fn update_capture(
    jpeg: &mut JpegFile,
    taken_at: &str,
    gps: Option<GpsPoint>,
    on_unreadable: impl FnOnce(ExifBlockError),
) -> Result<(), ExifBlockError> {
    let existing = existing_fields(jpeg).unwrap_or_else(|e| {
        on_unreadable(e);
        Vec::new()
    });
    let payload = build_payload(existing, taken_at, gps)?;
    jpeg.replace_app(APP1, EXIF_HEADER, Some(payload))?;
    Ok(())
}
