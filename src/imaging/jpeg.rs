//! JPEG marker-segment splicing.
//!
//! Metadata lives in application segments ahead of the entropy-coded image
//! data: EXIF in APP1 (`Exif\0\0` + TIFF block), IPTC in APP13
//! (`Photoshop 3.0\0` + 8BIM resources). Rewriting either one means splitting
//! the file into its header segments, swapping the matching segment, and
//! reassembling. Everything from SOS onwards is copied through untouched.
//!
//! ```text
//! FF D8                      SOI
//! FF E0 <len> JFIF…          APP0
//! FF E1 <len> Exif\0\0…      APP1   ← replaced / inserted
//! FF ED <len> Photoshop…     APP13  ← replaced / inserted
//! FF DB / C0 / C4 …          tables, frame header
//! FF DA …                    SOS + scan data (opaque tail)
//! ```

use thiserror::Error;

pub const APP1: u8 = 0xE1;
pub const APP13: u8 = 0xED;

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;

/// Largest payload a length-prefixed segment can carry (65535 minus the
/// two length bytes).
pub const MAX_SEGMENT_PAYLOAD: usize = 0xFFFF - 2;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SegmentError {
    #[error("not a JPEG file (missing SOI marker)")]
    NotJpeg,
    #[error("truncated segment at byte {0}")]
    Truncated(usize),
    #[error("expected marker at byte {0}")]
    MissingMarker(usize),
    #[error("image data ended before the first scan")]
    NoScan,
    #[error("segment payload of {0} bytes exceeds the 65533-byte limit")]
    TooLarge(usize),
}

/// One length-prefixed header segment. `payload` excludes the marker and
/// length bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub marker: u8,
    pub payload: Vec<u8>,
}

impl Segment {
    fn is_app(&self, marker: u8, signature: &[u8]) -> bool {
        self.marker == marker && self.payload.starts_with(signature)
    }
}

/// A JPEG split into header segments and the opaque scan tail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JpegFile {
    pub segments: Vec<Segment>,
    /// Bytes from the first SOS marker to the end of the file.
    pub tail: Vec<u8>,
}

impl JpegFile {
    pub fn parse(data: &[u8]) -> Result<Self, SegmentError> {
        if data.len() < 2 || data[0] != 0xFF || data[1] != SOI {
            return Err(SegmentError::NotJpeg);
        }

        let mut segments = Vec::new();
        let mut pos = 2;

        loop {
            if pos >= data.len() {
                return Err(SegmentError::NoScan);
            }
            if data[pos] != 0xFF {
                return Err(SegmentError::MissingMarker(pos));
            }
            // Fill bytes: any number of 0xFF may precede a marker.
            while pos + 1 < data.len() && data[pos + 1] == 0xFF {
                pos += 1;
            }
            if pos + 1 >= data.len() {
                return Err(SegmentError::Truncated(pos));
            }

            let marker = data[pos + 1];
            match marker {
                SOS => {
                    return Ok(Self {
                        segments,
                        tail: data[pos..].to_vec(),
                    });
                }
                EOI => return Err(SegmentError::NoScan),
                // Standalone markers carry no length field
                0x01 | 0xD0..=0xD7 => {
                    pos += 2;
                    continue;
                }
                _ => {}
            }

            if pos + 4 > data.len() {
                return Err(SegmentError::Truncated(pos));
            }
            let len = u16::from_be_bytes([data[pos + 2], data[pos + 3]]) as usize;
            if len < 2 || pos + 2 + len > data.len() {
                return Err(SegmentError::Truncated(pos));
            }
            segments.push(Segment {
                marker,
                payload: data[pos + 4..pos + 2 + len].to_vec(),
            });
            pos += 2 + len;
        }
    }

    /// First segment with `marker` whose payload starts with `signature`.
    pub fn find(&self, marker: u8, signature: &[u8]) -> Option<&Segment> {
        self.segments.iter().find(|s| s.is_app(marker, signature))
    }

    /// Replace every `marker` segment starting with `signature` by a single
    /// segment carrying `payload` (or drop them all when `payload` is `None`).
    ///
    /// The new segment takes the place of the first match; without a match
    /// it goes after the leading run of APPn segments numbered up to
    /// `marker`, so APP0 (JFIF) stays first.
    pub fn replace_app(
        &mut self,
        marker: u8,
        signature: &[u8],
        payload: Option<Vec<u8>>,
    ) -> Result<(), SegmentError> {
        if let Some(len) = payload.as_ref().map(Vec::len).filter(|&l| l > MAX_SEGMENT_PAYLOAD) {
            return Err(SegmentError::TooLarge(len));
        }

        let first_match = self.segments.iter().position(|s| s.is_app(marker, signature));
        self.segments.retain(|s| !s.is_app(marker, signature));

        let Some(payload) = payload else {
            return Ok(());
        };

        let at = first_match.unwrap_or_else(|| {
            self.segments
                .iter()
                .take_while(|s| (0xE0..=marker).contains(&s.marker))
                .count()
        });
        self.segments.insert(at, Segment { marker, payload });
        Ok(())
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let header_len: usize = self.segments.iter().map(|s| s.payload.len() + 4).sum();
        let mut out = Vec::with_capacity(2 + header_len + self.tail.len());
        out.extend_from_slice(&[0xFF, SOI]);
        for segment in &self.segments {
            out.extend_from_slice(&[0xFF, segment.marker]);
            out.extend_from_slice(&((segment.payload.len() + 2) as u16).to_be_bytes());
            out.extend_from_slice(&segment.payload);
        }
        out.extend_from_slice(&self.tail);
        out
    }
}
