//! Minimal IPTC-IIM reader/writer for JPEG files.
//!
//! IPTC lives in the JPEG APP13 segment as Photoshop 8BIM resource 0x0404.
//! The writer only touches Caption-Abstract (2:120); every other dataset and
//! every other 8BIM resource already in the file is carried through.
//!
//! Reading extracts three fields from Record 2:
//! - ObjectName (2:05): title
//! - Caption-Abstract (2:120): caption
//! - Keywords (2:25): repeatable, collected into a Vec

use super::jpeg::{APP13, JpegFile, SegmentError};
use std::path::Path;

/// IPTC metadata extracted from an image file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IptcData {
    pub object_name: Option<String>,
    pub caption: Option<String>,
    pub keywords: Vec<String>,
}

pub const PHOTOSHOP_HEADER: &[u8] = b"Photoshop 3.0\0";
const BIM_MARKER: &[u8] = b"8BIM";
const IPTC_RESOURCE_ID: u16 = 0x0404;

const TAG_MARKER: u8 = 0x1C;
const RECORD_ENVELOPE: u8 = 1;
const RECORD_APPLICATION: u8 = 2;
const DATASET_CODED_CHARSET: u8 = 90;
const DATASET_RECORD_VERSION: u8 = 0;
const DATASET_OBJECT_NAME: u8 = 5;
const DATASET_KEYWORDS: u8 = 25;
const DATASET_CAPTION: u8 = 120;

/// ISO 2022 escape sequence declaring UTF-8 (`ESC % G`).
const UTF8_CHARSET: &[u8] = &[0x1B, 0x25, 0x47];

/// IIM limit for Caption-Abstract.
pub const MAX_CAPTION_BYTES: usize = 2000;

/// Read IPTC metadata from a JPEG file.
/// Returns default (empty) metadata on any read or parse failure.
pub fn read_iptc(path: &Path) -> IptcData {
    let Ok(bytes) = std::fs::read(path) else {
        return IptcData::default();
    };
    let Ok(jpeg) = JpegFile::parse(&bytes) else {
        return IptcData::default();
    };
    summarize(&current_datasets(&jpeg))
}

// ---------------------------------------------------------------------------
// IPTC-IIM datasets
// ---------------------------------------------------------------------------

/// One IIM dataset, kept raw so unknown datasets survive a rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dataset {
    pub record: u8,
    pub number: u8,
    pub data: Vec<u8>,
}

impl Dataset {
    fn is(&self, record: u8, number: u8) -> bool {
        self.record == record && self.number == number
    }
}

/// Parse raw IPTC-IIM bytes into datasets.
///
/// IIM record format (each dataset):
///   Byte 0:    0x1C (tag marker)
///   Byte 1:    Record number
///   Byte 2:    Dataset number
///   Bytes 3-4: Data length (big-endian u16; high bit set = extended length)
///   Bytes 5+:  Data
pub fn parse_datasets(data: &[u8]) -> Vec<Dataset> {
    let mut datasets = Vec::new();
    let mut pos = 0;

    while pos + 5 <= data.len() {
        if data[pos] != TAG_MARKER {
            pos += 1;
            continue;
        }

        let record = data[pos + 1];
        let number = data[pos + 2];
        let raw_len = u16::from_be_bytes([data[pos + 3], data[pos + 4]]);
        pos += 5;

        let length = if raw_len & 0x8000 != 0 {
            // Extended dataset: the low 15 bits count the length bytes that follow.
            let count = usize::from(raw_len & 0x7FFF);
            if count == 0 || count > 8 || pos + count > data.len() {
                break;
            }
            let len = data[pos..pos + count]
                .iter()
                .fold(0usize, |acc, b| (acc << 8) | usize::from(*b));
            pos += count;
            len
        } else {
            usize::from(raw_len)
        };

        let Some(end) = pos.checked_add(length).filter(|&end| end <= data.len()) else {
            break;
        };

        datasets.push(Dataset {
            record,
            number,
            data: data[pos..end].to_vec(),
        });
        pos = end;
    }

    datasets
}

/// Serialize datasets, envelope record first. Order within a record is kept.
pub fn encode_datasets(datasets: &[Dataset]) -> Vec<u8> {
    let mut ordered: Vec<&Dataset> = datasets.iter().collect();
    ordered.sort_by_key(|d| d.record);

    let mut out = Vec::new();
    for d in ordered {
        out.extend_from_slice(&[TAG_MARKER, d.record, d.number]);
        if d.data.len() < 0x8000 {
            out.extend_from_slice(&(d.data.len() as u16).to_be_bytes());
        } else {
            out.extend_from_slice(&[0x80, 0x04]);
            out.extend_from_slice(&(d.data.len() as u32).to_be_bytes());
        }
        out.extend_from_slice(&d.data);
    }
    out
}

/// Collapse datasets into the fields recap cares about.
fn summarize(datasets: &[Dataset]) -> IptcData {
    let mut result = IptcData::default();

    // Only Record 2 (Application Record) carries descriptive fields
    for d in datasets.iter().filter(|d| d.record == RECORD_APPLICATION) {
        let value = String::from_utf8_lossy(&d.data).trim().to_string();
        if value.is_empty() {
            continue;
        }
        match d.number {
            DATASET_OBJECT_NAME => result.object_name = Some(value),
            DATASET_KEYWORDS => result.keywords.push(value),
            DATASET_CAPTION => result.caption = Some(value),
            _ => {}
        }
    }

    result
}

/// Truncate to at most `max` bytes without splitting a character.
fn truncate_utf8(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

/// Set Caption-Abstract, declaring UTF-8 and a record version if missing.
pub fn apply_caption(datasets: &mut Vec<Dataset>, caption: &str) {
    let caption = truncate_utf8(caption, MAX_CAPTION_BYTES);

    datasets.retain(|d| !d.is(RECORD_APPLICATION, DATASET_CAPTION));
    datasets.retain(|d| !d.is(RECORD_ENVELOPE, DATASET_CODED_CHARSET));
    datasets.insert(
        0,
        Dataset {
            record: RECORD_ENVELOPE,
            number: DATASET_CODED_CHARSET,
            data: UTF8_CHARSET.to_vec(),
        },
    );

    if !datasets
        .iter()
        .any(|d| d.is(RECORD_APPLICATION, DATASET_RECORD_VERSION))
    {
        datasets.push(Dataset {
            record: RECORD_APPLICATION,
            number: DATASET_RECORD_VERSION,
            data: vec![0x00, 0x04],
        });
    }

    datasets.push(Dataset {
        record: RECORD_APPLICATION,
        number: DATASET_CAPTION,
        data: caption.as_bytes().to_vec(),
    });
}

// ---------------------------------------------------------------------------
// Photoshop 8BIM resources
// ---------------------------------------------------------------------------

/// One Photoshop image resource block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub id: u16,
    pub name: Vec<u8>,
    pub data: Vec<u8>,
}

/// Split a Photoshop 8BIM resource stream (with or without the
/// `Photoshop 3.0\0` header) into resources.
pub fn parse_resources(segment: &[u8]) -> Vec<Resource> {
    let data = segment.strip_prefix(PHOTOSHOP_HEADER).unwrap_or(segment);

    let mut resources = Vec::new();
    let mut pos = 0;
    while pos + 12 <= data.len() {
        // Each resource: "8BIM" (4) + resource_id (2) + pascal_string + data_len (4) + data
        if &data[pos..pos + 4] != BIM_MARKER {
            pos += 1;
            continue;
        }
        pos += 4;

        let id = u16::from_be_bytes([data[pos], data[pos + 1]]);
        pos += 2;

        // Pascal string: 1 byte length + string, padded to even total
        let name_len = usize::from(data[pos]);
        let name_total = 1 + name_len + ((1 + name_len) % 2);
        if pos + name_total + 4 > data.len() {
            break;
        }
        let name = data[pos + 1..pos + 1 + name_len].to_vec();
        pos += name_total;

        let res_len =
            u32::from_be_bytes([data[pos], data[pos + 1], data[pos + 2], data[pos + 3]]) as usize;
        pos += 4;

        let Some(end) = pos.checked_add(res_len).filter(|&end| end <= data.len()) else {
            break;
        };
        resources.push(Resource {
            id,
            name,
            data: data[pos..end].to_vec(),
        });

        // Advance past data, padded to even
        pos = end + (res_len % 2);
    }

    resources
}

/// Serialize resources behind the `Photoshop 3.0\0` header.
pub fn encode_resources(resources: &[Resource]) -> Vec<u8> {
    let mut out = PHOTOSHOP_HEADER.to_vec();
    for r in resources {
        out.extend_from_slice(BIM_MARKER);
        out.extend_from_slice(&r.id.to_be_bytes());

        let name_len = r.name.len().min(255);
        out.push(name_len as u8);
        out.extend_from_slice(&r.name[..name_len]);
        if (1 + name_len) % 2 == 1 {
            out.push(0);
        }

        out.extend_from_slice(&(r.data.len() as u32).to_be_bytes());
        out.extend_from_slice(&r.data);
        if r.data.len() % 2 == 1 {
            out.push(0);
        }
    }
    out
}

// ---------------------------------------------------------------------------
// JPEG: APP13 read/update
// ---------------------------------------------------------------------------

fn current_resources(jpeg: &JpegFile) -> Option<Vec<Resource>> {
    jpeg.find(APP13, PHOTOSHOP_HEADER)
        .map(|s| parse_resources(&s.payload))
}

fn current_datasets(jpeg: &JpegFile) -> Vec<Dataset> {
    current_resources(jpeg)
        .and_then(|rs| rs.into_iter().find(|r| r.id == IPTC_RESOURCE_ID))
        .map(|r| parse_datasets(&r.data))
        .unwrap_or_default()
}

/// Set (or keep) the caption inside `jpeg`'s APP13 segment.
///
/// Returns `false` when there was nothing to write: no caption given and no
/// IPTC block present. An empty or whitespace-only caption counts as none.
pub fn update_caption(jpeg: &mut JpegFile, caption: Option<&str>) -> Result<bool, SegmentError> {
    let existing = current_resources(jpeg);
    let mut datasets = current_datasets(jpeg);

    if let Some(caption) = caption.filter(|c| !c.trim().is_empty()) {
        apply_caption(&mut datasets, caption);
    }

    if existing.is_none() && datasets.is_empty() {
        return Ok(false);
    }

    let mut resources = existing.unwrap_or_default();
    let iptc = Resource {
        id: IPTC_RESOURCE_ID,
        name: Vec::new(),
        data: encode_datasets(&datasets),
    };
    match resources.iter_mut().find(|r| r.id == IPTC_RESOURCE_ID) {
        Some(slot) => *slot = iptc,
        None if !datasets.is_empty() => resources.push(iptc),
        None => {}
    }

    jpeg.replace_app(APP13, PHOTOSHOP_HEADER, Some(encode_resources(&resources)))?;
    Ok(true)
}
