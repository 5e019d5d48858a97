//! JPEG metadata stripping.
//!
//! Copies the marker segments before the scan, dropping comments (`COM`) and
//! application segments other than JFIF (`APP0`), ICC profiles
//! (`APP2 "ICC_PROFILE\0"`) and Adobe color transforms (`APP14 "Adobe"`).
//! Everything from start-of-scan onward is copied verbatim, so the entropy
//! coded data is never re-encoded.
//!
//! EXIF (`APP1`) goes too, including any orientation tag.

use super::{ImageFormat, OptimizeError, Optimizer, be_u16};

const SOI: u8 = 0xD8;
const EOI: u8 = 0xD9;
const SOS: u8 = 0xDA;
const COM: u8 = 0xFE;
const APP0: u8 = 0xE0;
const APP2: u8 = 0xE2;
const APP14: u8 = 0xEE;
const APP15: u8 = 0xEF;

#[derive(Debug, Default, Clone, Copy)]
pub struct JpegOptimizer;

impl Optimizer for JpegOptimizer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Jpeg
    }

    fn optimize(&self, data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        strip_metadata(data)
    }
}

fn malformed(reason: &str) -> OptimizeError {
    OptimizeError::malformed(ImageFormat::Jpeg, reason)
}

pub fn strip_metadata(data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != SOI {
        return Err(malformed("missing SOI marker"));
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..2]);
    let mut pos = 2;

    loop {
        if data.get(pos) != Some(&0xFF) {
            return Err(malformed(&format!("expected marker at offset {pos}")));
        }
        // Fill bytes before a marker are allowed.
        while data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let Some(&marker) = data.get(pos + 1) else {
            return Err(malformed("truncated marker"));
        };

        match marker {
            SOS | EOI => {
                out.extend_from_slice(&data[pos..]);
                return Ok(out);
            }
            0x01 | 0xD0..=0xD7 => {
                out.extend_from_slice(&data[pos..pos + 2]);
                pos += 2;
            }
            _ => {
                let len = be_u16(data, pos + 2).ok_or_else(|| malformed("truncated segment"))?
                    as usize;
                let end = pos + 2 + len;
                if len < 2 || end > data.len() {
                    return Err(malformed(&format!("bad length for marker 0x{marker:02X}")));
                }
                if keep_segment(marker, &data[pos + 4..end]) {
                    out.extend_from_slice(&data[pos..end]);
                }
                pos = end;
            }
        }
    }
}

fn keep_segment(marker: u8, payload: &[u8]) -> bool {
    match marker {
        COM => false,
        APP0 => true,
        APP2 => payload.starts_with(b"ICC_PROFILE\0"),
        APP14 => payload.starts_with(b"Adobe"),
        m if (APP0..=APP15).contains(&m) => false,
        _ => true,
    }
}
