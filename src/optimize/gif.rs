//! GIF block filter.
//!
//! Walks the block stream and copies everything except comment extensions
//! (`0x21 0xFE`) and application extensions other than the looping ones
//! (`NETSCAPE2.0`, `ANIMEXTS1.0`). Image data is copied byte for byte.
//!
//! Stream layout:
//!   Header (6) "GIF87a" / "GIF89a"
//!   Logical screen descriptor (7), packed byte at offset 4
//!   Global color table (3 * 2^(n+1) when packed & 0x80)
//!   Blocks:
//!     0x21 label sub-blocks... 0x00   extension
//!     0x2C descriptor(9) [lct] lzw sub-blocks... 0x00   image
//!     0x3B   trailer

use super::{ImageFormat, OptimizeError, Optimizer};

const EXTENSION: u8 = 0x21;
const IMAGE: u8 = 0x2C;
const TRAILER: u8 = 0x3B;
const COMMENT_LABEL: u8 = 0xFE;
const APPLICATION_LABEL: u8 = 0xFF;
const LOOPING_APPS: [&[u8]; 2] = [b"NETSCAPE2.0", b"ANIMEXTS1.0"];

#[derive(Debug, Default, Clone, Copy)]
pub struct GifOptimizer;

impl Optimizer for GifOptimizer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Gif
    }

    fn optimize(&self, data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        strip_extensions(data)
    }
}

fn malformed(reason: &str) -> OptimizeError {
    OptimizeError::malformed(ImageFormat::Gif, reason)
}

pub fn strip_extensions(data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
    if data.len() < 13 || !(data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a")) {
        return Err(malformed("missing header"));
    }
    let mut pos = 13 + color_table_len(data[10]);
    if pos > data.len() {
        return Err(malformed("truncated global color table"));
    }

    let mut out = Vec::with_capacity(data.len());
    out.extend_from_slice(&data[..pos]);

    loop {
        let Some(&introducer) = data.get(pos) else {
            return Err(malformed("missing trailer"));
        };
        match introducer {
            EXTENSION => {
                let label = *data.get(pos + 1).ok_or_else(|| malformed("truncated extension"))?;
                let end = skip_sub_blocks(data, pos + 2)?;
                if keep_extension(label, &data[pos + 2..end]) {
                    out.extend_from_slice(&data[pos..end]);
                }
                pos = end;
            }
            IMAGE => {
                let packed = *data
                    .get(pos + 9)
                    .ok_or_else(|| malformed("truncated image descriptor"))?;
                // descriptor + local color table + LZW minimum code size
                let data_start = pos + 10 + color_table_len(packed) + 1;
                if data_start > data.len() {
                    return Err(malformed("truncated image"));
                }
                let end = skip_sub_blocks(data, data_start)?;
                out.extend_from_slice(&data[pos..end]);
                pos = end;
            }
            TRAILER => {
                out.push(TRAILER);
                return Ok(out);
            }
            other => return Err(malformed(&format!("unexpected block 0x{other:02X}"))),
        }
    }
}

fn color_table_len(packed: u8) -> usize {
    if packed & 0x80 == 0 {
        0
    } else {
        3 * (1 << ((packed & 0x07) + 1))
    }
}

/// Position just past the zero-length terminator of the sub-block run at `pos`.
fn skip_sub_blocks(data: &[u8], mut pos: usize) -> Result<usize, OptimizeError> {
    loop {
        let len = *data.get(pos).ok_or_else(|| malformed("truncated sub-block"))? as usize;
        pos += 1;
        if len == 0 {
            return Ok(pos);
        }
        pos += len;
        if pos > data.len() {
            return Err(malformed("truncated sub-block"));
        }
    }
}

/// `blocks` starts at the first sub-block size byte.
fn keep_extension(label: u8, blocks: &[u8]) -> bool {
    match label {
        COMMENT_LABEL => false,
        APPLICATION_LABEL => {
            let id = blocks.get(1..12).unwrap_or_default();
            blocks.first() == Some(&11) && LOOPING_APPS.contains(&id)
        }
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEAD: &[u8] = &[
        b'G', b'I', b'F', b'8', b'9', b'a', 0x01, 0x00, 0x01, 0x00, 0x80, 0x00, 0x00, // LSD
        0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, // 2-color table
    ];
    const COMMENT: &[u8] = &[0x21, 0xFE, 0x05, b'h', b'e', b'l', b'l', b'o', 0x00];
    const LOOP: &[u8] = &[
        0x21, 0xFF, 0x0B, b'N', b'E', b'T', b'S', b'C', b'A', b'P', b'E', b'2', b'.', b'0',
        0x03, 0x01, 0x00, 0x00, 0x00,
    ];
    const XMP: &[u8] = &[
        0x21, 0xFF, 0x0B, b'X', b'M', b'P', b' ', b'D', b'a', b't', b'a', b'X', b'M', b'P',
        0x03, b'a', b'b', b'c', 0x00,
    ];
    const CONTROL: &[u8] = &[0x21, 0xF9, 0x04, 0x00, 0x0A, 0x00, 0x00, 0x00];
    const FRAME: &[u8] = &[
        0x2C, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x00, // descriptor
        0x02, 0x02, 0x44, 0x01, 0x00, // lzw
    ];

    fn gif(parts: &[&[u8]]) -> Vec<u8> {
        let mut out = HEAD.to_vec();
        for part in parts {
            out.extend_from_slice(part);
        }
        out.push(TRAILER);
        out
    }

    #[test]
    fn drops_comments_and_foreign_app_extensions() {
        let input = gif(&[COMMENT, XMP, CONTROL, FRAME]);
        let out = strip_extensions(&input).unwrap();
        assert_eq!(out, gif(&[CONTROL, FRAME]));
    }

    #[test]
    fn keeps_loop_extension() {
        let input = gif(&[LOOP, COMMENT, CONTROL, FRAME, CONTROL, FRAME]);
        let out = strip_extensions(&input).unwrap();
        assert_eq!(out, gif(&[LOOP, CONTROL, FRAME, CONTROL, FRAME]));
    }

    #[test]
    fn clean_gif_is_unchanged() {
        let input = gif(&[FRAME]);
        assert_eq!(strip_extensions(&input).unwrap(), input);
    }

    #[test]
    fn missing_trailer_is_malformed() {
        let mut input = gif(&[FRAME]);
        input.pop();
        assert!(matches!(
            strip_extensions(&input),
            Err(OptimizeError::Malformed {
                format: ImageFormat::Gif,
                ..
            })
        ));
    }

    #[test]
    fn truncated_sub_block_is_malformed() {
        let mut input = HEAD.to_vec();
        input.extend_from_slice(&[0x21, 0xFE, 0x09, b'x']);
        assert!(strip_extensions(&input).is_err());
    }

    #[test]
    fn encoder_output_survives() {
        let data = crate::test_helpers::gif_bytes(4, 4);
        let out = strip_extensions(&data).unwrap();
        let decoded = image::load_from_memory(&out).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 4));
    }
}
