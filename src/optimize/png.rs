//! Lossless PNG recompression via [oxipng](https://docs.rs/oxipng).

use super::{ImageFormat, OptimizeError, Optimizer};
use oxipng::{Options, StripChunks};

#[derive(Debug, Clone)]
pub struct PngOptimizer {
    preset: u8,
}

impl PngOptimizer {
    /// `preset` follows oxipng's `-o` levels, 0 (fast) to 6 (small).
    pub fn new(preset: u8) -> Self {
        Self {
            preset: preset.min(6),
        }
    }

    fn options(&self) -> Options {
        let mut opts = Options::from_preset(self.preset);
        // Color-affecting chunks (gAMA, iCCP, sRGB...) are preserved.
        opts.strip = StripChunks::Safe;
        opts
    }
}

impl Optimizer for PngOptimizer {
    fn format(&self) -> ImageFormat {
        ImageFormat::Png
    }

    fn optimize(&self, data: &[u8]) -> Result<Vec<u8>, OptimizeError> {
        oxipng::optimize_from_memory(data, &self.options())
            .map_err(|e| OptimizeError::Png(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::png_bytes;

    #[test]
    fn recompresses_without_changing_pixels() {
        let input = png_bytes(32, 32);
        let out = PngOptimizer::new(2).optimize(&input).unwrap();

        assert!(out.len() <= input.len());
        let before = image::load_from_memory(&input).unwrap().to_rgba8();
        let after = image::load_from_memory(&out).unwrap().to_rgba8();
        assert_eq!(before, after);
    }

    #[test]
    fn garbage_is_an_error() {
        let err = PngOptimizer::new(2)
            .optimize(b"\x89PNG\r\n\x1a\nnot really")
            .unwrap_err();
        assert!(matches!(err, OptimizeError::Png(_)));
    }

    #[test]
    fn preset_is_clamped() {
        assert_eq!(PngOptimizer::new(9).preset, 6);
    }
}
