//! Lossless image optimization.
//!
//! An [`ImageOptimizerPipeline`] is an ordered list of [`Optimizer`] steps,
//! one per format:
//!
//! | Step | Format | What it removes |
//! |------|--------|-----------------|
//! | [`gif::GifOptimizer`] | GIF | comment and non-looping application extensions |
//! | [`jpeg::JpegOptimizer`] | JPEG | COM and APPn segments other than JFIF, ICC and Adobe |
//! | [`png::PngOptimizer`] | PNG | recompression via oxipng, safe ancillary chunks |
//! | [`svg::SvgOptimizer`] | SVG | XML declaration, comments, doctype, metadata, inter-tag whitespace |
//!
//! Pixels are never touched. Each step that accepts the file's format runs in
//! order on the previous step's output, and a result is only kept when it is
//! smaller than its input. Unrecognized files pass through unchanged.

pub mod gif;
pub mod jpeg;
pub mod png;
pub mod svg;

use crate::config::ImagesConfig;
use std::fmt;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OptimizeError {
    #[error("malformed {format}: {reason}")]
    Malformed {
        format: ImageFormat,
        reason: String,
    },
    #[error("png optimization failed: {0}")]
    Png(String),
}

impl OptimizeError {
    pub(crate) fn malformed(format: ImageFormat, reason: impl Into<String>) -> Self {
        Self::Malformed {
            format,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageFormat {
    Gif,
    Jpeg,
    Png,
    Svg,
}

impl fmt::Display for ImageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ImageFormat::Gif => "gif",
            ImageFormat::Jpeg => "jpeg",
            ImageFormat::Png => "png",
            ImageFormat::Svg => "svg",
        })
    }
}

impl ImageFormat {
    /// Sniff the format from magic bytes, falling back to the extension for
    /// SVG (text formats have no reliable signature).
    pub fn detect(path: &Path, data: &[u8]) -> Option<Self> {
        match image::guess_format(data) {
            Ok(image::ImageFormat::Gif) => return Some(ImageFormat::Gif),
            Ok(image::ImageFormat::Jpeg) => return Some(ImageFormat::Jpeg),
            Ok(image::ImageFormat::Png) => return Some(ImageFormat::Png),
            _ => {}
        }
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        let head = String::from_utf8_lossy(&data[..data.len().min(512)]);
        if ext == "svg" || head.trim_start().starts_with("<svg") {
            return Some(ImageFormat::Svg);
        }
        None
    }
}

/// One lossless optimization step for a single format.
///
/// Steps run on rayon worker threads, so implementations must be `Send + Sync`.
pub trait Optimizer: Send + Sync {
    fn format(&self) -> ImageFormat;

    /// Return optimized bytes. Returning something larger is allowed; the
    /// pipeline discards it.
    fn optimize(&self, data: &[u8]) -> Result<Vec<u8>, OptimizeError>;
}

/// Result of running one file through the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Optimized {
    pub format: Option<ImageFormat>,
    pub bytes: Vec<u8>,
}

pub struct ImageOptimizerPipeline {
    steps: Vec<Box<dyn Optimizer>>,
}

impl ImageOptimizerPipeline {
    /// The stock GIF → JPEG → PNG → SVG pipeline.
    pub fn from_config(config: &ImagesConfig) -> Self {
        Self::with_steps(vec![
            Box::new(gif::GifOptimizer),
            Box::new(jpeg::JpegOptimizer),
            Box::new(png::PngOptimizer::new(config.png_preset)),
            Box::new(svg::SvgOptimizer {
                remove_view_box: config.remove_view_box,
            }),
        ])
    }

    pub fn with_steps(steps: Vec<Box<dyn Optimizer>>) -> Self {
        Self { steps }
    }

    /// Formats of the configured steps, in order.
    pub fn steps(&self) -> Vec<ImageFormat> {
        self.steps.iter().map(|s| s.format()).collect()
    }

    pub fn run(&self, path: &Path, data: &[u8]) -> Result<Optimized, OptimizeError> {
        let format = ImageFormat::detect(path, data);
        let mut bytes = data.to_vec();
        if let Some(format) = format {
            for step in self.steps.iter().filter(|s| s.format() == format) {
                let candidate = step.optimize(&bytes)?;
                if candidate.len() < bytes.len() {
                    bytes = candidate;
                }
            }
        }
        Ok(Optimized { format, bytes })
    }
}

/// Read a big-endian u16 at `pos`.
pub(crate) fn be_u16(data: &[u8], pos: usize) -> Option<u16> {
    data.get(pos..pos + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
}
