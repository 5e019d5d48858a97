//! Shared test utilities for the sitepipe test suite.
//!
//! Provides a throwaway project tree builder, a notifier that records what
//! it was sent, and small encoders for real image fixtures.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let fixture = ProjectFixture::new()
//!     .file("source/index.ejs", "<h1>Home</h1>")
//!     .bytes("source/assets/images/dot.png", &png_bytes(8, 8));
//! let (ctx, notes) = fixture.recording_context();
//!
//! crate::tasks::html::render(&ctx).unwrap();
//! assert_eq!(read_output(&fixture, "public/index.html"), "<h1>Home</h1>");
//! assert!(notes.take().is_empty());
//! ```

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

use crate::config::PipelineConfig;
use crate::context::Context;
use crate::notifier::{Notification, Notifier};

// =========================================================================
// Project fixture
// =========================================================================

/// A project directory in a temp dir, populated file by file.
pub struct ProjectFixture {
    dir: TempDir,
    config: PipelineConfig,
}

impl ProjectFixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            config: PipelineConfig::default(),
        }
    }

    pub fn file(self, relative: &str, content: &str) -> Self {
        self.bytes(relative, content.as_bytes())
    }

    pub fn bytes(self, relative: &str, content: &[u8]) -> Self {
        let path = self.path(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, content).unwrap();
        self
    }

    pub fn with_config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path(relative).exists()
    }

    /// Context over the fixture, notifications go to the console.
    pub fn context(&self) -> Context {
        Context::new(self.dir.path(), self.config.clone()).unwrap()
    }

    /// Context whose notifications are captured for assertions.
    pub fn recording_context(&self) -> (Context, Arc<RecordingNotifier>) {
        let notes = Arc::new(RecordingNotifier::default());
        let ctx = self.context().with_notifier(notes.clone());
        (ctx, notes)
    }
}

/// Read a project-relative file as UTF-8. Panics with the path on failure.
pub fn read_output(fixture: &ProjectFixture, relative: &str) -> String {
    fs::read_to_string(fixture.path(relative))
        .unwrap_or_else(|e| panic!("could not read '{relative}': {e}"))
}

/// Push a file's mtime into the future so it counts as changed.
pub fn touch_future(path: &Path) {
    fs::File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

// =========================================================================
// Recording notifier
// =========================================================================

/// Uses Mutex (not RefCell) so it is Sync and can cross rayon/watch threads.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    /// Everything sent so far, clearing the record.
    pub fn take(&self) -> Vec<Notification> {
        std::mem::take(&mut *self.sent.lock().unwrap())
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) {
        self.sent.lock().unwrap().push(notification.clone());
    }
}

// =========================================================================
// Image fixtures
// =========================================================================

fn gradient(width: u32, height: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x * 16) as u8, (y * 16) as u8, 128, 255])
    })
}

fn encode(img: image::DynamicImage, format: image::ImageFormat) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    img.write_to(&mut buf, format).unwrap();
    buf.into_inner()
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(
        image::DynamicImage::ImageRgba8(gradient(width, height)),
        image::ImageFormat::Png,
    )
}

pub fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
    let rgb = image::DynamicImage::ImageRgba8(gradient(width, height)).to_rgb8();
    encode(image::DynamicImage::ImageRgb8(rgb), image::ImageFormat::Jpeg)
}

pub fn gif_bytes(width: u32, height: u32) -> Vec<u8> {
    encode(
        image::DynamicImage::ImageRgba8(gradient(width, height)),
        image::ImageFormat::Gif,
    )
}
