//! The invocable tasks: one file transformation each, plus `clean`.
//!
//! | Task | Reads | Writes | Error contract |
//! |------|-------|--------|----------------|
//! | [`html`] | `source/**/*.ejs` (minus `_*` partials) | `public/**/*.html` | notify, continue |
//! | [`styles`] | `source/assets/sass/**/*.scss` | `public/assets/css/` (+ `maps/`) | notify, continue |
//! | [`scripts`] | `source/assets/js/**/*.js` | `public/assets/js/` | log, skip file |
//! | [`images`] | `source/assets/images/**/*.{jpg,…}` | `public/assets/images/` | fatal |
//! | [`clean`] | | removes `public/` | fatal |
//!
//! Every task returns a [`TaskReport`]; a returned `Err` is fatal and aborts
//! any composite the task is part of.

pub mod clean;
pub mod html;
pub mod images;
pub mod scripts;
pub mod styles;

use crate::config::ConfigError;
use crate::context::Context;
use crate::optimize::OptimizeError;
use crate::paths::PathError;
use std::fmt;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TaskError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Paths(#[from] PathError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Failed to optimize {path}: {source}")]
    Optimize {
        path: PathBuf,
        #[source]
        source: OptimizeError,
    },
    #[error("{task} failed for {path}: {source}")]
    File {
        task: TaskKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Stylesheet output variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StyleMode {
    /// Readable output with a companion source map.
    Expanded,
    /// Minified output, no source map.
    Compressed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Clean,
    Html,
    Styles(StyleMode),
    Scripts,
    Images,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TaskKind::Clean => "clean",
            TaskKind::Html => "html",
            TaskKind::Styles(StyleMode::Expanded) => "styles",
            TaskKind::Styles(StyleMode::Compressed) => "styles:compressed",
            TaskKind::Scripts => "scripts",
            TaskKind::Images => "images",
        })
    }
}

/// A per-file failure that did not abort the task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub file: Option<PathBuf>,
    pub message: String,
}

/// What a task did: files written (project-relative), skips, and non-fatal failures.
#[derive(Debug, Clone)]
pub struct TaskReport {
    pub task: TaskKind,
    pub written: Vec<PathBuf>,
    /// Inputs deliberately left alone (e.g. images unchanged since last run).
    pub skipped: usize,
    pub failures: Vec<Failure>,
    /// Total input bytes of processed files (images only).
    pub bytes_in: u64,
    /// Total output bytes of processed files (images only).
    pub bytes_out: u64,
    pub elapsed: Duration,
}

impl TaskReport {
    pub fn new(task: TaskKind) -> Self {
        Self {
            task,
            written: Vec::new(),
            skipped: 0,
            failures: Vec::new(),
            bytes_in: 0,
            bytes_out: 0,
            elapsed: Duration::ZERO,
        }
    }

    pub(crate) fn wrote(&mut self, ctx: &Context, path: &std::path::Path) {
        let relative = path.strip_prefix(ctx.project()).unwrap_or(path);
        self.written.push(relative.to_path_buf());
    }

    pub(crate) fn failed(&mut self, file: Option<PathBuf>, message: String) {
        self.failures.push(Failure { file, message });
    }
}

/// Run a single task to completion.
pub fn run(ctx: &Context, task: TaskKind) -> Result<TaskReport, TaskError> {
    let started = Instant::now();
    tracing::debug!(%task, "starting");
    let result = match task {
        TaskKind::Clean => clean::clean(ctx),
        TaskKind::Html => html::render(ctx),
        TaskKind::Styles(mode) => styles::compile(ctx, mode),
        TaskKind::Scripts => scripts::minify(ctx),
        TaskKind::Images => images::optimize(ctx),
    };
    match result {
        Ok(mut report) => {
            report.elapsed = started.elapsed();
            tracing::debug!(
                %task,
                written = report.written.len(),
                failures = report.failures.len(),
                "finished"
            );
            Ok(report)
        }
        Err(e) => {
            tracing::error!(%task, "{e}");
            Err(e)
        }
    }
}

/// Create the parent directory of `path` and write `contents` to it.
pub(crate) fn write_output(path: &std::path::Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)
}
