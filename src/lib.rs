//! # sitepipe
//!
//! A static-site asset pipeline. It compiles templates, Sass and scripts
//! from a source tree into an output tree, optimizes images, and serves the
//! output with live reload while you edit.
//!
//! # Architecture: Tasks and Composites
//!
//! Every transformation is an independent task reading one glob and writing
//! one directory under the output root:
//!
//! ```text
//! source/**/*.ejs                 →  public/**/*.html         (html)
//! source/assets/sass/**/*.scss    →  public/assets/css/       (styles)
//! source/assets/js/**/*.js        →  public/assets/js/        (scripts)
//! source/assets/images/**/*       →  public/assets/images/    (images)
//! ```
//!
//! No task consumes another's output, so the composites are shallow:
//! `build` and `release` clean the output root, then run the four tasks in
//! parallel. `dev` serves the output root, watches each source glob, and
//! reloads connected browsers after every rebuild.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`tasks`] | The invocable tasks: `clean`, `html`, `styles`, `scripts`, `images` |
//! | [`runner`] | `Step` trees with sequence and parallel composition; `build`, `release` |
//! | [`dev`] | Preview server, source watches, live reload |
//! | [`optimize`] | Lossless per-format image optimizers |
//! | [`config`] | `sitepipe.toml` loading, merging, and validation |
//! | [`paths`] | Path sets: glob matching, glob bases, mirrored destinations |
//! | [`context`] | Process-wide state passed to every task |
//! | [`notifier`] | Non-fatal error notifications |
//! | [`logging`] | Console subscriber setup |
//! | [`output`] | CLI output formatting for task reports |
//!
//! # Design Decisions
//!
//! ## Errors Split by Contract
//!
//! Template and stylesheet errors are the everyday "typo while editing"
//! case: they are reported through a [`notifier::Notifier`] and the task
//! keeps going, so a watch session never dies on bad input. Image and
//! filesystem errors are returned and abort the surrounding composite.
//!
//! ## One Context, No Globals
//!
//! A single [`context::Context`] carries the config, the notifier, the
//! image task's "last run" time, and the live-reload handle. Tasks, the
//! runner, and the dev server all take it explicitly.
//!
//! ## Pure-Rust Toolchain
//!
//! Sass, CSS prefixing, JS minification and PNG recompression all run
//! in-process (grass, lightningcss, minify-js, oxipng). Nothing needs Node or
//! system binaries.

pub mod config;
pub mod context;
pub mod dev;
pub mod logging;
pub mod notifier;
pub mod optimize;
pub mod output;
pub mod paths;
pub mod runner;
pub mod tasks;

#[cfg(test)]
pub(crate) mod test_helpers;
