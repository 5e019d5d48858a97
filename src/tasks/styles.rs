//! Sass compilation and vendor prefixing.
//!
//! Each non-partial stylesheet goes through two passes:
//!
//! 1. [grass](https://docs.rs/grass) compiles Sass to CSS, resolving
//!    `@use`/`@import` against the file's directory and the glob base.
//! 2. [lightningcss](https://lightningcss.dev) adds vendor prefixes for the
//!    configured browser targets and prints the result, minified or not.
//!    Prefixed declarations are emitted in place; there is no cascade
//!    re-indentation.
//!
//! ## Output
//!
//! ```text
//! public/assets/css/
//! ├── main.css                 # ends with /*# sourceMappingURL=maps/main.css.map */
//! ├── pages/home.css           # ... =../maps/pages/home.css.map
//! └── maps/
//!     ├── main.css.map
//!     └── pages/home.css.map
//! ```
//!
//! Compressed mode writes only the CSS files. The source map is a version 3
//! map carrying the original Sass in `sourcesContent`; it contains no
//! timestamps, so unchanged input always yields byte-identical output.
//!
//! grass does not track output positions, so `mappings` is always empty:
//! devtools can open the original `.scss` but cannot jump from a CSS rule
//! to its source line.

use super::{StyleMode, TaskError, TaskKind, TaskReport, write_output};
use crate::config;
use crate::context::Context;
use crate::notifier::Notification;
use crate::paths::{SourceFile, relative_path, to_slash};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use serde::Serialize;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StyleError {
    #[error("{0}")]
    Sass(String),
    #[error("{0}")]
    Css(String),
}

/// A compiled stylesheet, before it is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledStyle {
    pub css: String,
    pub map: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SourceMapV3 {
    version: u8,
    file: String,
    sources: Vec<String>,
    sources_content: Vec<String>,
    names: Vec<String>,
    mappings: String,
}

pub fn compile(ctx: &Context, mode: StyleMode) -> Result<TaskReport, TaskError> {
    let set = &ctx.config().paths.styles;
    let browsers = config::browser_targets(&ctx.config().browsers)?;
    let load_root = ctx.project().join(set.base());
    let mut report = TaskReport::new(TaskKind::Styles(mode));

    for file in set.collect(ctx.project())? {
        let css_rel = file.relative.with_extension("css");
        let css_path = set.dest_for(ctx.project(), &css_rel);
        let map_path = match (mode, &set.map) {
            (StyleMode::Expanded, Some(map_dir)) => Some(
                ctx.resolve(map_dir)
                    .join(append_extension(&css_rel, "map")),
            ),
            _ => None,
        };

        match compile_file(&file, &load_root, mode, browsers, &css_path, map_path.as_deref()) {
            Ok(compiled) => {
                write_output(&css_path, compiled.css.as_bytes())?;
                report.wrote(ctx, &css_path);
                if let (Some(map), Some(map_path)) = (compiled.map, &map_path) {
                    write_output(map_path, map.as_bytes())?;
                    report.wrote(ctx, map_path);
                }
            }
            Err(e) => {
                let message = e.to_string();
                ctx.notifier().notify(&Notification {
                    task: TaskKind::Styles(mode),
                    file: Some(file.path.clone()),
                    message: message.clone(),
                });
                report.failed(Some(file.path.clone()), message);
            }
        }
    }

    Ok(report)
}

/// Compile one stylesheet. `map_path` requests a source map at that location.
pub fn compile_file(
    file: &SourceFile,
    load_root: &Path,
    mode: StyleMode,
    browsers: Option<Browsers>,
    css_path: &Path,
    map_path: Option<&Path>,
) -> Result<CompiledStyle, StyleError> {
    let style = match mode {
        StyleMode::Expanded => grass::OutputStyle::Expanded,
        StyleMode::Compressed => grass::OutputStyle::Compressed,
    };
    let options = grass::Options::default().style(style).load_path(load_root);
    let compiled =
        grass::from_path(&file.path, &options).map_err(|e| StyleError::Sass(e.to_string()))?;

    let filename = to_slash(&file.relative);
    let mut css = prefix(&compiled, &filename, mode, browsers)?;

    let Some(map_path) = map_path else {
        return Ok(CompiledStyle { css, map: None });
    };

    let css_dir = css_path.parent().unwrap_or(Path::new(""));
    let map_dir = map_path.parent().unwrap_or(Path::new(""));
    let url = to_slash(&relative_path(css_dir, map_path));
    let map = source_map(file, css_path, map_dir)?;

    let trimmed = css.trim_end().len();
    css.truncate(trimmed);
    css.push_str(&format!("\n\n/*# sourceMappingURL={url} */\n"));
    Ok(CompiledStyle {
        css,
        map: Some(map),
    })
}

/// Add vendor prefixes for `browsers` and print in the requested mode.
fn prefix(
    css: &str,
    filename: &str,
    mode: StyleMode,
    browsers: Option<Browsers>,
) -> Result<String, StyleError> {
    let mut sheet = StyleSheet::parse(
        css,
        ParserOptions {
            filename: filename.to_string(),
            ..ParserOptions::default()
        },
    )
    .map_err(|e| StyleError::Css(format!("{filename}: {e}")))?;

    sheet
        .minify(MinifyOptions {
            targets: targets(browsers),
            ..MinifyOptions::default()
        })
        .map_err(|e| StyleError::Css(format!("{filename}: {e}")))?;

    let printed = sheet
        .to_css(PrinterOptions {
            minify: mode == StyleMode::Compressed,
            targets: targets(browsers),
            ..PrinterOptions::default()
        })
        .map_err(|e| StyleError::Css(format!("{filename}: {e}")))?;
    Ok(printed.code)
}

fn targets(browsers: Option<Browsers>) -> Targets {
    Targets {
        browsers,
        ..Targets::default()
    }
}

fn source_map(file: &SourceFile, css_path: &Path, map_dir: &Path) -> Result<String, StyleError> {
    let content = fs::read_to_string(&file.path).map_err(|e| StyleError::Sass(e.to_string()))?;
    let map = SourceMapV3 {
        version: 3,
        file: css_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default(),
        sources: vec![to_slash(&relative_path(map_dir, &file.path))],
        sources_content: vec![content],
        names: Vec::new(),
        mappings: String::new(),
    };
    serde_json::to_string(&map).map_err(|e| StyleError::Css(e.to_string()))
}

/// `main.css` + `map` → `main.css.map`.
fn append_extension(path: &Path, ext: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(ext);
    PathBuf::from(name)
}
