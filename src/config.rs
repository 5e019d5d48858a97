//! Pipeline configuration.
//!
//! Handles loading, validating, and merging `sitepipe.toml`. Stock defaults
//! describe the conventional layout; a project file overrides only the keys
//! it names, and CLI flags override both.
//!
//! ## Config File Location
//!
//! `sitepipe.toml` lives in the project directory (next to `source/`), or is
//! passed with `--config`. It is optional: without it the stock layout is used.
//!
//! ```text
//! project/
//! ├── sitepipe.toml            # optional overrides
//! ├── source/                  # templates (*.ejs)
//! │   └── assets/
//! │       ├── sass/            # *.scss
//! │       ├── js/              # *.js
//! │       └── images/          # jpg, jpeg, png, svg, gif
//! └── public/                  # output root (deleted by `clean`)
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! browsers = ["last 3 versions", "ie >= 8", "Android >= 4", "iOS >= 8"]
//!
//! [paths.root]
//! source = "source"
//! dest = "public"
//!
//! [paths.styles]
//! source = "source/assets/sass/**/*.scss"
//! dest = "public/assets/css"
//! map = "public/assets/css/maps"
//! exclude = ["**/_*.scss"]
//!
//! [server]
//! port = 3000
//! base_dir = "public"      # omit to serve paths.root.dest
//! index = "index.html"
//! reload_on_restart = true
//!
//! [images]
//! remove_view_box = false
//! png_preset = 2
//!
//! [processing]
//! max_processes = 4         # omit for auto = CPU cores
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::paths::{self, PathSet};
use lightningcss::targets::Browsers;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the project config file looked up in the project directory.
pub const CONFIG_FILENAME: &str = "sitepipe.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config file not found: {0}")]
    NotFound(std::path::PathBuf),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `sitepipe.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Browserslist queries controlling vendor prefixes.
    pub browsers: Vec<String>,
    /// Source and destination path sets per task.
    pub paths: PathsConfig,
    /// Preview server settings.
    pub server: ServerOptions,
    /// Image optimizer settings.
    pub images: ImagesConfig,
    /// Parallel processing settings.
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            browsers: default_browsers(),
            paths: PathsConfig::default(),
            server: ServerOptions::default(),
            images: ImagesConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

fn default_browsers() -> Vec<String> {
    ["last 3 versions", "ie >= 8", "Android >= 4", "iOS >= 8"]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Root directories plus one [`PathSet`] per transformation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PathsConfig {
    pub root: RootPaths,
    pub html: PathSet,
    pub styles: PathSet,
    pub scripts: PathSet,
    pub images: PathSet,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            root: RootPaths::default(),
            html: PathSet::new("source/**/*.ejs", "public").with_exclude("source/**/_*.ejs"),
            styles: PathSet::new("source/assets/sass/**/*.scss", "public/assets/css")
                .with_map("public/assets/css/maps")
                .with_exclude("**/_*.scss"),
            scripts: PathSet::new("source/assets/js/**/*.js", "public/assets/js"),
            images: PathSet::new(
                "source/assets/images/**/*.{jpg,jpeg,png,svg,gif}",
                "public/assets/images",
            ),
        }
    }
}

impl PathsConfig {
    /// All task path sets, labelled for error messages.
    pub fn sets(&self) -> [(&'static str, &PathSet); 4] {
        [
            ("html", &self.html),
            ("styles", &self.styles),
            ("scripts", &self.scripts),
            ("images", &self.images),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RootPaths {
    /// Source root (informational; each path set carries its own glob).
    pub source: String,
    /// Output root. Every destination lives inside it; `clean` removes it.
    pub dest: String,
}

impl Default for RootPaths {
    fn default() -> Self {
        Self {
            source: "source".to_string(),
            dest: "public".to_string(),
        }
    }
}

/// Preview server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerOptions {
    /// TCP port to listen on (`0` picks a free port).
    pub port: u16,
    /// Directory served as the document root. Defaults to
    /// `paths.root.dest`; when set it must lie inside it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_dir: Option<String>,
    /// File served for directory URLs.
    pub index: String,
    /// Reload connected browsers when they reconnect to a restarted server.
    pub reload_on_restart: bool,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            port: 3000,
            base_dir: None,
            index: "index.html".to_string(),
            reload_on_restart: true,
        }
    }
}

/// Image optimizer settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Drop an SVG `viewBox` that merely repeats `width`/`height`.
    pub remove_view_box: bool,
    /// oxipng optimization preset (0 = fastest, 6 = smallest).
    pub png_preset: u8,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            remove_view_box: false,
            png_preset: 2,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of parallel workers.
    /// When absent, defaults to the number of CPU cores.
    /// Values larger than the core count are clamped down.
    pub max_processes: Option<usize>,
}

/// Resolve the effective thread count from config.
///
/// - `None` → use all available cores
/// - `Some(n)` → use `min(n, cores)` (user can constrain down, not up)
pub fn effective_threads(config: &ProcessingConfig) -> usize {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    config
        .max_processes
        .map(|n| n.clamp(1, cores))
        .unwrap_or(cores)
}

/// Resolve browserslist queries into lightningcss targets.
///
/// An empty list means "no prefixing" and resolves to `None`.
pub fn browser_targets(queries: &[String]) -> Result<Option<Browsers>, ConfigError> {
    if queries.is_empty() {
        return Ok(None);
    }
    Browsers::from_browserslist(queries)
        .map_err(|e| ConfigError::Validation(format!("browsers: {e}")))
}

impl PipelineConfig {
    /// Project-relative directory the preview server serves.
    pub fn document_root(&self) -> &str {
        self.server
            .base_dir
            .as_deref()
            .unwrap_or(&self.paths.root.dest)
    }

    /// Validate paths, globs, browser queries, and server settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let root = paths::normalize(&self.paths.root.dest);
        let has_name = root.components().any(|c| matches!(c, Component::Normal(_)));
        if !has_name || escapes(&root) || root.is_absolute() {
            return Err(ConfigError::Validation(format!(
                "paths.root.dest must be a subdirectory of the project, got '{}'",
                self.paths.root.dest
            )));
        }

        for (name, set) in self.paths.sets() {
            let dest = paths::normalize(&set.dest);
            if escapes(&dest) || !dest.starts_with(&root) {
                return Err(ConfigError::Validation(format!(
                    "paths.{name}.dest '{}' must be inside paths.root.dest '{}'",
                    set.dest, self.paths.root.dest
                )));
            }
            if let Some(map) = &set.map {
                let map = paths::normalize(map);
                if escapes(&map) || !map.starts_with(&root) {
                    return Err(ConfigError::Validation(format!(
                        "paths.{name}.map must be inside paths.root.dest '{}'",
                        self.paths.root.dest
                    )));
                }
            }
            set.source_matcher()
                .and_then(|_| set.exclude_matcher())
                .map_err(|e| ConfigError::Validation(format!("paths.{name}: {e}")))?;
        }

        browser_targets(&self.browsers)?;

        if let Some(base) = &self.server.base_dir {
            let base = paths::normalize(base);
            if escapes(&base) || !base.starts_with(&root) {
                return Err(ConfigError::Validation(format!(
                    "server.base_dir must be inside paths.root.dest '{}'",
                    self.paths.root.dest
                )));
            }
        }

        if self.server.index.is_empty() || self.server.index.contains('/') {
            return Err(ConfigError::Validation(
                "server.index must be a plain file name".into(),
            ));
        }
        if self.images.png_preset > 6 {
            return Err(ConfigError::Validation(
                "images.png_preset must be 0-6".into(),
            ));
        }
        Ok(())
    }
}

fn escapes(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the canonical representation of all default values, used as the
/// base layer for merging user overrides on top.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(PipelineConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (arrays included) replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
/// Returns `Err` if the file exists but contains invalid TOML.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto the stock defaults, then deserialize and validate.
pub fn resolve_config(overlay: Option<toml::Value>) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value();
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// A missing file falls back to stock defaults unless `required` is set
/// (an explicit `--config` must exist).
pub fn load_config(path: &Path, required: bool) -> Result<PipelineConfig, ConfigError> {
    let overlay = load_raw_config(path)?;
    if overlay.is_none() && required {
        return Err(ConfigError::NotFound(path.to_path_buf()));
    }
    resolve_config(overlay)
}

/// Returns a fully-commented stock `sitepipe.toml` with all keys and explanations.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# sitepipe configuration
# ======================
# All settings are optional. Remove or comment out any you don't need.
# Values shown below are the defaults. Paths are relative to the project
# directory and use "/" separators. Unknown keys cause an error.

# Browserslist queries that decide which vendor prefixes are added to CSS.
browsers = ["last 3 versions", "ie >= 8", "Android >= 4", "iOS >= 8"]

# ---------------------------------------------------------------------------
# Paths
# ---------------------------------------------------------------------------
# Every destination must live inside paths.root.dest: `sitepipe clean`
# deletes that whole directory.
[paths.root]
source = "source"
dest = "public"

# Templates. Files matching `exclude` are partials: they can be included
# by other templates but are never written on their own.
[paths.html]
source = "source/**/*.ejs"
dest = "public"
exclude = ["source/**/_*.ejs"]

# Sass stylesheets. Source maps are written to `map` in expanded mode.
[paths.styles]
source = "source/assets/sass/**/*.scss"
dest = "public/assets/css"
map = "public/assets/css/maps"
exclude = ["**/_*.scss"]

[paths.scripts]
source = "source/assets/js/**/*.js"
dest = "public/assets/js"

[paths.images]
source = "source/assets/images/**/*.{jpg,jpeg,png,svg,gif}"
dest = "public/assets/images"

# ---------------------------------------------------------------------------
# Preview server (`sitepipe dev`)
# ---------------------------------------------------------------------------
[server]
port = 3000
# Document root. Defaults to paths.root.dest and must lie inside it.
# base_dir = "public"
index = "index.html"
# Reload open pages when they reconnect to a restarted server.
reload_on_restart = true

# ---------------------------------------------------------------------------
# Image optimization (lossless)
# ---------------------------------------------------------------------------
[images]
# Drop an SVG viewBox that only repeats width/height.
remove_view_box = false
# PNG optimization effort, 0 (fast) to 6 (smallest).
png_preset = 2

# ---------------------------------------------------------------------------
# Processing
# ---------------------------------------------------------------------------
[processing]
# Maximum parallel workers. Omit to use all CPU cores.
# Values above the core count are clamped down.
# max_processes = 4
"##
}
