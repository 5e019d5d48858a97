//! Path sets: which source files a task reads and where its output lands.
//!
//! Every task is described by a [`PathSet`] holding a source glob, a
//! destination directory, an optional sourcemap directory, and exclude
//! globs. All patterns are relative to the project directory and use `/`
//! separators:
//!
//! ```text
//! source  = "source/assets/sass/**/*.scss"
//! dest    = "public/assets/css"
//! map     = "public/assets/css/maps"
//! exclude = ["**/_*.scss"]
//! ```
//!
//! ## Glob base
//!
//! Output mirrors the source tree relative to the *glob base*: the leading
//! path components that contain no glob metacharacters. For the pattern
//! above the base is `source/assets/sass`, so
//! `source/assets/sass/pages/home.scss` becomes `pages/home.css` under the
//! destination.

use globset::{Glob, GlobBuilder, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PathError {
    #[error("Invalid glob '{pattern}': {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("Directory walk failed: {0}")]
    Walk(#[from] walkdir::Error),
}

const GLOB_CHARS: &[char] = &['*', '?', '[', ']', '{', '}'];

/// A named group of source glob, destination, and optional map directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PathSet {
    /// Source glob, relative to the project directory.
    pub source: String,
    /// Destination directory, relative to the project directory.
    pub dest: String,
    /// Sourcemap directory (stylesheets only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub map: Option<String>,
    /// Files matching any of these globs are not written to the output.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub exclude: Vec<String>,
}

/// A file selected by a [`PathSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Path on disk (project directory joined with the relative path).
    pub path: PathBuf,
    /// Path relative to the glob base; the output keeps this structure.
    pub relative: PathBuf,
    /// Matched an exclude glob: loadable (e.g. as a partial) but never written.
    pub excluded: bool,
}

impl PathSet {
    pub fn new(source: &str, dest: &str) -> Self {
        Self {
            source: source.to_string(),
            dest: dest.to_string(),
            map: None,
            exclude: Vec::new(),
        }
    }

    pub fn with_map(mut self, map: &str) -> Self {
        self.map = Some(map.to_string());
        self
    }

    pub fn with_exclude(mut self, pattern: &str) -> Self {
        self.exclude.push(pattern.to_string());
        self
    }

    /// Directory the source glob is anchored at.
    pub fn base(&self) -> PathBuf {
        glob_base(&self.source)
    }

    /// Matcher for the source glob alone (watches use this, partials included).
    pub fn source_matcher(&self) -> Result<GlobSet, PathError> {
        build_globset(std::slice::from_ref(&self.source))
    }

    pub fn exclude_matcher(&self) -> Result<GlobSet, PathError> {
        build_globset(&self.exclude)
    }

    /// Every file matching the source glob, excluded ones flagged, sorted by path.
    ///
    /// A glob base that does not exist yields an empty list.
    pub fn walk(&self, project: &Path) -> Result<Vec<SourceFile>, PathError> {
        let include = self.source_matcher()?;
        let exclude = self.exclude_matcher()?;
        let root = project.join(self.base());
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(&root).follow_links(true).sort_by_file_name() {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(from_project) = entry.path().strip_prefix(project) else {
                continue;
            };
            let key = to_slash(from_project);
            if !include.is_match(&key) {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(&root) else {
                continue;
            };
            files.push(SourceFile {
                path: entry.path().to_path_buf(),
                relative: relative.to_path_buf(),
                excluded: exclude.is_match(&key),
            });
        }
        Ok(files)
    }

    /// Files that produce output: [`walk`](Self::walk) minus excluded entries.
    pub fn collect(&self, project: &Path) -> Result<Vec<SourceFile>, PathError> {
        Ok(self
            .walk(project)?
            .into_iter()
            .filter(|f| !f.excluded)
            .collect())
    }

    /// Absolute destination for a path relative to the glob base.
    pub fn dest_for(&self, project: &Path, relative: &Path) -> PathBuf {
        project.join(&self.dest).join(relative)
    }
}

/// Compile a list of glob patterns with `*` not crossing `/`.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet, PathError> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(compile_glob(pattern)?);
    }
    builder.build().map_err(|source| PathError::Glob {
        pattern: patterns.join(", "),
        source,
    })
}

fn compile_glob(pattern: &str) -> Result<Glob, PathError> {
    GlobBuilder::new(pattern.trim_start_matches("./"))
        .literal_separator(true)
        .build()
        .map_err(|source| PathError::Glob {
            pattern: pattern.to_string(),
            source,
        })
}

/// Leading components of `pattern` that contain no glob metacharacters.
///
/// A pattern without any glob characters names a single file; its base is
/// the parent directory.
pub fn glob_base(pattern: &str) -> PathBuf {
    let segments: Vec<&str> = pattern
        .trim_start_matches("./")
        .split('/')
        .filter(|s| !s.is_empty() && *s != ".")
        .collect();
    let literal = segments
        .iter()
        .take_while(|s| !s.contains(GLOB_CHARS))
        .count();
    let take = if literal == segments.len() {
        literal.saturating_sub(1)
    } else {
        literal
    };
    segments[..take].iter().collect()
}

/// Render a relative path with `/` separators for glob matching and URLs.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            Component::ParentDir => Some("..".into()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Path from directory `from` to `to`; both must share the same root.
pub fn relative_path(from: &Path, to: &Path) -> PathBuf {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from.iter().zip(&to).take_while(|(a, b)| a == b).count();

    let mut result = PathBuf::new();
    for _ in common..from.len() {
        result.push("..");
    }
    for part in &to[common..] {
        result.push(part.as_os_str());
    }
    result
}

/// Strip `.` components and a trailing separator, keeping everything else.
pub fn normalize(path: &str) -> PathBuf {
    Path::new(path)
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}
