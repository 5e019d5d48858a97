//! Per-file JavaScript minification.
//!
//! Each file is parsed and re-printed by
//! [minify-js](https://docs.rs/minify-js) and written to the mirrored path;
//! nothing is concatenated. Statements are re-emitted from the syntax tree,
//! so scripts that lean on automatic semicolon insertion survive. A file
//! that cannot be read, parsed, or written is logged as a warning and
//! skipped. Unlike templates and stylesheets, no notification is sent.

use super::{TaskError, TaskKind, TaskReport, write_output};
use crate::context::Context;
use minify_js::{Session, TopLevelMode};
use std::fs;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScriptError {
    #[error("{0}")]
    Io(#[from] std::io::Error),
    #[error("syntax error: {0}")]
    Syntax(String),
}

pub fn minify(ctx: &Context) -> Result<TaskReport, TaskError> {
    let set = &ctx.config().paths.scripts;
    let mut report = TaskReport::new(TaskKind::Scripts);

    for file in set.collect(ctx.project())? {
        let out = set.dest_for(ctx.project(), &file.relative);
        let result = fs::read_to_string(&file.path)
            .map_err(ScriptError::from)
            .and_then(|source| minify_source(&source))
            .and_then(|code| write_output(&out, &code).map_err(ScriptError::from));
        match result {
            Ok(()) => report.wrote(ctx, &out),
            Err(e) => {
                tracing::warn!(file = %file.path.display(), "skipping script: {e}");
                report.failed(Some(file.path.clone()), e.to_string());
            }
        }
    }

    Ok(report)
}

/// Minify one classic script. Top-level names are left alone since other
/// scripts on the page may refer to them.
pub fn minify_source(source: &str) -> Result<Vec<u8>, ScriptError> {
    let session = Session::new();
    let mut out = Vec::with_capacity(source.len());
    minify_js::minify(&session, TopLevelMode::Global, source.as_bytes(), &mut out)
        .map_err(|e| ScriptError::Syntax(format!("{e:?}")))?;
    Ok(out)
}
