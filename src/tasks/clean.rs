//! Remove the output root.

use super::{TaskError, TaskKind, TaskReport};
use crate::context::Context;
use std::fs;
use std::io::ErrorKind;

/// Recursively delete `paths.root.dest`. An absent directory is a no-op.
///
/// Incremental state is reset too: everything that was written is gone.
pub fn clean(ctx: &Context) -> Result<TaskReport, TaskError> {
    let root = ctx.resolve(&ctx.config().paths.root.dest);
    match fs::remove_dir_all(&root) {
        Ok(()) => tracing::info!(path = %root.display(), "removed output root"),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            tracing::debug!(path = %root.display(), "output root already absent")
        }
        Err(e) => return Err(e.into()),
    }
    ctx.forget_runs();
    Ok(TaskReport::new(TaskKind::Clean))
}
