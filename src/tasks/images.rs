//! Incremental image optimization.
//!
//! Only files modified after the start of this task's previous successful
//! run are processed; on the first run in a process everything is. A file
//! whose output has gone missing is processed regardless. The
//! start time is recorded before any file is read, so an edit made during a
//! run is picked up by the next one. A failed run records nothing.
//!
//! Files are optimized in parallel on the rayon pool. Any error is fatal.

use super::{TaskError, TaskKind, TaskReport, write_output};
use crate::context::Context;
use crate::optimize::ImageOptimizerPipeline;
use crate::paths::SourceFile;
use rayon::prelude::*;
use std::fs;
use std::path::PathBuf;
use std::time::SystemTime;

struct Processed {
    out: PathBuf,
    bytes_in: u64,
    bytes_out: u64,
}

pub fn optimize(ctx: &Context) -> Result<TaskReport, TaskError> {
    let started = SystemTime::now();
    let set = &ctx.config().paths.images;
    let since = ctx.last_run(TaskKind::Images);
    let pipeline = ImageOptimizerPipeline::from_config(&ctx.config().images);
    let mut report = TaskReport::new(TaskKind::Images);

    let mut pending = Vec::new();
    for file in set.collect(ctx.project())? {
        if let Some(since) = since {
            let modified = fs::metadata(&file.path)?.modified()?;
            let out = set.dest_for(ctx.project(), &file.relative);
            if modified <= since && out.exists() {
                report.skipped += 1;
                continue;
            }
        }
        pending.push(file);
    }

    let results: Vec<Result<Processed, TaskError>> = pending
        .par_iter()
        .map(|file| process(ctx, &pipeline, file))
        .collect();

    for result in results {
        let processed = result?;
        report.bytes_in += processed.bytes_in;
        report.bytes_out += processed.bytes_out;
        report.wrote(ctx, &processed.out);
    }

    ctx.record_run(TaskKind::Images, started);
    Ok(report)
}

fn process(
    ctx: &Context,
    pipeline: &ImageOptimizerPipeline,
    file: &SourceFile,
) -> Result<Processed, TaskError> {
    let data = fs::read(&file.path).map_err(|source| TaskError::File {
        task: TaskKind::Images,
        path: file.path.clone(),
        source,
    })?;
    let optimized = pipeline
        .run(&file.path, &data)
        .map_err(|source| TaskError::Optimize {
            path: file.path.clone(),
            source,
        })?;

    let out = ctx
        .config()
        .paths
        .images
        .dest_for(ctx.project(), &file.relative);
    write_output(&out, &optimized.bytes)?;
    tracing::debug!(
        file = %file.relative.display(),
        before = data.len(),
        after = optimized.bytes.len(),
        "optimized"
    );
    Ok(Processed {
        out,
        bytes_in: data.len() as u64,
        bytes_out: optimized.bytes.len() as u64,
    })
}
