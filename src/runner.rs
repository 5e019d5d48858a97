//! Composite task orchestration.
//!
//! A [`Step`] tree composes tasks with two primitives: [`Step::Sequence`]
//! runs children in order and stops at the first fatal error;
//! [`Step::Parallel`] starts every child on the rayon pool, waits for all of
//! them, then reports the first error (in declaration order) if any failed.
//!
//! ```text
//! build   = clean → { html | styles        | scripts | images }
//! release = clean → { html | styles:compressed | scripts | images }
//! ```
//!
//! Non-fatal failures (template and stylesheet notifications, skipped
//! scripts) stay in each [`TaskReport`] and do not fail the composite.

use crate::context::Context;
use crate::tasks::{self, StyleMode, TaskError, TaskKind, TaskReport};
use rayon::prelude::*;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Task(TaskKind),
    Sequence(Vec<Step>),
    Parallel(Vec<Step>),
}

impl Step {
    pub fn build() -> Self {
        Self::populate(StyleMode::Expanded)
    }

    pub fn release() -> Self {
        Self::populate(StyleMode::Compressed)
    }

    fn populate(mode: StyleMode) -> Self {
        Step::Sequence(vec![
            Step::Task(TaskKind::Clean),
            Step::Parallel(vec![
                Step::Task(TaskKind::Html),
                Step::Task(TaskKind::Styles(mode)),
                Step::Task(TaskKind::Scripts),
                Step::Task(TaskKind::Images),
            ]),
        ])
    }

    /// Every task in the tree, depth first.
    pub fn tasks(&self) -> Vec<TaskKind> {
        match self {
            Step::Task(task) => vec![*task],
            Step::Sequence(steps) | Step::Parallel(steps) => {
                steps.iter().flat_map(Step::tasks).collect()
            }
        }
    }
}

/// Run `step`, returning the reports of every task that completed.
pub fn run(ctx: &Context, step: &Step) -> Result<Vec<TaskReport>, TaskError> {
    match step {
        Step::Task(task) => Ok(vec![tasks::run(ctx, *task)?]),
        Step::Sequence(steps) => {
            let mut reports = Vec::new();
            for step in steps {
                reports.extend(run(ctx, step)?);
            }
            Ok(reports)
        }
        Step::Parallel(steps) => {
            let results: Vec<Result<Vec<TaskReport>, TaskError>> =
                steps.par_iter().map(|step| run(ctx, step)).collect();
            let mut reports = Vec::new();
            for result in results {
                reports.extend(result?);
            }
            Ok(reports)
        }
    }
}
