//! The process-wide pipeline context.
//!
//! One [`Context`] is created at startup and passed explicitly to every task,
//! the composite runner, and the dev server. It owns everything that would
//! otherwise be ambient global state: the resolved project directory and
//! config, the notifier, the per-task "last run" registry used by the
//! incremental image task, and the live-reload handle.

use crate::config::PipelineConfig;
use crate::dev::LiveReload;
use crate::notifier::{ConsoleNotifier, Notifier};
use crate::tasks::TaskKind;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::SystemTime;

pub struct Context {
    project: PathBuf,
    config: PipelineConfig,
    notifier: Arc<dyn Notifier>,
    last_run: Mutex<HashMap<TaskKind, SystemTime>>,
    reload: LiveReload,
}

impl Context {
    /// Create a context for `project`, which must exist.
    ///
    /// The directory is canonicalized so paths reported by filesystem
    /// watches can be mapped back to project-relative globs.
    pub fn new(project: &Path, config: PipelineConfig) -> io::Result<Self> {
        Ok(Self {
            project: project.canonicalize()?,
            config,
            notifier: Arc::new(ConsoleNotifier),
            last_run: Mutex::new(HashMap::new()),
            reload: LiveReload::new(),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn project(&self) -> &Path {
        &self.project
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    pub fn reload(&self) -> &LiveReload {
        &self.reload
    }

    /// Absolute path for a project-relative config path.
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.project.join(relative)
    }

    /// Start time of the last successful run of `task`, if any.
    pub fn last_run(&self, task: TaskKind) -> Option<SystemTime> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&task)
            .copied()
    }

    pub(crate) fn record_run(&self, task: TaskKind, started: SystemTime) {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(task, started);
    }

    /// Drop every recorded run, so the next incremental run starts over.
    pub(crate) fn forget_runs(&self) {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("project", &self.project)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn new_canonicalizes_project() {
        let tmp = TempDir::new().unwrap();
        let nested = tmp.path().join("site");
        std::fs::create_dir_all(&nested).unwrap();

        let ctx = Context::new(&nested.join("."), PipelineConfig::default()).unwrap();
        assert_eq!(ctx.project(), nested.canonicalize().unwrap());
    }

    #[test]
    fn new_missing_project_is_error() {
        let tmp = TempDir::new().unwrap();
        assert!(Context::new(&tmp.path().join("absent"), PipelineConfig::default()).is_err());
    }

    #[test]
    fn last_run_is_tracked_per_task() {
        let tmp = TempDir::new().unwrap();
        let ctx = Context::new(tmp.path(), PipelineConfig::default()).unwrap();
        assert_eq!(ctx.last_run(TaskKind::Images), None);

        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(42);
        ctx.record_run(TaskKind::Images, t);

        assert_eq!(ctx.last_run(TaskKind::Images), Some(t));
        assert_eq!(ctx.last_run(TaskKind::Scripts), None);
    }

    #[test]
    fn forget_runs_clears_registry() {
        let tmp = TempDir::new().unwrap();
        let ctx = Context::new(tmp.path(), PipelineConfig::default()).unwrap();
        ctx.record_run(TaskKind::Images, SystemTime::now());

        ctx.forget_runs();

        assert_eq!(ctx.last_run(TaskKind::Images), None);
    }
}
