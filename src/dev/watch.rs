//! Source watches and the rebuild loop.
//!
//! One `notify` watcher per category feeds a single channel. The consumer
//! runs the category's task to completion and only then signals a reload,
//! so events are handled strictly one after another. Nothing is debounced:
//! a burst of saves produces a burst of rebuilds.
//!
//! | Category | Glob | Task |
//! |----------|------|------|
//! | styles | `paths.styles.source` | `styles` (expanded) |
//! | scripts | `paths.scripts.source` | `scripts` |
//! | templates | `paths.html.source` | `html` |
//! | images | `paths.images.source` | `images` |
//!
//! Partials match the source glob, so saving `_layout.ejs` re-renders the
//! pages that use it. A category whose glob base does not exist yet is
//! watched from its nearest existing ancestor, so the directory can be
//! created mid-session.

use super::DevError;
use crate::context::Context;
use crate::paths::{PathError, PathSet, to_slash};
use crate::tasks::{self, StyleMode, TaskError, TaskKind, TaskReport};
use globset::GlobSet;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{Receiver, Sender};

/// A batch of changed files for one category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub task: TaskKind,
    pub paths: Vec<PathBuf>,
}

/// Maps raw filesystem events to [`WatchEvent`]s for one category.
pub struct WatchFilter {
    task: TaskKind,
    project: PathBuf,
    matcher: GlobSet,
}

impl WatchFilter {
    pub fn new(ctx: &Context, task: TaskKind, set: &PathSet) -> Result<Self, PathError> {
        Ok(Self {
            task,
            project: ctx.project().to_path_buf(),
            matcher: set.source_matcher()?,
        })
    }

    /// `Some` when `event` creates or modifies at least one matching file.
    pub fn matching(&self, event: &Event) -> Option<WatchEvent> {
        if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
            return None;
        }
        let paths: Vec<PathBuf> = event
            .paths
            .iter()
            .filter(|path| {
                path.strip_prefix(&self.project)
                    .is_ok_and(|rel| self.matcher.is_match(to_slash(rel)))
            })
            .cloned()
            .collect();
        (!paths.is_empty()).then_some(WatchEvent {
            task: self.task,
            paths,
        })
    }
}

/// The watched categories and the task each one runs.
pub fn categories(ctx: &Context) -> [(TaskKind, &PathSet); 4] {
    let paths = &ctx.config().paths;
    [
        (TaskKind::Styles(StyleMode::Expanded), &paths.styles),
        (TaskKind::Scripts, &paths.scripts),
        (TaskKind::Html, &paths.html),
        (TaskKind::Images, &paths.images),
    ]
}

/// The glob base of `set`, or its closest existing ancestor inside the
/// project.
pub fn watch_dir(project: &Path, set: &PathSet) -> PathBuf {
    let mut dir = project.join(set.base());
    while !dir.is_dir() && dir != project {
        match dir.parent() {
            Some(parent) => dir = parent.to_path_buf(),
            None => break,
        }
    }
    dir
}

/// Start one recursive watch per category.
///
/// The returned watchers must be kept alive; dropping them stops the watches
/// and, once every sender is gone, ends [`dispatch_loop`].
pub fn register(ctx: &Context, tx: Sender<WatchEvent>) -> Result<Vec<RecommendedWatcher>, DevError> {
    let mut watchers = Vec::new();
    for (task, set) in categories(ctx) {
        let dir = watch_dir(ctx.project(), set);
        let filter = WatchFilter::new(ctx, task, set)?;
        let tx = tx.clone();
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
            Ok(event) => {
                if let Some(change) = filter.matching(&event) {
                    // The receiver only goes away at shutdown.
                    let _ = tx.send(change);
                }
            }
            Err(e) => tracing::warn!(%task, "watch error: {e}"),
        })?;
        watcher.watch(&dir, RecursiveMode::Recursive)?;
        tracing::debug!(%task, dir = %dir.display(), "watching");
        watchers.push(watcher);
    }
    Ok(watchers)
}

/// Run the task for `event`, then signal a reload. A failed task does not
/// reload.
pub fn dispatch(ctx: &Context, event: &WatchEvent) -> Result<TaskReport, TaskError> {
    tracing::info!(task = %event.task, files = event.paths.len(), "change detected");
    let report = tasks::run(ctx, event.task)?;
    ctx.reload().reload();
    Ok(report)
}

/// Consume events until every sender is dropped.
pub fn dispatch_loop(ctx: Arc<Context>, rx: Receiver<WatchEvent>) {
    for event in rx {
        match dispatch(&ctx, &event) {
            Ok(report) => {
                for line in crate::output::format_task_report(&report) {
                    tracing::info!("{line}");
                }
            }
            Err(e) => tracing::error!(task = %event.task, "rebuild failed, not reloading: {e}"),
        }
    }
    tracing::debug!("watch loop finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::ProjectFixture;
    use notify::event::{AccessKind, CreateKind, ModifyKind, RemoveKind};
    use std::sync::mpsc;
    use std::time::Duration;

    fn html_filter(ctx: &Context) -> WatchFilter {
        WatchFilter::new(ctx, TaskKind::Html, &ctx.config().paths.html).unwrap()
    }

    #[test]
    fn partial_changes_match_html_category() {
        let fixture = ProjectFixture::new().file("source/_layout.ejs", "x");
        let ctx = fixture.context();
        let filter = html_filter(&ctx);

        let event = Event::new(EventKind::Modify(ModifyKind::Any))
            .add_path(ctx.project().join("source/_layout.ejs"));

        assert_eq!(
            filter.matching(&event),
            Some(WatchEvent {
                task: TaskKind::Html,
                paths: vec![ctx.project().join("source/_layout.ejs")],
            })
        );
    }

    #[test]
    fn non_matching_files_and_kinds_are_ignored() {
        let fixture = ProjectFixture::new();
        let ctx = fixture.context();
        let filter = html_filter(&ctx);
        let page = ctx.project().join("source/index.ejs");

        let other_file = Event::new(EventKind::Create(CreateKind::File))
            .add_path(ctx.project().join("source/notes.txt"));
        let removal = Event::new(EventKind::Remove(RemoveKind::File)).add_path(page.clone());
        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(page);

        assert_eq!(filter.matching(&other_file), None);
        assert_eq!(filter.matching(&removal), None);
        assert_eq!(filter.matching(&access), None);
    }

    #[test]
    fn dispatch_runs_task_then_reloads() {
        let fixture = ProjectFixture::new().file("source/index.ejs", "hi");
        let ctx = fixture.context();
        let event = WatchEvent {
            task: TaskKind::Html,
            paths: vec![ctx.project().join("source/index.ejs")],
        };

        dispatch(&ctx, &event).unwrap();

        assert!(fixture.exists("public/index.html"));
        assert_eq!(ctx.reload().generation(), 1);
    }

    #[test]
    fn failed_task_does_not_reload() {
        let fixture = ProjectFixture::new()
            .bytes("source/assets/images/bad.png", b"\x89PNG\r\n\x1a\nbroken");
        let ctx = fixture.context();
        let event = WatchEvent {
            task: TaskKind::Images,
            paths: Vec::new(),
        };

        assert!(dispatch(&ctx, &event).is_err());
        assert_eq!(ctx.reload().generation(), 0);
    }

    #[test]
    fn loop_handles_events_in_order_until_closed() {
        let fixture = ProjectFixture::new()
            .file("source/index.ejs", "hi")
            .file("source/assets/js/app.js", "var a = 1;");
        let ctx = Arc::new(fixture.context());
        let (tx, rx) = mpsc::channel();
        for task in [TaskKind::Html, TaskKind::Scripts] {
            tx.send(WatchEvent {
                task,
                paths: Vec::new(),
            })
            .unwrap();
        }
        drop(tx);

        dispatch_loop(Arc::clone(&ctx), rx);

        assert_eq!(ctx.reload().generation(), 2);
        assert!(fixture.exists("public/assets/js/app.js"));
    }

    #[test]
    fn registered_watch_reports_saved_file() {
        let fixture = ProjectFixture::new().file("source/assets/js/app.js", "var a = 1;");
        let ctx = fixture.context();
        let (tx, rx) = mpsc::channel();

        let watchers = register(&ctx, tx).unwrap();
        assert_eq!(watchers.len(), 4);
        std::fs::write(fixture.path("source/assets/js/app.js"), "var a = 2;").unwrap();

        let event = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(event.task, TaskKind::Scripts);
    }

    #[test]
    fn missing_base_is_watched_from_ancestor() {
        let fixture = ProjectFixture::new().file("source/index.ejs", "hi");
        let ctx = fixture.context();
        let paths = &ctx.config().paths;

        assert_eq!(
            watch_dir(ctx.project(), &paths.images),
            ctx.project().join("source")
        );
        assert_eq!(
            watch_dir(ctx.project(), &paths.html),
            ctx.project().join("source")
        );
    }

    #[test]
    fn base_without_any_existing_parent_falls_back_to_project() {
        let fixture = ProjectFixture::new();
        let ctx = fixture.context();
        assert_eq!(
            watch_dir(ctx.project(), &ctx.config().paths.scripts),
            ctx.project()
        );
    }

    #[test]
    fn directory_created_after_start_is_picked_up() {
        let fixture = ProjectFixture::new().file("source/index.ejs", "hi");
        let ctx = fixture.context();
        let (tx, rx) = mpsc::channel();
        let _watchers = register(&ctx, tx).unwrap();

        std::fs::create_dir_all(fixture.path("source/assets/images")).unwrap();
        std::thread::sleep(Duration::from_millis(500));
        std::fs::write(fixture.path("source/assets/images/logo.svg"), "<svg/>").unwrap();

        let event = std::iter::from_fn(|| rx.recv_timeout(Duration::from_secs(10)).ok())
            .find(|e| e.task == TaskKind::Images)
            .unwrap();
        assert!(event.paths[0].ends_with("source/assets/images/logo.svg"));
    }
}
