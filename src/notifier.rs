//! User-facing notifications for non-fatal transformation errors.
//!
//! Template and stylesheet failures are caught at the task boundary and
//! reported here instead of aborting the run, so a watch session keeps going
//! after a typo. The [`Notifier`] trait is the seam: the CLI uses
//! [`ConsoleNotifier`], tests record what was sent.

use crate::tasks::TaskKind;
use std::error::Error;
use std::path::PathBuf;

/// A single non-fatal failure to show the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task: TaskKind,
    pub file: Option<PathBuf>,
    pub message: String,
}

pub trait Notifier: Send + Sync {
    fn notify(&self, notification: &Notification);
}

/// Writes notifications to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: &Notification) {
        match &notification.file {
            Some(file) => tracing::error!(
                task = %notification.task,
                file = %file.display(),
                "{}",
                notification.message
            ),
            None => tracing::error!(task = %notification.task, "{}", notification.message),
        }
    }
}

/// Join an error and its sources into one line (`outer: inner: root`).
///
/// Template engines wrap the useful detail (line, column, what was expected)
/// in the source chain; the top-level message alone is rarely enough.
pub fn error_chain(err: &dyn Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
