//! CLI output formatting for task runs.
//!
//! # Output Format
//!
//! ```text
//! clean: done
//! html: 2 files (4ms)
//!     public/index.html
//!     public/about/team.html
//! styles: 1 file, 1 failed (31ms)
//!     public/assets/css/main.css
//!     failed: source/assets/sass/broken.scss: Undefined variable.
//! images: 1 file, 3 unchanged, 12.0 KB -> 9.5 KB (-21%) (18ms)
//!     public/assets/images/spinner.gif
//!
//! 4 files written by 4 tasks, 1 failure
//! ```
//!
//! # Architecture
//!
//! Each report has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::tasks::{TaskKind, TaskReport};
use std::time::Duration;

fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    format!("{n} {}", if n == 1 { one } else { many })
}

fn format_elapsed(elapsed: Duration) -> String {
    if elapsed.as_secs() >= 1 {
        format!("{:.1}s", elapsed.as_secs_f64())
    } else {
        format!("{}ms", elapsed.as_millis())
    }
}

/// Human-readable byte count (`512 B`, `1.5 KB`, `2.0 MB`).
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    let b = bytes as f64;
    if b < KB {
        format!("{bytes} B")
    } else if b < KB * KB {
        format!("{:.1} KB", b / KB)
    } else {
        format!("{:.1} MB", b / (KB * KB))
    }
}

fn savings(bytes_in: u64, bytes_out: u64) -> String {
    let pct = if bytes_in == 0 {
        0
    } else {
        bytes_in.saturating_sub(bytes_out) * 100 / bytes_in
    };
    format!(
        "{} -> {} (-{pct}%)",
        format_bytes(bytes_in),
        format_bytes(bytes_out)
    )
}

pub fn format_task_report(report: &TaskReport) -> Vec<String> {
    if report.task == TaskKind::Clean {
        return vec!["clean: done".to_string()];
    }

    let mut parts = vec![plural(report.written.len(), "file", "files")];
    if report.skipped > 0 {
        parts.push(format!("{} unchanged", report.skipped));
    }
    if !report.failures.is_empty() {
        parts.push(format!("{} failed", report.failures.len()));
    }
    if report.bytes_in > 0 {
        parts.push(savings(report.bytes_in, report.bytes_out));
    }

    let mut lines = vec![format!(
        "{}: {} ({})",
        report.task,
        parts.join(", "),
        format_elapsed(report.elapsed)
    )];
    for path in &report.written {
        lines.push(format!("{}{}", indent(1), path.display()));
    }
    for failure in &report.failures {
        let line = match &failure.file {
            Some(file) => format!("{}failed: {}: {}", indent(1), file.display(), failure.message),
            None => format!("{}failed: {}", indent(1), failure.message),
        };
        lines.push(line);
    }
    lines
}

pub fn format_summary(reports: &[TaskReport]) -> String {
    let written: usize = reports.iter().map(|r| r.written.len()).sum();
    let failures: usize = reports.iter().map(|r| r.failures.len()).sum();
    let mut line = format!(
        "{} written by {}",
        plural(written, "file", "files"),
        plural(reports.len(), "task", "tasks")
    );
    if failures > 0 {
        line.push_str(&format!(", {}", plural(failures, "failure", "failures")));
    }
    line
}

/// Print every report followed by a summary line.
pub fn print_reports(reports: &[TaskReport]) {
    for report in reports {
        for line in format_task_report(report) {
            println!("{line}");
        }
    }
    if reports.len() > 1 {
        println!();
        println!("{}", format_summary(reports));
    }
}
