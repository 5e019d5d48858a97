//! Template rendering.
//!
//! Every file matched by `paths.html` (partials included) is loaded into one
//! [Tera](https://keats.github.io/tera/) instance under its path relative to
//! the glob base, so pages can pull in partials:
//!
//! ```text
//! {% include "_header.ejs" %}
//! {% extends "_layout.ejs" %}
//! ```
//!
//! Only non-partials are rendered, each to the mirrored path with an `.html`
//! extension. Load and render failures are sent to the notifier and the
//! task carries on with the remaining pages.
//!
//! A `markdown` filter turns Markdown strings into HTML:
//! `{{ "*hello*" | markdown }}`.
//!
//! The `.ejs` extension is kept for the file layout only. EJS tags such as
//! `<%= title %>` are not interpreted; they are copied through as text and a
//! warning names the first line that has one.

use super::{TaskError, TaskKind, TaskReport, write_output};
use crate::context::Context;
use crate::notifier::{Notification, error_chain};
use crate::paths::to_slash;
use pulldown_cmark::{Parser, html as md_html};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tera::{Tera, Value};

pub fn render(ctx: &Context) -> Result<TaskReport, TaskError> {
    let set = &ctx.config().paths.html;
    let mut report = TaskReport::new(TaskKind::Html);

    let files = set.walk(ctx.project())?;
    let mut sources = Vec::with_capacity(files.len());
    for file in &files {
        let content = fs::read_to_string(&file.path).map_err(|source| TaskError::File {
            task: TaskKind::Html,
            path: file.path.clone(),
            source,
        })?;
        if let Some(line) = ejs_tag_line(&content) {
            tracing::warn!(
                file = %file.path.display(),
                line,
                "EJS tag left as text, templates use Tera syntax"
            );
        }
        sources.push((to_slash(&file.relative), content));
    }

    let mut tera = Tera::default();
    tera.register_filter("markdown", markdown_filter);
    if let Err(e) = tera.add_raw_templates(sources) {
        report_failure(ctx, &mut report, None, &e);
        return Ok(report);
    }

    for file in files.iter().filter(|f| !f.excluded) {
        let name = to_slash(&file.relative);
        match tera.render(&name, &tera::Context::new()) {
            Ok(html) => {
                let out = set.dest_for(ctx.project(), &file.relative.with_extension("html"));
                write_output(&out, html.as_bytes())?;
                report.wrote(ctx, &out);
            }
            Err(e) => report_failure(ctx, &mut report, Some(file.path.clone()), &e),
        }
    }

    Ok(report)
}

fn report_failure(
    ctx: &Context,
    report: &mut TaskReport,
    file: Option<PathBuf>,
    err: &tera::Error,
) {
    let message = error_chain(err);
    ctx.notifier().notify(&Notification {
        task: TaskKind::Html,
        file: file.clone(),
        message: message.clone(),
    });
    report.failed(file, message);
}

/// 1-based line of the first `<%` tag, if any.
fn ejs_tag_line(source: &str) -> Option<usize> {
    source
        .lines()
        .position(|line| line.contains("<%"))
        .map(|i| i + 1)
}

fn markdown_filter(value: &Value, _args: &HashMap<String, Value>) -> tera::Result<Value> {
    let source = tera::try_get_value!("markdown", "value", String, value);
    let mut html = String::with_capacity(source.len() * 3 / 2);
    md_html::push_html(&mut html, Parser::new(&source));
    Ok(Value::String(html))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{ProjectFixture, read_output};

    #[test]
    fn renders_pages_and_skips_partials() {
        let fixture = ProjectFixture::new()
            .file("source/index.ejs", "<h1>Home</h1>{% include \"_partial.ejs\" %}")
            .file("source/_partial.ejs", "<footer>f</footer>")
            .file("source/about/team.ejs", "<p>Team</p>");
        let ctx = fixture.context();

        let report = render(&ctx).unwrap();

        assert_eq!(
            read_output(&fixture, "public/index.html"),
            "<h1>Home</h1><footer>f</footer>"
        );
        assert!(fixture.exists("public/about/team.html"));
        assert!(!fixture.exists("public/_partial.html"));
        assert_eq!(report.written.len(), 2);
        assert!(report.failures.is_empty());
    }

    #[test]
    fn layouts_can_be_extended() {
        let fixture = ProjectFixture::new()
            .file(
                "source/_layout.ejs",
                "<main>{% block content %}{% endblock content %}</main>",
            )
            .file(
                "source/index.ejs",
                "{% extends \"_layout.ejs\" %}{% block content %}hi{% endblock content %}",
            );
        let ctx = fixture.context();

        render(&ctx).unwrap();
        assert_eq!(read_output(&fixture, "public/index.html"), "<main>hi</main>");
    }

    #[test]
    fn markdown_filter_renders_html() {
        let fixture = ProjectFixture::new().file(
            "source/index.ejs",
            "{{ \"*hello*\" | markdown }}",
        );
        let ctx = fixture.context();

        render(&ctx).unwrap();
        assert_eq!(
            read_output(&fixture, "public/index.html"),
            "<p><em>hello</em></p>\n"
        );
    }

    #[test]
    fn render_error_is_notified_not_fatal() {
        let fixture = ProjectFixture::new()
            .file("source/broken.ejs", "{{ missing_variable }}")
            .file("source/ok.ejs", "fine");
        let (ctx, notes) = fixture.recording_context();

        let report = render(&ctx).unwrap();

        assert!(fixture.exists("public/ok.html"));
        assert!(!fixture.exists("public/broken.html"));
        assert_eq!(report.failures.len(), 1);
        let sent = notes.take();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].task, TaskKind::Html);
        assert!(sent[0].message.contains("missing_variable"));
    }

    #[test]
    fn malformed_template_is_notified_not_fatal() {
        let fixture = ProjectFixture::new().file("source/index.ejs", "{% if %}");
        let (ctx, notes) = fixture.recording_context();

        let report = render(&ctx).unwrap();

        assert!(report.written.is_empty());
        assert_eq!(notes.take().len(), 1);
    }

    #[test]
    fn ejs_tags_are_located() {
        assert_eq!(ejs_tag_line("<h1>\n<%= title %>\n</h1>"), Some(2));
        assert_eq!(ejs_tag_line("<%- include('_p') %>"), Some(1));
        assert_eq!(ejs_tag_line("{{ title }} 50% off"), None);
    }

    #[test]
    fn ejs_tags_pass_through_as_text() {
        let fixture = ProjectFixture::new().file("source/index.ejs", "<p><%= x %></p>");
        let (ctx, notes) = fixture.recording_context();

        render(&ctx).unwrap();

        assert_eq!(read_output(&fixture, "public/index.html"), "<p><%= x %></p>");
        assert!(notes.take().is_empty());
    }

    #[test]
    fn no_templates_is_empty_report() {
        let fixture = ProjectFixture::new();
        let ctx = fixture.context();
        let report = render(&ctx).unwrap();
        assert!(report.written.is_empty());
    }
}
