//! Static file server with live reload.
//!
//! | Route | Behaviour |
//! |-------|-----------|
//! | `GET /__livereload` | current `{ boot, generation }` as JSON |
//! | `GET /__livereload?generation=N` | waits until the generation is no longer `N` |
//! | anything else | file from the document root, `dir/` → `dir/<index>` |
//!
//! Successful HTML responses get the client script injected before the last
//! `</body>`. Missing files get a small 404 page that carries the script
//! too, so a page that does not exist yet appears as soon as it is built.

use super::LiveReload;
use crate::config::ServerOptions;
use axum::Json;
use axum::Router;
use axum::body::{Body, to_bytes};
use axum::extract::{Query, Request, State};
use axum::http::{HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use maud::{DOCTYPE, Markup, PreEscaped, html};
use serde::{Deserialize, Serialize};
use percent_encoding::percent_decode_str;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tower::ServiceExt;
use tower_http::services::ServeDir;

pub const RELOAD_PATH: &str = "/__livereload";

#[derive(Clone)]
struct ServeState {
    root: Arc<PathBuf>,
    index: Arc<str>,
    reload: LiveReload,
    reload_on_restart: bool,
}

#[derive(Debug, Deserialize)]
struct PollQuery {
    generation: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReloadStatus {
    pub boot: String,
    pub generation: u64,
}

/// Build the preview router over `root`.
pub fn router(options: &ServerOptions, root: PathBuf, reload: LiveReload) -> Router {
    let state = ServeState {
        root: Arc::new(root),
        index: options.index.as_str().into(),
        reload,
        reload_on_restart: options.reload_on_restart,
    };
    Router::new()
        .route(RELOAD_PATH, get(poll_reload))
        .fallback(serve_static)
        .with_state(state)
}

async fn poll_reload(
    State(state): State<ServeState>,
    Query(query): Query<PollQuery>,
) -> Json<ReloadStatus> {
    if let Some(seen) = query.generation {
        let mut rx = state.reload.subscribe();
        loop {
            let current = *rx.borrow_and_update();
            if current != seen || rx.changed().await.is_err() {
                break;
            }
        }
    }
    Json(ReloadStatus {
        boot: state.reload.boot().to_string(),
        generation: state.reload.generation(),
    })
}

async fn serve_static(State(state): State<ServeState>, mut req: Request) -> Response {
    let path = req.uri().path().to_string();
    let is_head = req.method() == Method::HEAD;

    if path.ends_with('/') {
        if let Ok(uri) = format!("{path}{}", state.index).parse::<Uri>() {
            *req.uri_mut() = uri;
        }
    } else if local_dir(&state.root, &path).is_some() {
        return Redirect::permanent(&format!("{path}/")).into_response();
    }

    let served = match ServeDir::new(state.root.as_path())
        .append_index_html_on_directories(false)
        .oneshot(req)
        .await
    {
        Ok(res) => res.map(Body::new),
        Err(never) => match never {},
    };

    let snippet = client_snippet(state.reload_on_restart);
    let mut response = if served.status() == StatusCode::NOT_FOUND {
        (StatusCode::NOT_FOUND, not_found_page(&path, &snippet)).into_response()
    } else if served.status() == StatusCode::OK && is_html(&served) && !is_head {
        inject_response(served, &snippet).await
    } else {
        served
    };
    response
        .headers_mut()
        .insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    response
}

/// The directory `uri_path` names under `root`, after percent-decoding.
/// Paths that climb out of the root never resolve.
fn local_dir(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let decoded = percent_decode_str(uri_path).decode_utf8().ok()?;
    let mut dir = root.to_path_buf();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => return None,
            s if s.contains('\\') => return None,
            s => dir.push(s),
        }
    }
    dir.is_dir().then_some(dir)
}

fn is_html(response: &Response) -> bool {
    response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/html"))
}

async fn inject_response(response: Response, snippet: &Markup) -> Response {
    let (mut parts, body) = response.into_parts();
    let bytes = match to_bytes(body, usize::MAX).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!("failed to read page body: {e}");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let page = inject_snippet(&String::from_utf8_lossy(&bytes), &snippet.0);
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(page))
}

/// Insert `snippet` before the last `</body>` (any case), or append it.
pub fn inject_snippet(page: &str, snippet: &str) -> String {
    let lower = page.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => format!("{}{snippet}{}", &page[..at], &page[at..]),
        None => format!("{page}{snippet}"),
    }
}

/// The browser side: learn the current state, then long-poll for changes.
pub fn client_snippet(reload_on_restart: bool) -> Markup {
    let script = format!(
        r#"(function () {{
  var reloadOnRestart = {reload_on_restart};
  var boot = null, generation = null;
  function poll() {{
    var url = "{RELOAD_PATH}" + (generation === null ? "" : "?generation=" + generation);
    fetch(url, {{ cache: "no-store" }})
      .then(function (res) {{ return res.json(); }})
      .then(function (state) {{
        if (boot !== null && state.boot !== boot) {{
          if (reloadOnRestart) {{ return location.reload(); }}
        }} else if (generation !== null && state.generation !== generation) {{
          return location.reload();
        }}
        boot = state.boot;
        generation = state.generation;
        poll();
      }})
      .catch(function () {{ setTimeout(poll, 1000); }});
  }}
  poll();
}})();"#
    );
    html! {
        script data-sitepipe="livereload" { (PreEscaped(script)) }
    }
}

fn not_found_page(path: &str, snippet: &Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="en" {
            head {
                meta charset="UTF-8";
                title { "Not found" }
            }
            body {
                h1 { "Not found" }
                p { code { (path) } " is not in the output tree yet." }
                (snippet)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;
    use tempfile::TempDir;

    fn site() -> (TempDir, LiveReload, Router) {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("blog")).unwrap();
        std::fs::write(
            tmp.path().join("index.html"),
            "<html><BODY><h1>Home</h1></BODY></html>",
        )
        .unwrap();
        std::fs::write(tmp.path().join("blog/index.html"), "<p>blog</p>").unwrap();
        std::fs::write(tmp.path().join("main.css"), "a{}").unwrap();
        let reload = LiveReload::new();
        let app = router(
            &ServerOptions::default(),
            tmp.path().to_path_buf(),
            reload.clone(),
        );
        (tmp, reload, app)
    }

    async fn get(app: Router, uri: &str) -> (StatusCode, Option<String>, String) {
        let res = app
            .oneshot(HttpRequest::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = res.status();
        let location = res
            .headers()
            .get(header::LOCATION)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, location, String::from_utf8(body.to_vec()).unwrap())
    }

    #[test]
    fn inject_before_last_body_close() {
        let out = inject_snippet("<body>a</body><!-- </BODY> -->", "<s/>");
        assert_eq!(out, "<body>a</body><!-- <s/></BODY> -->");
        assert_eq!(inject_snippet("<p>x</p>", "<s/>"), "<p>x</p><s/>");
    }

    #[test]
    fn snippet_carries_restart_flag() {
        assert!(client_snippet(true).0.contains("var reloadOnRestart = true;"));
        assert!(client_snippet(false).0.contains("var reloadOnRestart = false;"));
    }

    #[tokio::test]
    async fn index_is_served_with_snippet() {
        let (_tmp, _reload, app) = site();
        let (status, _, body) = get(app, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<html><BODY><h1>Home</h1><script"));
        assert!(body.ends_with("</script></BODY></html>"));
    }

    #[tokio::test]
    async fn non_html_is_untouched() {
        let (_tmp, _reload, app) = site();
        let (status, _, body) = get(app, "/main.css").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, "a{}");
    }

    #[tokio::test]
    async fn directory_without_slash_redirects() {
        let (_tmp, _reload, app) = site();
        let (status, location, _) = get(app.clone(), "/blog").await;
        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/blog/"));

        let (status, _, body) = get(app, "/blog/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("<p>blog</p><script"));
    }

    #[tokio::test]
    async fn encoded_directory_name_redirects() {
        let (tmp, _reload, app) = site();
        std::fs::create_dir_all(tmp.path().join("my notes")).unwrap();

        let (status, location, _) = get(app, "/my%20notes").await;

        assert_eq!(status, StatusCode::PERMANENT_REDIRECT);
        assert_eq!(location.as_deref(), Some("/my%20notes/"));
    }

    #[tokio::test]
    async fn parent_directory_is_not_found() {
        let (_tmp, _reload, app) = site();
        for uri in ["/..", "/blog/../..", "/%2e%2e"] {
            let (status, location, _) = get(app.clone(), uri).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
            assert_eq!(location, None, "{uri}");
        }
    }

    #[test]
    fn local_dir_decodes_and_stays_inside_root() {
        let tmp = TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("a b/c")).unwrap();

        assert_eq!(
            local_dir(tmp.path(), "/a%20b/./c"),
            Some(tmp.path().join("a b/c"))
        );
        assert_eq!(local_dir(tmp.path(), "/a%20b/../.."), None);
        assert_eq!(local_dir(tmp.path(), "/missing"), None);
    }

    #[tokio::test]
    async fn missing_page_is_404_with_snippet() {
        let (_tmp, _reload, app) = site();
        let (status, _, body) = get(app, "/nope.html").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body.contains("/nope.html"));
        assert!(body.contains(RELOAD_PATH));
    }

    #[tokio::test]
    async fn poll_without_generation_returns_immediately() {
        let (_tmp, reload, app) = site();
        reload.reload();
        let (_, _, body) = get(app, RELOAD_PATH).await;
        let status: ReloadStatus = serde_json::from_str(&body).unwrap();
        assert_eq!(status.generation, 1);
        assert_eq!(status.boot, reload.boot());
    }

    #[tokio::test]
    async fn poll_waits_for_next_generation() {
        let (_tmp, reload, app) = site();
        let pending = tokio::spawn(get(app, "/__livereload?generation=0"));
        reload.reload();
        let (_, _, body) = pending.await.unwrap();
        let status: ReloadStatus = serde_json::from_str(&body).unwrap();
        assert_eq!(status.generation, 1);
    }
}
