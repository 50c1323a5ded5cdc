// src/serve/server.rs

//! Development server with live reload via Server-Sent Events.
//!
//! Serves either the proxied upstream site or the html output directory,
//! injecting the reload client into every HTML response.

use std::convert::Infallible;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{StatusCode, header};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::{Stream, StreamExt};
use tracing::{info, warn};

use crate::errors::{PipelineError, Result};
use crate::serve::ReloadHub;
use crate::serve::proxy::{Proxy, ProxyError};

pub const EVENTS_PATH: &str = "/__assetpipe/events";
pub const CLIENT_PATH: &str = "/__assetpipe/client.js";

const RELOAD_SCRIPT: &str = include_str!("../../assets/reload-client.js");

/// Where the dev server gets its pages from.
#[derive(Debug, Clone)]
pub enum Origin {
    Proxy(Proxy),
    /// Serve files below this directory.
    Static(PathBuf),
}

#[derive(Debug, Clone)]
struct ServeState {
    hub: ReloadHub,
    origin: Arc<Origin>,
}

pub fn router(hub: ReloadHub, origin: Origin) -> Router {
    Router::new()
        .route(EVENTS_PATH, get(handle_events))
        .route(CLIENT_PATH, get(handle_client))
        .fallback(handle_request)
        .with_state(ServeState {
            hub,
            origin: Arc::new(origin),
        })
}

/// Bind `host:port` and serve until `shutdown` resolves.
pub async fn serve(
    host: &str,
    port: u16,
    hub: ReloadHub,
    origin: Origin,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind((host, port))
        .await
        .map_err(|e| PipelineError::config(format!("cannot bind dev server to {host}:{port}: {e}")))?;
    match &origin {
        Origin::Proxy(proxy) => info!(%host, port, upstream = %proxy.upstream(), "dev server proxying"),
        Origin::Static(dir) => info!(%host, port, ?dir, "dev server serving files"),
    }

    axum::serve(listener, router(hub, origin))
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(PipelineError::IoError)
}

async fn handle_events(State(state): State<ServeState>) -> Sse<impl Stream<Item = std::result::Result<Event, Infallible>>> {
    info!(clients = state.hub.client_count() + 1, "live-reload client connected");
    let stream = BroadcastStream::new(state.hub.subscribe()).filter_map(|msg| {
        // Lagged receivers skip missed events; the next one still reloads.
        let event = msg.ok()?;
        let json = serde_json::to_string(&event).ok()?;
        Some(Ok(Event::default().event("reload").data(json)))
    });
    Sse::new(stream).keep_alive(KeepAlive::new().interval(Duration::from_secs(15)).text("ping"))
}

async fn handle_client() -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/javascript"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        RELOAD_SCRIPT,
    )
        .into_response()
}

async fn handle_request(State(state): State<ServeState>, request: Request) -> Response {
    match state.origin.as_ref() {
        Origin::Proxy(proxy) => proxy_request(proxy, request).await,
        Origin::Static(root) => serve_file(root, request.uri().path()).await,
    }
}

async fn proxy_request(proxy: &Proxy, request: Request) -> Response {
    let failed = |e: ProxyError| {
        warn!(error = %e, "proxy request failed");
        let status = if e.is_timeout() {
            StatusCode::GATEWAY_TIMEOUT
        } else {
            StatusCode::BAD_GATEWAY
        };
        (status, e.to_string()).into_response()
    };

    let response = match proxy.forward(request).await {
        Ok(r) => r,
        Err(e) => return failed(e),
    };

    let is_html = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|ct| ct.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/html"));
    if !is_html {
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let page = match proxy.collect(body).await {
        Ok(bytes) => bytes,
        Err(e) => return failed(e),
    };
    parts.headers.remove(header::CONTENT_LENGTH);
    Response::from_parts(parts, Body::from(inject_reload_script(&page)))
}

async fn serve_file(root: &Path, uri_path: &str) -> Response {
    let Some(mut path) = resolve_static(root, uri_path) else {
        return (StatusCode::FORBIDDEN, "forbidden").into_response();
    };
    if path.is_dir() {
        path = path.join("index.html");
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = content_type(&path);
            let body = if content_type.starts_with("text/html") {
                inject_reload_script(&bytes)
            } else {
                bytes
            };
            ([(header::CONTENT_TYPE, content_type), (header::CACHE_CONTROL, "no-cache")], body).into_response()
        }
        Err(_) => (StatusCode::NOT_FOUND, format!("File not found: {uri_path}")).into_response(),
    }
}

/// Map a request path below `root`, refusing anything that climbs out.
fn resolve_static(root: &Path, uri_path: &str) -> Option<PathBuf> {
    let rel = Path::new(uri_path.trim_start_matches('/'));
    if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }
    Some(root.join(rel))
}

/// Add the reload client before the closing `</body>` (or at the end).
pub fn inject_reload_script(html: &[u8]) -> Vec<u8> {
    let html = String::from_utf8_lossy(html);
    let tag = format!(r#"<script src="{CLIENT_PATH}"></script>"#);
    match html.rfind("</body>") {
        Some(pos) => format!("{}{tag}\n{}", &html[..pos], &html[pos..]).into_bytes(),
        None => format!("{html}\n{tag}").into_bytes(),
    }
}

fn content_type(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).unwrap_or("") {
        "html" => "text/html; charset=utf-8",
        "css" => "text/css",
        "js" => "application/javascript",
        "json" | "map" => "application/json",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_goes_before_body_close() {
        let out = String::from_utf8(inject_reload_script(b"<html><body><h1>x</h1></body></html>")).unwrap();
        let script = out.find(CLIENT_PATH).unwrap();
        assert!(script < out.find("</body>").unwrap());

        let bare = String::from_utf8(inject_reload_script(b"<p>x</p>")).unwrap();
        assert!(bare.ends_with(r#"<script src="/__assetpipe/client.js"></script>"#));
    }

    #[test]
    fn traversal_is_refused() {
        assert!(resolve_static(Path::new("/site"), "/../etc/passwd").is_none());
        assert_eq!(
            resolve_static(Path::new("/site"), "/css/style.css"),
            Some(PathBuf::from("/site/css/style.css"))
        );
    }

    async fn spawn_app(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        addr
    }

    async fn fetch(addr: std::net::SocketAddr, path: &str) -> (StatusCode, axum::http::HeaderMap, String) {
        use hyper_util::client::legacy::Client;
        use hyper_util::rt::TokioExecutor;

        let client: Client<_, Body> = Client::builder(TokioExecutor::new()).build_http();
        let request = axum::http::Request::get(format!("http://{addr}{path}"))
            .header(header::ACCEPT_ENCODING, "gzip")
            .body(Body::empty())
            .unwrap();
        let response = client.request(request).await.unwrap();
        let (parts, body) = response.into_parts();
        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        (parts.status, parts.headers, String::from_utf8_lossy(&bytes).into_owned())
    }

    #[tokio::test]
    async fn static_pages_get_the_client_script() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<body></body>").unwrap();

        let app = router(ReloadHub::new(), Origin::Static(dir.path().to_path_buf()));
        let addr = spawn_app(app).await;

        let (status, _, page) = fetch(addr, "/").await;
        assert_eq!(status, StatusCode::OK);
        assert!(page.contains(CLIENT_PATH));

        let (status, headers, script) = fetch(addr, CLIENT_PATH).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "application/javascript");
        assert!(script.contains("EventSource"));
    }

    #[tokio::test]
    async fn proxied_pages_are_injected_and_assets_pass_through() {
        use axum::http::HeaderMap;
        use axum::response::Html;

        let upstream = Router::new()
            .route(
                "/about",
                get(|headers: HeaderMap| async move {
                    if headers.contains_key(header::ACCEPT_ENCODING) {
                        return (StatusCode::BAD_REQUEST, "compressed").into_response();
                    }
                    ([("x-test", "yes")], Html("<html><body>about</body></html>")).into_response()
                }),
            )
            .route("/logo.txt", get(|| async { "plain" }));
        let upstream_addr = spawn_app(upstream).await;

        let proxy = Proxy::new(crate::serve::Upstream {
            host: "127.0.0.1".into(),
            port: upstream_addr.port(),
        });
        let addr = spawn_app(router(ReloadHub::new(), Origin::Proxy(proxy))).await;

        let (status, headers, page) = fetch(addr, "/about").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers["x-test"], "yes");
        let script = page.find(CLIENT_PATH).unwrap();
        assert!(script < page.find("</body>").unwrap());

        let (status, _, text) = fetch(addr, "/logo.txt").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "plain");
    }

    #[tokio::test]
    async fn silent_upstream_answers_gateway_timeout() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(60)).await;
        });

        let proxy = Proxy::with_timeout(
            crate::serve::Upstream { host: "127.0.0.1".into(), port },
            Duration::from_millis(200),
        );
        let addr = spawn_app(router(ReloadHub::new(), Origin::Proxy(proxy))).await;

        let (status, _, _) = fetch(addr, "/").await;
        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    }
}
