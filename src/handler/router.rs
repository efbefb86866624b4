//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, dispatch to
//! the scan endpoint or static files, response-wide headers and access logging.

use crate::config::AppState;
use crate::handler::{scan_endpoint, static_files};
use crate::http;
use crate::logger::{self, AccessLogEntry};
use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::header::{HeaderName, HeaderValue, IF_MODIFIED_SINCE, IF_NONE_MATCH, SERVER};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

/// Request context encapsulating information needed for request processing
pub struct RequestContext<'a> {
    /// Raw (still percent-encoded) request path
    pub path: &'a str,
    pub query: Option<&'a str>,
    pub is_head: bool,
    pub if_none_match: Option<&'a str>,
    pub if_modified_since: Option<&'a str>,
}

impl<'a> RequestContext<'a> {
    fn from_parts(parts: &'a Parts) -> Self {
        let header = move |name: HeaderName| parts.headers.get(name).and_then(|v| v.to_str().ok());
        Self {
            path: parts.uri.path(),
            query: parts.uri.query(),
            is_head: parts.method == Method::HEAD,
            if_none_match: header(IF_NONE_MATCH),
            if_modified_since: header(IF_MODIFIED_SINCE),
        }
    }
}

/// Main entry point for HTTP request handling
///
/// Request bodies are never read; every route is a GET-style read.
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, _) = req.into_parts();

    let mut access_entry = state.config.logging.access_log.then(|| {
        AccessLogEntry::start(
            peer_addr,
            &parts.method,
            &parts.uri,
            parts.version,
            &parts.headers,
        )
    });

    let mut response = route_request(&parts, &state).await;
    apply_response_headers(&mut response, &state);

    if let Some(entry) = access_entry.as_mut() {
        let body_bytes = response.body().size_hint().exact().unwrap_or(0);
        entry.finish(response.status().as_u16(), body_bytes);
        logger::log_access(entry, &state.config.logging.access_log_format);
    }

    Ok(response)
}

fn is_scan_route(path: &str, state: &AppState) -> bool {
    state.config.scan.enabled && path == state.config.scan.path
}

/// Route request based on path and configuration
async fn route_request(parts: &Parts, state: &Arc<AppState>) -> Response<Full<Bytes>> {
    let scan_route = is_scan_route(parts.uri.path(), state);

    if let Some(resp) = check_http_method(&parts.method, scan_route) {
        return resp;
    }

    let ctx = RequestContext::from_parts(parts);
    if scan_route {
        scan_endpoint::handle_scan(&ctx, Arc::clone(state)).await
    } else {
        static_files::serve(&ctx, state).await
    }
}

/// Reject methods a route does not support
///
/// Static files accept GET and HEAD; the scan endpoint only GET. OPTIONS is
/// answered everywhere, with CORS preflight headers on the scan route.
fn check_http_method(method: &Method, scan_route: bool) -> Option<Response<Full<Bytes>>> {
    let allow = if scan_route {
        http::SCAN_METHODS
    } else {
        http::STATIC_METHODS
    };
    match *method {
        Method::GET => None,
        Method::HEAD if !scan_route => None,
        Method::OPTIONS => Some(http::build_options_response(allow, scan_route)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response(allow))
        }
    }
}

/// Headers every response carries regardless of route or status
fn apply_response_headers(response: &mut Response<Full<Bytes>>, state: &AppState) {
    let headers = response.headers_mut();
    if let Ok(server) = HeaderValue::from_str(&state.config.http.server_name) {
        headers.insert(SERVER, server);
    }
    state.cache_policy.apply(headers);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, ConfigOverrides};
    use http_body_util::BodyExt;
    use hyper::header::{
        ACCESS_CONTROL_ALLOW_ORIGIN, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG,
        EXPIRES, LAST_MODIFIED, LOCATION, PRAGMA,
    };
    use hyper::StatusCode;
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    struct Fixture {
        root: TempDir,
        state: Arc<AppState>,
    }

    fn fixture(configure: impl FnOnce(&mut Config)) -> Fixture {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("index.html"), "<h1>toolbox</h1>").unwrap();
        fs::write(root.path().join("style.css"), "body{}").unwrap();
        fs::write(root.path().join("app.mjs"), "export {}").unwrap();
        fs::write(root.path().join("data.json"), "{}").unwrap();
        fs::write(root.path().join("blob.xyz"), [1u8, 2, 3]).unwrap();
        fs::write(root.path().join("my file.txt"), "spaced").unwrap();
        fs::create_dir(root.path().join("docs")).unwrap();
        fs::write(root.path().join("docs/readme.txt"), "docs").unwrap();
        fs::create_dir(root.path().join("js")).unwrap();
        fs::write(root.path().join("js/main.js"), "main()").unwrap();

        let overrides = ConfigOverrides {
            root: Some(root.path().to_string_lossy().into_owned()),
            ..ConfigOverrides::default()
        };
        let mut config = Config::load_from("does-not-exist-toolbox", &overrides).unwrap();
        config.logging.access_log = false;
        configure(&mut config);
        let state = Arc::new(AppState::new(&config).unwrap());
        Fixture { root, state }
    }

    async fn send(state: &Arc<AppState>, method: Method, uri: &str) -> Response<Full<Bytes>> {
        send_with(state, Request::builder().method(method).uri(uri)).await
    }

    async fn send_with(
        state: &Arc<AppState>,
        builder: hyper::http::request::Builder,
    ) -> Response<Full<Bytes>> {
        let req = builder.body(()).unwrap();
        handle_request(req, Arc::clone(state), "127.0.0.1:40000".parse().unwrap())
            .await
            .unwrap()
    }

    async fn body_json(response: Response<Full<Bytes>>) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn body_string(response: Response<Full<Bytes>>) -> String {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    fn scan_uri(path: &Path) -> String {
        format!(
            "/api/scan-images?path={}",
            urlencoding::encode(&path.to_string_lossy())
        )
    }

    #[tokio::test]
    async fn test_static_content_types() {
        let fx = fixture(|_| {});
        for (uri, expected) in [
            ("/style.css", "text/css"),
            ("/index.html", "text/html"),
            ("/app.mjs", "application/javascript"),
            ("/js/main.js", "application/javascript"),
            ("/data.json", "application/json"),
            ("/blob.xyz", "application/octet-stream"),
        ] {
            let response = send(&fx.state, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::OK, "{uri}");
            assert_eq!(response.headers()[CONTENT_TYPE], expected, "{uri}");
        }
    }

    #[tokio::test]
    async fn test_static_body_and_server_header() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::GET, "/style.css").await;
        assert_eq!(response.headers()[SERVER], "toolbox_host");
        assert!(response.headers().get(ETAG).is_some());
        assert!(response.headers().get(LAST_MODIFIED).is_some());
        assert_eq!(response.headers()[CACHE_CONTROL], "public, max-age=3600");
        assert_eq!(body_string(response).await, "body{}");
    }

    #[tokio::test]
    async fn test_root_serves_index() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::GET, "/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "<h1>toolbox</h1>");
    }

    #[tokio::test]
    async fn test_percent_encoded_path() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::GET, "/my%20file.txt").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "spaced");
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::GET, "/nope.js").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = send(&fx.state, Method::GET, "/style.css/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_parent_segments_stay_in_root() {
        let fx = fixture(|_| {});
        let outside = fx.root.path().parent().unwrap().join("toolbox-outside.txt");
        let _ = fs::write(&outside, "secret");
        let response = send(&fx.state, Method::GET, "/../toolbox-outside.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let _ = fs::remove_file(outside);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlink_escape_is_blocked() {
        let fx = fixture(|_| {});
        let outside = tempfile::tempdir().unwrap();
        fs::write(outside.path().join("secret.txt"), "secret").unwrap();
        std::os::unix::fs::symlink(outside.path(), fx.root.path().join("escape")).unwrap();
        let response = send(&fx.state, Method::GET, "/escape/secret.txt").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_directory_redirect_and_listing() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::GET, "/docs?x=1").await;
        assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY);
        assert_eq!(response.headers()[LOCATION], "/docs/?x=1");

        let response = send(&fx.state, Method::GET, "/docs/").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "text/html; charset=utf-8");
        let html = body_string(response).await;
        assert!(html.contains("Directory listing for /docs/"));
        assert!(html.contains("readme.txt"));
    }

    #[tokio::test]
    async fn test_redirect_collapses_leading_slashes() {
        let fx = fixture(|_| {});
        fs::create_dir(fx.root.path().join("evil.example")).unwrap();
        for (uri, expected) in [
            ("//docs", "/docs/"),
            ("//evil.example", "/evil.example/"),
            ("///docs?x=1", "/docs/?x=1"),
        ] {
            let response = send(&fx.state, Method::GET, uri).await;
            assert_eq!(response.status(), StatusCode::MOVED_PERMANENTLY, "{uri}");
            let location = response.headers()[LOCATION].to_str().unwrap();
            assert_eq!(location, expected, "{uri}");
            assert!(!location.starts_with("//"), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_listing_can_be_disabled() {
        let fx = fixture(|c| c.static_files.directory_listing = false);
        let response = send(&fx.state, Method::GET, "/docs/").await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_conditional_get() {
        let fx = fixture(|_| {});
        let first = send(&fx.state, Method::GET, "/style.css").await;
        let etag = first.headers()[ETAG].to_str().unwrap().to_string();
        let last_modified = first.headers()[LAST_MODIFIED].to_str().unwrap().to_string();

        let by_etag = send_with(
            &fx.state,
            Request::builder().uri("/style.css").header(IF_NONE_MATCH, &etag),
        )
        .await;
        assert_eq!(by_etag.status(), StatusCode::NOT_MODIFIED);

        let by_date = send_with(
            &fx.state,
            Request::builder()
                .uri("/style.css")
                .header(IF_MODIFIED_SINCE, &last_modified),
        )
        .await;
        assert_eq!(by_date.status(), StatusCode::NOT_MODIFIED);

        let stale = send_with(
            &fx.state,
            Request::builder()
                .uri("/style.css")
                .header(IF_NONE_MATCH, "W/\"0-0\""),
        )
        .await;
        assert_eq!(stale.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_head_has_headers_without_body() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::HEAD, "/style.css").await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_LENGTH], "6");
        assert_eq!(body_string(response).await, "");
    }

    #[tokio::test]
    async fn test_method_checks() {
        let fx = fixture(|_| {});
        let response = send(&fx.state, Method::POST, "/style.css").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, HEAD, OPTIONS");

        let response = send(&fx.state, Method::OPTIONS, "/api/scan-images").await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(response.headers()[ALLOW], "GET, OPTIONS");

        let response = send(&fx.state, Method::HEAD, "/api/scan-images").await;
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.headers()[ALLOW], "GET, OPTIONS");
    }

    #[tokio::test]
    async fn test_scan_endpoint_scenario() {
        let fx = fixture(|_| {});
        let images = tempfile::tempdir().unwrap();
        fs::write(images.path().join("a.png"), vec![0u8; 100]).unwrap();
        fs::write(images.path().join("b.txt"), "text").unwrap();
        fs::create_dir(images.path().join("sub")).unwrap();
        fs::write(images.path().join("sub/c.webp"), vec![0u8; 50]).unwrap();

        let response = send(&fx.state, Method::GET, &scan_uri(images.path())).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let json = body_json(response).await;
        assert_eq!(json["count"], 2);
        let mut entries: Vec<(String, u64, String)> = json["images"]
            .as_array()
            .unwrap()
            .iter()
            .map(|img| {
                (
                    img["path"].as_str().unwrap().to_string(),
                    img["size"].as_u64().unwrap(),
                    img["extension"].as_str().unwrap().to_string(),
                )
            })
            .collect();
        entries.sort();
        assert_eq!(
            entries,
            vec![
                (
                    images.path().join("a.png").to_string_lossy().into_owned(),
                    100,
                    ".png".to_string()
                ),
                (
                    images.path().join("sub/c.webp").to_string_lossy().into_owned(),
                    50,
                    ".webp".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn test_scan_endpoint_validation() {
        let fx = fixture(|_| {});
        let file = fx.root.path().join("style.css");
        for uri in [
            "/api/scan-images".to_string(),
            "/api/scan-images?path=".to_string(),
            scan_uri(&fx.root.path().join("missing")),
            scan_uri(&file),
        ] {
            let response = send(&fx.state, Method::GET, &uri).await;
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
            assert!(!body_string(response).await.is_empty());
        }
    }

    #[tokio::test]
    async fn test_scan_endpoint_can_be_disabled() {
        let fx = fixture(|c| c.scan.enabled = false);
        let uri = scan_uri(fx.root.path());
        let response = send(&fx.state, Method::GET, &uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_no_cache_headers_on_every_response() {
        let fx = fixture(|c| c.http.no_cache = true);
        let uris = [
            "/style.css".to_string(),
            "/".to_string(),
            "/docs".to_string(),
            "/missing".to_string(),
            "/api/scan-images".to_string(),
            scan_uri(fx.root.path()),
        ];
        let requests = uris
            .iter()
            .map(|uri| (Method::GET, uri.as_str()))
            .chain([
                (Method::POST, "/style.css"),
                (Method::OPTIONS, "/style.css"),
                (Method::OPTIONS, "/api/scan-images"),
            ]);
        for (method, uri) in requests {
            let response = send(&fx.state, method, uri).await;
            let headers = response.headers();
            assert_eq!(headers[CACHE_CONTROL], "no-store, no-cache, must-revalidate", "{uri}");
            assert_eq!(headers[PRAGMA], "no-cache", "{uri}");
            assert_eq!(headers[EXPIRES], "0", "{uri}");
            assert!(headers.get(ETAG).is_none(), "{uri}");
        }
    }

    #[tokio::test]
    async fn test_no_cache_ignores_validators() {
        let fx = fixture(|c| c.http.no_cache = true);
        let response = send_with(
            &fx.state,
            Request::builder().uri("/style.css").header(IF_NONE_MATCH, "*"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mime_override_from_config() {
        let fx = fixture(|c| {
            c.http
                .mime_types
                .insert("xyz".to_string(), "application/x-toolbox".to_string());
        });
        let response = send(&fx.state, Method::GET, "/blob.xyz").await;
        assert_eq!(response.headers()[CONTENT_TYPE], "application/x-toolbox");
    }
}
