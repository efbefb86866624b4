//! Static file serving module
//!
//! Maps request paths onto the static root, serving files, index files and
//! generated directory listings.

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http::response::{self as resp, Validators};
use crate::http::{self, cache};
use crate::logger;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use tokio::fs;

/// Serve the static resource for `ctx.path`
pub async fn serve(ctx: &RequestContext<'_>, state: &AppState) -> Response<Full<Bytes>> {
    let Some(relative) = sanitize_path(ctx.path) else {
        return http::build_404_response();
    };
    let target = state.root.join(relative);
    let Some(metadata) = resolve_within_root(&target, &state.root, ctx.path).await else {
        return http::build_404_response();
    };

    if metadata.is_dir() {
        if !ctx.path.ends_with('/') {
            // A single leading slash keeps `//host` from reading as another origin
            let dir_path = ctx.path.trim_start_matches('/');
            let location = match ctx.query {
                Some(q) => format!("/{dir_path}/?{q}"),
                None => format!("/{dir_path}/"),
            };
            return http::build_redirect_response(&location);
        }
        for index_file in &state.config.static_files.index_files {
            let index_path = target.join(index_file);
            if let Some(index_meta) = resolve_within_root(&index_path, &state.root, ctx.path).await
            {
                if index_meta.is_file() {
                    return serve_file(ctx, state, &index_path, &index_meta).await;
                }
            }
        }
        if state.config.static_files.directory_listing {
            return serve_listing(ctx, &target).await;
        }
        return http::build_404_response();
    }

    // A trailing slash names a directory; files never match it
    if ctx.path.ends_with('/') {
        return http::build_404_response();
    }
    serve_file(ctx, state, &target, &metadata).await
}

/// Turn a raw request path into a root-relative filesystem path
///
/// Percent-decodes, then drops empty, `.` and `..` segments. Paths that do
/// not decode to UTF-8 or contain NUL / backslash are rejected.
pub fn sanitize_path(raw: &str) -> Option<PathBuf> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut relative = PathBuf::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." | ".." => {}
            s if s.contains('\0') || s.contains('\\') => return None,
            s => relative.push(s),
        }
    }
    Some(relative)
}

/// Stat `path` and make sure its real location is inside the root
async fn resolve_within_root(path: &Path, root: &Path, request_path: &str) -> Option<Metadata> {
    // Missing files are the common 404 case, not worth logging
    let canonical = fs::canonicalize(path).await.ok()?;
    if !canonical.starts_with(root) {
        logger::log_warning(&format!(
            "Path escapes static root, blocked: {} -> {}",
            request_path,
            canonical.display()
        ));
        return None;
    }
    fs::metadata(&canonical).await.ok()
}

async fn serve_file(
    ctx: &RequestContext<'_>,
    state: &AppState,
    path: &Path,
    metadata: &Metadata,
) -> Response<Full<Bytes>> {
    let content_type = state.mime.for_path(path);

    let validators = state.cache_policy.sends_validators().then(|| {
        let modified = metadata.modified().ok();
        Validators {
            etag: cache::generate_etag(metadata.len(), modified),
            last_modified: modified.map(cache::format_http_date),
            cache_control: state.cache_policy.file_cache_control(),
        }
    });

    if let Some(v) = &validators {
        if cache::is_not_modified(
            ctx.if_none_match,
            ctx.if_modified_since,
            &v.etag,
            metadata.modified().ok(),
        ) {
            return resp::build_304_response(v);
        }
    }

    let content = match fs::read(path).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!("Failed to read file '{}': {e}", path.display()));
            return http::build_404_response();
        }
    };

    resp::build_file_response(
        Bytes::from(content),
        content_type,
        validators.as_ref(),
        ctx.is_head,
    )
}

async fn serve_listing(ctx: &RequestContext<'_>, dir: &Path) -> Response<Full<Bytes>> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(e) => e,
        Err(e) => {
            logger::log_warning(&format!("Cannot list '{}': {e}", dir.display()));
            return http::build_404_response();
        }
    };

    let mut names = Vec::new();
    while let Ok(Some(entry)) = entries.next_entry().await {
        let name = entry.file_name().to_string_lossy().into_owned();
        let is_dir = fs::metadata(entry.path())
            .await
            .is_ok_and(|m| m.is_dir());
        names.push((name, is_dir));
    }
    names.sort_by_key(|(name, _)| name.to_lowercase());

    let display_path = urlencoding::decode(ctx.path)
        .map_or_else(|_| ctx.path.to_string(), |p| p.into_owned());
    resp::build_html_response(render_listing(&display_path, &names), ctx.is_head)
}

/// Render the directory listing page
fn render_listing(display_path: &str, entries: &[(String, bool)]) -> String {
    let title = escape_html(display_path);
    let mut items = String::new();
    for (name, is_dir) in entries {
        let suffix = if *is_dir { "/" } else { "" };
        items.push_str(&format!(
            "<li><a href=\"{}{suffix}\">{}{suffix}</a></li>\n",
            urlencoding::encode(name),
            escape_html(name),
        ));
    }
    format!(
        "<!DOCTYPE html>
<html lang=\"en\">
<head>
<meta charset=\"utf-8\">
<title>Directory listing for {title}</title>
</head>
<body>
<h1>Directory listing for {title}</h1>
<hr>
<ul>
{items}</ul>
<hr>
</body>
</html>
"
    )
}

fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(sanitize_path("/").unwrap(), PathBuf::new());
        assert_eq!(sanitize_path("/css/app.css").unwrap(), PathBuf::from("css/app.css"));
        assert_eq!(sanitize_path("/my%20file.txt").unwrap(), PathBuf::from("my file.txt"));
        assert_eq!(sanitize_path("//a/./b/").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn test_sanitize_path_drops_parent_segments() {
        assert_eq!(
            sanitize_path("/../../etc/passwd").unwrap(),
            PathBuf::from("etc/passwd")
        );
        assert_eq!(
            sanitize_path("/%2e%2e/%2E%2E/secret").unwrap(),
            PathBuf::from("secret")
        );
        assert!(sanitize_path("/a%00b").is_none());
        assert!(sanitize_path("/..%5c..%5cwin.ini").is_none());
        assert!(sanitize_path("/%ff").is_none());
    }

    #[test]
    fn test_render_listing() {
        let html = render_listing(
            "/docs/<x>/",
            &[
                ("a b.txt".to_string(), false),
                ("images".to_string(), true),
            ],
        );
        assert!(html.contains("Directory listing for /docs/&lt;x&gt;/"));
        assert!(html.contains("<li><a href=\"a%20b.txt\">a b.txt</a></li>"));
        assert!(html.contains("<li><a href=\"images/\">images/</a></li>"));
    }
}
