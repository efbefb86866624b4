//! HTTP response building module
//!
//! Provides builders for the status codes the server emits, decoupled from
//! routing and file handling.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE, ALLOW, CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE, ETAG,
    LAST_MODIFIED, LOCATION,
};
use hyper::{Response, StatusCode};
use serde::Serialize;

/// Methods accepted on static file routes
pub const STATIC_METHODS: &str = "GET, HEAD, OPTIONS";
/// Methods accepted on the scan endpoint
pub const SCAN_METHODS: &str = "GET, OPTIONS";

/// Cache validators attached to a file response
#[derive(Debug, Clone)]
pub struct Validators {
    pub etag: String,
    pub last_modified: Option<String>,
    pub cache_control: String,
}

/// Build a plain-text response for any status
pub fn build_text_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from(message.to_owned())))
        .unwrap_or_else(|e| {
            log_build_error(status.as_str(), &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 400 Bad Request response with a short reason
pub fn build_400_response(reason: &str) -> Response<Full<Bytes>> {
    build_text_response(StatusCode::BAD_REQUEST, &format!("400 Bad Request: {reason}"))
}

/// Build 404 Not Found response
pub fn build_404_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::NOT_FOUND, "404 Not Found")
}

/// Build 500 Internal Server Error response
pub fn build_500_response() -> Response<Full<Bytes>> {
    build_text_response(StatusCode::INTERNAL_SERVER_ERROR, "500 Internal Server Error")
}

/// Build 405 Method Not Allowed response advertising `allow`
pub fn build_405_response(allow: &'static str) -> Response<Full<Bytes>> {
    let mut response =
        build_text_response(StatusCode::METHOD_NOT_ALLOWED, "405 Method Not Allowed");
    response
        .headers_mut()
        .insert(ALLOW, hyper::header::HeaderValue::from_static(allow));
    response
}

/// Build OPTIONS response (preflight request)
pub fn build_options_response(allow: &'static str, enable_cors: bool) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NO_CONTENT)
        .header(ALLOW, allow);

    if enable_cors {
        builder = builder
            .header(ACCESS_CONTROL_ALLOW_ORIGIN, "*")
            .header(ACCESS_CONTROL_ALLOW_METHODS, allow)
            .header(ACCESS_CONTROL_ALLOW_HEADERS, "Content-Type")
            .header(ACCESS_CONTROL_MAX_AGE, "86400");
    }

    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("OPTIONS", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build 301 redirect response
pub fn build_redirect_response(location: &str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::MOVED_PERMANENTLY)
        .header(LOCATION, location)
        .header(CONTENT_LENGTH, 0)
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|e| {
            log_build_error("301", &e);
            build_404_response()
        })
}

/// Build 304 Not Modified response
pub fn build_304_response(validators: &Validators) -> Response<Full<Bytes>> {
    let mut builder = Response::builder()
        .status(StatusCode::NOT_MODIFIED)
        .header(ETAG, &validators.etag)
        .header(CACHE_CONTROL, &validators.cache_control);
    if let Some(last_modified) = &validators.last_modified {
        builder = builder.header(LAST_MODIFIED, last_modified);
    }
    builder.body(Full::new(Bytes::new())).unwrap_or_else(|e| {
        log_build_error("304", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build generic HTML response
pub fn build_html_response(content: String, is_head: bool) -> Response<Full<Bytes>> {
    let content_length = content.len();
    let body = if is_head {
        Bytes::new()
    } else {
        Bytes::from(content)
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, "text/html; charset=utf-8")
        .header(CONTENT_LENGTH, content_length)
        .body(Full::new(body))
        .unwrap_or_else(|e| {
            log_build_error("HTML", &e);
            Response::new(Full::new(Bytes::new()))
        })
}

/// Build 200 response for a file body
///
/// Without validators the response carries no cache headers of its own; the
/// response-wide cache policy decides what the client may store.
pub fn build_file_response(
    data: Bytes,
    content_type: &str,
    validators: Option<&Validators>,
    is_head: bool,
) -> Response<Full<Bytes>> {
    let content_length = data.len();
    let body = if is_head { Bytes::new() } else { data };

    let mut builder = Response::builder()
        .status(StatusCode::OK)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, content_length);
    if let Some(v) = validators {
        builder = builder
            .header(ETAG, &v.etag)
            .header(CACHE_CONTROL, &v.cache_control);
        if let Some(last_modified) = &v.last_modified {
            builder = builder.header(LAST_MODIFIED, last_modified);
        }
    }

    builder.body(Full::new(body)).unwrap_or_else(|e| {
        log_build_error("200", &e);
        Response::new(Full::new(Bytes::new()))
    })
}

/// Build JSON response, optionally open to any origin
pub fn json_response<T: Serialize>(
    status: StatusCode,
    body: &T,
    allow_any_origin: bool,
) -> Response<Full<Bytes>> {
    let json = match serde_json::to_vec(body) {
        Ok(j) => j,
        Err(e) => {
            crate::logger::log_error(&format!("Failed to serialize response: {e}"));
            return build_500_response();
        }
    };

    let mut builder = Response::builder()
        .status(status)
        .header(CONTENT_TYPE, "application/json")
        .header(CONTENT_LENGTH, json.len());
    if allow_any_origin {
        builder = builder.header(ACCESS_CONTROL_ALLOW_ORIGIN, "*");
    }
    builder.body(Full::new(Bytes::from(json))).unwrap_or_else(|e| {
        log_build_error("JSON", &e);
        build_500_response()
    })
}

/// Log response build error
fn log_build_error(status: &str, error: &hyper::http::Error) {
    crate::logger::log_error(&format!("Failed to build {status} response: {error}"));
}
