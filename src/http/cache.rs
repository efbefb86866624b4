//! HTTP cache control module
//!
//! Validator generation, conditional request checks and the response-wide
//! cache policy.

use chrono::{DateTime, Utc};
use hyper::header::{HeaderMap, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};
use std::time::{SystemTime, UNIX_EPOCH};

/// Weak `ETag` built from file size and modification time
///
/// Returns a quoted tag such as `W/"1f4-65a8c3d0"`.
pub fn generate_etag(len: u64, modified: Option<SystemTime>) -> String {
    let mtime = modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map_or(0, |d| d.as_secs());
    format!("W/\"{len:x}-{mtime:x}\"")
}

/// Format a timestamp as an IMF-fixdate (`Sun, 06 Nov 1994 08:49:37 GMT`)
pub fn format_http_date(time: SystemTime) -> String {
    DateTime::<Utc>::from(time)
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value.trim())
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Check if client's `If-None-Match` header matches the server's `ETag`
///
/// Weak comparison: `W/` prefixes are ignored on both sides. Supports lists and `*`.
pub fn check_etag_match(if_none_match: Option<&str>, etag: &str) -> bool {
    let ours = etag.trim_start_matches("W/");
    if_none_match.is_some_and(|client_etag| {
        client_etag.split(',').any(|e| {
            let e = e.trim();
            e == "*" || e.trim_start_matches("W/") == ours
        })
    })
}

/// Whether a conditional GET can be answered with 304
///
/// `If-None-Match` takes precedence; `If-Modified-Since` is only consulted
/// when it is absent. Modification times are compared at second precision.
pub fn is_not_modified(
    if_none_match: Option<&str>,
    if_modified_since: Option<&str>,
    etag: &str,
    modified: Option<SystemTime>,
) -> bool {
    if if_none_match.is_some() {
        return check_etag_match(if_none_match, etag);
    }
    let (Some(since), Some(modified)) = (if_modified_since.and_then(parse_http_date), modified)
    else {
        return false;
    };
    DateTime::<Utc>::from(modified).timestamp() <= since.timestamp()
}

/// Cache policy applied to responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Static files may be cached for `max_age` seconds and revalidated
    Revalidate { max_age: u32 },
    /// Nothing may be cached; sent on every response
    NoStore,
}

impl CachePolicy {
    pub const fn sends_validators(self) -> bool {
        matches!(self, Self::Revalidate { .. })
    }

    /// Cache-Control value for a static file body
    pub fn file_cache_control(self) -> String {
        match self {
            Self::Revalidate { max_age } => format!("public, max-age={max_age}"),
            Self::NoStore => NO_STORE.to_string(),
        }
    }

    /// Stamp response-wide headers; a no-op for `Revalidate`
    pub fn apply(self, headers: &mut HeaderMap) {
        if self == Self::NoStore {
            headers.insert(CACHE_CONTROL, HeaderValue::from_static(NO_STORE));
            headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
            headers.insert(EXPIRES, HeaderValue::from_static("0"));
        }
    }
}

const NO_STORE: &str = "no-store, no-cache, must-revalidate";
