//! Image scan endpoint
//!
//! HTTP adapter around [`crate::scan`]: parses the query, runs the walk on the
//! blocking pool and renders the report as JSON.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderValue, ACCESS_CONTROL_ALLOW_ORIGIN};
use hyper::{Response, StatusCode};
use std::sync::Arc;

use crate::config::AppState;
use crate::handler::router::RequestContext;
use crate::http;
use crate::logger;
use crate::scan::ScanRequest;

/// Handle `GET <scan.path>?path=<dir>`
///
/// The walk is not cancelled or time-limited: the response is sent once it
/// has visited the whole tree.
pub async fn handle_scan(ctx: &RequestContext<'_>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let request = match ScanRequest::from_query(ctx.query) {
        Ok(r) => r,
        Err(e) => {
            logger::log_warning(&format!("[Scan] Rejected request: {e}"));
            return allow_any_origin(http::build_400_response(&e.to_string()));
        }
    };

    let requested = request.path.clone();
    let outcome = tokio::task::spawn_blocking(move || request.run(&state.image_filter)).await;

    match outcome {
        Ok(Ok(report)) => {
            logger::log_debug(&format!(
                "[Scan] {} image(s) under '{requested}'",
                report.count
            ));
            http::json_response(StatusCode::OK, &report, true)
        }
        Ok(Err(e)) => {
            logger::log_warning(&format!("[Scan] Rejected request: {e}"));
            allow_any_origin(http::build_400_response(&e.to_string()))
        }
        Err(e) => {
            logger::log_error(&format!("[Scan] Scan task failed for '{requested}': {e}"));
            allow_any_origin(http::build_500_response())
        }
    }
}

fn allow_any_origin(mut response: Response<Full<Bytes>>) -> Response<Full<Bytes>> {
    response
        .headers_mut()
        .insert(ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}
