use axum::http::{header, HeaderValue};
use axum::response::{Html, IntoResponse, Response};

use crate::config::DASHBOARD_POLL_INTERVAL_SECS;

const DASHBOARD_HTML: &str = include_str!("../../static/dashboard.html");
const POLL_INTERVAL_PLACEHOLDER: &str = "{{POLL_INTERVAL_SECS}}";

/// The page with the client-side refresh interval filled in.
pub fn render_page(poll_interval_secs: u64) -> String {
    DASHBOARD_HTML.replace(POLL_INTERVAL_PLACEHOLDER, &poll_interval_secs.to_string())
}

/// GET / — the dashboard page.
pub async fn index() -> Response {
    let mut resp = Html(render_page(DASHBOARD_POLL_INTERVAL_SECS)).into_response();
    resp.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    resp
}
