use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode, header};

use crate::config::Config;
use crate::upstream::UpstreamResponse;

/// Plain text response
pub fn text(status: StatusCode, body: &str) -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(body.len()));
    UpstreamResponse::new(status, headers, Bytes::copy_from_slice(body.as_bytes()))
}

pub fn health() -> UpstreamResponse {
    text(StatusCode::OK, "Gorp Server is healthy\n")
}

/// Root banner listing what this node proxies.
pub fn banner(config: &Config, dry_run: bool) -> UpstreamResponse {
    let mut body = format!(
        "Hello from Gorp Server\nnode registry: {}\n",
        config.node.registry
    );
    for origin in &config.node.fallback {
        body.push_str(&format!("node fallback: {origin}\n"));
    }
    if dry_run {
        body.push_str("dry run: artifact downloads are mocked\n");
    }
    let mut resp = text(StatusCode::OK, &body);
    resp.headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    resp
}

pub fn not_found() -> UpstreamResponse {
    text(StatusCode::NOT_FOUND, "not found")
}
