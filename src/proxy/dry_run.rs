//! Dry-run mode: artifacts never leave the process and metadata is rewritten
//! to point back at the local server.

use std::borrow::Cow;

use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, StatusCode,
    header::{CONTENT_LENGTH, CONTENT_TYPE},
};
use regex::bytes::{NoExpand, Regex};
use tracing::warn;

use crate::upstream::UpstreamResponse;

/// Paths containing this marker are package tarballs.
pub const ARTIFACT_MARKER: &str = ".tgz";
/// Origin substituted for upstream URLs in dry-run metadata.
pub const PLACEHOLDER_ORIGIN: &str = "http://localhost:3224";
pub const PLACEHOLDER_ARTIFACT: &[u8] = b"This is a dummy tarball";

pub fn is_artifact_request(path: &str) -> bool {
    path.contains(ARTIFACT_MARKER)
}

pub fn placeholder_artifact() -> UpstreamResponse {
    let mut headers = HeaderMap::new();
    headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/octet-stream"),
    );
    headers.insert(CONTENT_LENGTH, HeaderValue::from(PLACEHOLDER_ARTIFACT.len()));
    UpstreamResponse::new(
        StatusCode::OK,
        headers,
        Bytes::from_static(PLACEHOLDER_ARTIFACT),
    )
}

/// Replaces every literal occurrence of `target` in the body with
/// [`PLACEHOLDER_ORIGIN`]. Status and headers are kept, except that a
/// `Content-Length` is updated to the new body size.
pub fn rewrite_urls(mut response: UpstreamResponse, target: &str) -> UpstreamResponse {
    if target.is_empty() {
        return response;
    }
    let literal = match Regex::new(&regex::escape(target)) {
        Ok(literal) => literal,
        Err(err) => {
            warn!(target, error = %err, "cannot build dry run rewrite, body left as is");
            return response;
        }
    };

    let placeholder = NoExpand(PLACEHOLDER_ORIGIN.as_bytes());
    let rewritten = match literal.replace_all(&response.body, placeholder) {
        Cow::Borrowed(_) => None,
        Cow::Owned(body) => Some(body),
    };
    let Some(body) = rewritten else {
        return response;
    };
    if response.headers.contains_key(CONTENT_LENGTH) {
        response
            .headers
            .insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
    }
    response.body = Bytes::from(body);
    response
}
