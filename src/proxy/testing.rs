//! In-memory upstream used by the proxy tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};

use super::executor::InboundRequest;
use crate::error::ProxyTransportError;
use crate::routing::ProxyTarget;
use crate::upstream::{OutboundRequest, Upstream, UpstreamResponse};

/// Answers from a fixed table keyed by URL; unknown URLs are unreachable.
#[derive(Default)]
pub struct FakeUpstream {
    responses: HashMap<String, UpstreamResponse>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl FakeUpstream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, url: &str, response: UpstreamResponse) -> Self {
        self.responses.insert(url.to_string(), response);
        self
    }

    /// URLs contacted so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.url.to_string())
            .collect()
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl Upstream for FakeUpstream {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ProxyTransportError> {
        let url = request.url.to_string();
        self.requests.lock().unwrap().push(request);
        self.responses
            .get(&url)
            .cloned()
            .ok_or_else(|| ProxyTransportError::Unreachable {
                target: url,
                reason: "connection refused".to_string(),
            })
    }
}

pub fn response(status: u16, body: &str) -> UpstreamResponse {
    UpstreamResponse::new(
        StatusCode::from_u16(status).unwrap(),
        HeaderMap::new(),
        Bytes::copy_from_slice(body.as_bytes()),
    )
}

pub fn inbound(path: &str) -> InboundRequest {
    InboundRequest {
        method: Method::GET,
        path: path.to_string(),
        headers: HeaderMap::new(),
        body: Bytes::new(),
    }
}

pub fn targets(urls: &[&str]) -> Vec<ProxyTarget> {
    urls.iter().map(|url| ProxyTarget::new(url, "")).collect()
}
