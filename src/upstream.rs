//! Outbound transport used to contact proxy candidates.

use anyhow::{Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use http::{HeaderMap, Method, StatusCode};
use tracing::{debug, info};
use url::Url;

use crate::config::NodeProxyConfig;
use crate::error::ProxyTransportError;


/// Request sent to a single candidate.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Fully buffered response from a candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl UpstreamResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[async_trait]
pub trait Upstream: Send + Sync {
    /// Sends one request and buffers the whole response. Exactly one attempt,
    /// redirects are returned as-is.
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ProxyTransportError>;
}

/// reqwest-backed upstream with bounded connect and request time.
#[derive(Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
}

impl UpstreamClient {
    pub fn new(config: &NodeProxyConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .connect_timeout(config.connect_timeout())
            .timeout(config.request_timeout())
            .build()
            .context("building upstream http client")?;

        info!(
            connect_timeout_secs = config.connect_timeout_secs,
            request_timeout_secs = config.request_timeout_secs,
            "Upstream client initialized",
        );

        Ok(Self { client })
    }
}

#[async_trait]
impl Upstream for UpstreamClient {
    async fn send(&self, request: OutboundRequest) -> Result<UpstreamResponse, ProxyTransportError> {
        let target = request.url.to_string();
        debug!(method = %request.method, url = %target, "sending upstream request");

        let response = self
            .client
            .request(request.method, request.url)
            .headers(request.headers)
            .body(request.body)
            .send()
            .await
            .map_err(|err| transport_error(&target, err))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|err| transport_error(&target, err))?;

        Ok(UpstreamResponse {
            status,
            headers,
            body,
        })
    }
}

fn transport_error(target: &str, err: reqwest::Error) -> ProxyTransportError {
    if err.is_timeout() {
        ProxyTransportError::Timeout {
            target: target.to_owned(),
        }
    } else {
        ProxyTransportError::Unreachable {
            target: target.to_owned(),
            reason: err.to_string(),
        }
    }
}
