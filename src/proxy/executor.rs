//! Sequential fallback over the candidate list.

use bytes::Bytes;
use http::{
    HeaderMap, HeaderValue, Method, StatusCode,
    header::{CONTENT_LENGTH, HOST, TRANSFER_ENCODING},
};
use tracing::{info, warn};
use url::Url;

use crate::error::{ProxyTransportError, UpstreamStatusError};
use crate::routing::ProxyTarget;
use crate::upstream::{OutboundRequest, Upstream, UpstreamResponse};

/// Inbound `/node/...` request with its body already buffered.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Percent-decoded request path.
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptResult {
    Accepted(StatusCode),
    Rejected(UpstreamStatusError),
    Unreachable(ProxyTransportError),
}

/// Record of one contacted candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct Attempt {
    pub target: ProxyTarget,
    pub result: AttemptResult,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A candidate answered 2xx.
    Success {
        target: ProxyTarget,
        response: UpstreamResponse,
    },
    /// Every candidate failed and the last one produced a response; it is
    /// relayed unchanged.
    Exhausted {
        target: ProxyTarget,
        response: UpstreamResponse,
    },
    /// The last candidate could not be reached.
    Failed(ProxyTransportError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Execution {
    pub outcome: Outcome,
    pub attempts: Vec<Attempt>,
}

impl Execution {
    /// Index of the candidate that produced the outcome.
    pub fn decided_by(&self) -> usize {
        self.attempts.len().saturating_sub(1)
    }
}

/// Contacts candidates in order and stops at the first 2xx.
///
/// Nothing is written to the caller here; the returned [`Execution`] is the
/// single decided outcome plus the attempt log.
pub async fn execute(
    upstream: &dyn Upstream,
    candidates: &[ProxyTarget],
    inbound: &InboundRequest,
) -> Execution {
    let mut attempts = Vec::with_capacity(candidates.len());
    let last = candidates.len().saturating_sub(1);

    for (idx, target) in candidates.iter().enumerate() {
        let is_last = idx == last;
        info!(from = %inbound.path, to = %target, "Proxying request");

        let result = match target.url() {
            Ok(url) => upstream.send(outbound_request(&url, inbound)).await,
            Err(err) => Err(err),
        };

        match result {
            Ok(response) if response.is_success() => {
                info!(
                    status = %response.status,
                    from = %inbound.path,
                    to = %target,
                    "Successfully proxied request"
                );
                attempts.push(Attempt {
                    target: target.clone(),
                    result: AttemptResult::Accepted(response.status),
                });
                return Execution {
                    outcome: Outcome::Success {
                        target: target.clone(),
                        response,
                    },
                    attempts,
                };
            }
            Ok(response) => {
                warn!(
                    status = %response.status,
                    from = %inbound.path,
                    to = %target,
                    "Upstream rejected request"
                );
                attempts.push(Attempt {
                    target: target.clone(),
                    result: AttemptResult::Rejected(UpstreamStatusError {
                        target: target.to_string(),
                        status: response.status,
                    }),
                });
                if is_last {
                    warn!(
                        status = %response.status,
                        from = %inbound.path,
                        to = %target,
                        "All proxies failed. Returning last response"
                    );
                    return Execution {
                        outcome: Outcome::Exhausted {
                            target: target.clone(),
                            response,
                        },
                        attempts,
                    };
                }
            }
            Err(err) => {
                warn!(error = %err, from = %inbound.path, to = %target, "Failed to proxy request");
                attempts.push(Attempt {
                    target: target.clone(),
                    result: AttemptResult::Unreachable(err.clone()),
                });
                if is_last {
                    return Execution {
                        outcome: Outcome::Failed(err),
                        attempts,
                    };
                }
            }
        }
    }

    Execution {
        outcome: Outcome::Failed(ProxyTransportError::Unreachable {
            target: inbound.path.clone(),
            reason: "no proxy targets".to_string(),
        }),
        attempts,
    }
}

/// Copies method, body and every header of the inbound request, with `Host`
/// pointing at the candidate. Framing headers are left to the client since
/// the body is already buffered.
pub fn outbound_request(url: &Url, inbound: &InboundRequest) -> OutboundRequest {
    let mut headers = HeaderMap::with_capacity(inbound.headers.len() + 1);
    for (name, value) in inbound.headers.iter() {
        if name == HOST || name == CONTENT_LENGTH || name == TRANSFER_ENCODING {
            continue;
        }
        headers.append(name, value.clone());
    }
    if let Some(host) = host_header(url) {
        headers.insert(HOST, host);
    }

    OutboundRequest {
        method: inbound.method.clone(),
        url: url.clone(),
        headers,
        body: inbound.body.clone(),
    }
}

/// `host[:port]` of the candidate, port only when not the scheme default.
fn host_header(url: &Url) -> Option<HeaderValue> {
    let host = url.host_str()?;
    let value = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_owned(),
    };
    HeaderValue::from_str(&value).ok()
}
