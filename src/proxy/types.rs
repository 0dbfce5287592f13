use std::time::Instant;

use rama::http::{Body, Method, Request};

/// How a request was answered, for the access log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyStatus {
    /// Answered locally (root, health, not found).
    Local,
    /// First candidate answered 2xx.
    Primary,
    /// A later candidate answered 2xx.
    Fallback,
    /// Every candidate failed; the last answer was relayed.
    Exhausted,
    /// Dry-run placeholder artifact.
    DryRun,
    Error,
}

impl std::fmt::Display for ProxyStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProxyStatus::Local => write!(f, "local"),
            ProxyStatus::Primary => write!(f, "primary"),
            ProxyStatus::Fallback => write!(f, "fallback"),
            ProxyStatus::Exhausted => write!(f, "exhausted"),
            ProxyStatus::DryRun => write!(f, "dry-run"),
            ProxyStatus::Error => write!(f, "error"),
        }
    }
}

/// Request context for tracking request lifecycle
pub struct RequestContext {
    pub start: Instant,
    pub method: Method,
    pub path: String,
    pub status: ProxyStatus,
    /// Candidate that produced the relayed response, if any.
    pub upstream: Option<String>,
}

impl Default for RequestContext {
    fn default() -> Self {
        Self {
            start: Instant::now(),
            method: Method::GET,
            path: String::new(),
            status: ProxyStatus::Local,
            upstream: None,
        }
    }
}

impl RequestContext {
    pub fn from_request(req: &Request<Body>) -> Self {
        Self {
            start: Instant::now(),
            method: req.method().clone(),
            path: req.uri().path().to_string(),
            status: ProxyStatus::Local,
            upstream: None,
        }
    }

    pub fn summary(&self) -> String {
        format!("{} {}", self.method.as_str(), self.path)
    }
}
