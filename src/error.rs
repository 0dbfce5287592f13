//! Request-path error taxonomy.
//!
//! Startup and CLI code uses `anyhow`; everything that can happen while a
//! single `/node/...` request is being served is one of the types below.

use http::StatusCode;
use thiserror::Error;

/// The request path is too short to carry a package identity.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unexpected package path format: {path}")]
pub struct PathFormatError {
    pub path: String,
}

/// A configured wildcard pattern could not be turned into a matcher.
#[derive(Debug, Clone, Error)]
#[error("invalid mapping pattern {pattern:?}: {reason}")]
pub struct MappingResolutionError {
    pub pattern: String,
    pub reason: String,
}

/// A candidate could not be reached at all.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProxyTransportError {
    #[error("invalid proxy target {target}: {reason}")]
    InvalidTarget { target: String, reason: String },
    #[error("timed out contacting {target}")]
    Timeout { target: String },
    #[error("failed to contact {target}: {reason}")]
    Unreachable { target: String, reason: String },
}

impl ProxyTransportError {
    pub fn target(&self) -> &str {
        match self {
            Self::InvalidTarget { target, .. }
            | Self::Timeout { target }
            | Self::Unreachable { target, .. } => target,
        }
    }
}

/// A candidate answered with a status outside 200..=299.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{target} returned {status}")]
pub struct UpstreamStatusError {
    pub target: String,
    pub status: StatusCode,
}

/// Writing the decided response back to the caller failed.
#[derive(Debug, Error)]
#[error("failed to write response: {0}")]
pub struct ResponseWriteError(#[source] pub anyhow::Error);

/// Errors that end a `/node/...` request with a synthetic response.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error(transparent)]
    PathFormat(#[from] PathFormatError),
    /// Not produced while serving: `GorpProxy` compiles every pattern before
    /// it accepts requests and resolution itself cannot fail. Kept so that a
    /// rule error has a defined 500 mapping.
    #[error(transparent)]
    MappingResolution(#[from] MappingResolutionError),
    #[error(transparent)]
    Transport(#[from] ProxyTransportError),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::PathFormat(_) => StatusCode::BAD_REQUEST,
            Self::MappingResolution(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Transport(_) => StatusCode::BAD_GATEWAY,
        }
    }

    /// Body text sent to the caller.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::PathFormat(_) => "Received unexpected package format",
            Self::MappingResolution(_) => "Failed to create proxy list",
            Self::Transport(_) => "Failed to proxy request",
        }
    }
}
