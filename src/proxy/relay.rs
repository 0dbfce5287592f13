//! Conversion between the listener's HTTP types and the buffered proxy
//! types. Every response leaves through [`relay`], once per request.

use anyhow::{Context, anyhow};
use bytes::Bytes;
use http::{HeaderMap, HeaderName, HeaderValue, Method, header::TRANSFER_ENCODING};
use percent_encoding::percent_decode_str;
use rama::http::{Body, Request, Response, body::util::BodyExt};

use super::executor::InboundRequest;
use crate::error::ResponseWriteError;
use crate::upstream::UpstreamResponse;

/// Buffers the inbound request. The path is percent-decoded so that
/// `/node/@scope%2fname` routes like `/node/@scope/name`.
pub async fn buffer_request(req: Request<Body>) -> anyhow::Result<InboundRequest> {
    let (parts, body) = req.into_parts();

    let method = Method::from_bytes(parts.method.as_str().as_bytes())
        .with_context(|| format!("unsupported method {}", parts.method))?;
    let path = percent_decode_str(parts.uri.path())
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| parts.uri.path().to_owned());

    let mut headers = HeaderMap::with_capacity(parts.headers.len());
    for (name, value) in parts.headers.iter() {
        let name = HeaderName::from_bytes(name.as_str().as_bytes())
            .with_context(|| format!("invalid header name {}", name.as_str()))?;
        let value = HeaderValue::from_bytes(value.as_bytes())
            .with_context(|| format!("invalid value for header {name}"))?;
        headers.append(name, value);
    }

    let body = body
        .collect()
        .await
        .map_err(|err| anyhow!("reading request body: {err}"))?
        .to_bytes();

    Ok(InboundRequest {
        method,
        path,
        headers,
        body: Bytes::copy_from_slice(&body),
    })
}

/// Writes status, every header value and the full body of `source`.
///
/// `Transfer-Encoding` is dropped: the body is complete and the listener
/// frames it itself.
pub fn relay(source: UpstreamResponse) -> Result<Response<Body>, ResponseWriteError> {
    let mut builder = Response::builder().status(source.status.as_u16());
    for (name, value) in source.headers.iter() {
        if name == TRANSFER_ENCODING {
            continue;
        }
        builder = builder.header(name.as_str(), value.as_bytes());
    }

    builder
        .body(Body::from(source.body.to_vec()))
        .map_err(|err| ResponseWriteError(anyhow!("building relayed response: {err}")))
}
