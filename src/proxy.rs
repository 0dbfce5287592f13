mod dry_run;
mod executor;
mod relay;
mod response;
mod types;

#[cfg(test)]
mod testing;

use std::sync::Arc;

use anyhow::{Context, Result};
use rama::{
    Service,
    error::BoxError,
    http::{Body, Method, Request, Response},
};
use tracing::{error, info, warn};

use crate::config::Config;
use crate::error::ProxyError;
use crate::routing::{PackageIdentity, ROUTING_PREFIX, RoutingTable, build_targets};
use crate::upstream::{Upstream, UpstreamClient, UpstreamResponse};

pub use dry_run::{
    ARTIFACT_MARKER, PLACEHOLDER_ARTIFACT, PLACEHOLDER_ORIGIN, is_artifact_request,
    placeholder_artifact, rewrite_urls,
};
pub use executor::{
    Attempt, AttemptResult, Execution, InboundRequest, Outcome, execute, outbound_request,
};
pub use relay::{buffer_request, relay};
pub use types::{ProxyStatus, RequestContext};

/// Main proxy service
#[derive(Clone)]
pub struct GorpProxy {
    config: Arc<Config>,
    routes: Arc<RoutingTable>,
    upstream: Arc<dyn Upstream>,
    dry_run: bool,
}

impl GorpProxy {
    pub fn new(config: Arc<Config>, dry_run: bool) -> Result<Self> {
        let upstream = UpstreamClient::new(&config.node).context("building upstream client")?;
        Self::with_upstream(config, Arc::new(upstream), dry_run)
    }

    pub fn with_upstream(
        config: Arc<Config>,
        upstream: Arc<dyn Upstream>,
        dry_run: bool,
    ) -> Result<Self> {
        let routes =
            RoutingTable::compile(&config.node.mappings).context("compiling node mappings")?;
        info!(
            mappings = routes.len(),
            fallback = config.node.fallback.len(),
            dry_run,
            "node proxy initialized"
        );
        Ok(Self {
            config,
            routes: Arc::new(routes),
            upstream,
            dry_run,
        })
    }

    async fn handle(&self, req: Request<Body>, ctx: &mut RequestContext) -> Result<Response<Body>> {
        let path = req.uri().path().to_owned();
        let is_get = req.method() == Method::GET;

        let reply = if is_node_route(&path) {
            let inbound = relay::buffer_request(req)
                .await
                .context("buffering inbound request")?;
            self.proxy_node(&inbound, ctx).await
        } else if is_get && path == "/" {
            response::banner(&self.config, self.dry_run)
        } else if is_get && path == "/health" {
            response::health()
        } else {
            response::not_found()
        };

        Ok(relay::relay(reply)?)
    }

    /// Decides the one response for a `/node/...` request. Nothing has been
    /// written to the caller when this returns.
    pub async fn proxy_node(
        &self,
        inbound: &InboundRequest,
        ctx: &mut RequestContext,
    ) -> UpstreamResponse {
        match self.route(inbound, ctx).await {
            Ok(resp) => resp,
            Err(err) => {
                ctx.status = ProxyStatus::Error;
                warn!(error = %err, path = %inbound.path, "node request failed");
                response::text(err.status_code(), err.public_message())
            }
        }
    }

    async fn route(
        &self,
        inbound: &InboundRequest,
        ctx: &mut RequestContext,
    ) -> Result<UpstreamResponse, ProxyError> {
        if self.dry_run && dry_run::is_artifact_request(&inbound.path) {
            info!(path = %inbound.path, "Received dry run request for tarball");
            ctx.status = ProxyStatus::DryRun;
            return Ok(dry_run::placeholder_artifact());
        }

        let identity = PackageIdentity::parse(&inbound.path)?;
        info!(
            scope = identity.scope().unwrap_or_default(),
            name = identity.name(),
            path = %inbound.path,
            "Received request"
        );

        let mapping = self.routes.resolve(&identity);
        let candidates = build_targets(mapping, &inbound.path, &self.config.node);
        let execution = executor::execute(self.upstream.as_ref(), &candidates, inbound).await;
        let decided_by = execution.decided_by();

        match execution.outcome {
            Outcome::Success { target, response } => {
                ctx.status = if decided_by == 0 {
                    ProxyStatus::Primary
                } else {
                    ProxyStatus::Fallback
                };
                ctx.upstream = Some(target.to_string());
                if self.dry_run {
                    info!(target = %target, "Overriding tarball urls for dry run");
                    Ok(dry_run::rewrite_urls(response, target.as_str()))
                } else {
                    Ok(response)
                }
            }
            Outcome::Exhausted { target, response } => {
                ctx.status = ProxyStatus::Exhausted;
                ctx.upstream = Some(target.to_string());
                Ok(response)
            }
            Outcome::Failed(err) => Err(err.into()),
        }
    }
}

fn is_node_route(path: &str) -> bool {
    path.strip_prefix(ROUTING_PREFIX)
        .is_some_and(|rest| rest.starts_with('/'))
}

impl Service<Request<Body>> for GorpProxy {
    type Output = Response<Body>;
    type Error = BoxError;

    async fn serve(&self, req: Request<Body>) -> Result<Self::Output, Self::Error> {
        let mut ctx = RequestContext::from_request(&req);

        let result = self.handle(req, &mut ctx).await;

        let duration_ms = ctx.start.elapsed().as_millis();
        match &result {
            Ok(resp) => {
                info!(
                    summary = %ctx.summary(),
                    response_code = resp.status().as_u16(),
                    duration_ms,
                    proxy_status = %ctx.status,
                    upstream = ctx.upstream.as_deref().unwrap_or("-"),
                    "request handled"
                );
            }
            Err(err) => {
                error!(
                    summary = %ctx.summary(),
                    duration_ms,
                    proxy_status = %ctx.status,
                    error = %err,
                    "request failed"
                );
            }
        }

        result.map_err(|e| e.into())
    }
}
