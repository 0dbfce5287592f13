use std::fmt;

use url::Url;

use super::ROUTING_PREFIX;
use crate::config::NodeProxyConfig;
use crate::error::ProxyTransportError;

/// Fully qualified URL of one upstream candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyTarget(String);

impl ProxyTarget {
    /// Joins an origin with the request path minus the routing prefix.
    pub fn new(origin: &str, path: &str) -> Self {
        let origin = origin.strip_suffix('/').unwrap_or(origin);
        Self(format!("{origin}{}", strip_routing_prefix(path)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn url(&self) -> Result<Url, ProxyTransportError> {
        Url::parse(&self.0).map_err(|err| ProxyTransportError::InvalidTarget {
            target: self.0.clone(),
            reason: err.to_string(),
        })
    }
}

impl fmt::Display for ProxyTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Removes the routing prefix once, from the front of the path only.
pub fn strip_routing_prefix(path: &str) -> &str {
    path.strip_prefix(ROUTING_PREFIX).unwrap_or(path)
}

/// Ordered candidate list for a request.
///
/// A matched mapping goes first and is followed by the fallbacks only when
/// `useFallbackForMappings` is set. Without a mapping the registry goes first
/// and every fallback follows. The list is never empty.
pub fn build_targets(
    mapping: Option<&str>,
    path: &str,
    config: &NodeProxyConfig,
) -> Vec<ProxyTarget> {
    let (primary, with_fallback) = match mapping {
        Some(target) => (target, config.use_fallback_for_mappings),
        None => (config.registry.as_str(), true),
    };

    let mut targets = Vec::with_capacity(1 + config.fallback.len());
    targets.push(ProxyTarget::new(primary, path));
    if with_fallback {
        targets.extend(
            config
                .fallback
                .iter()
                .map(|origin| ProxyTarget::new(origin, path)),
        );
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node_config(use_fallback_for_mappings: bool) -> NodeProxyConfig {
        NodeProxyConfig {
            registry: "https://registry.example.com".to_string(),
            fallback: vec![
                "https://f1.example.com".to_string(),
                "https://f2.example.com".to_string(),
            ],
            use_fallback_for_mappings,
            ..NodeProxyConfig::default()
        }
    }

    fn urls(targets: &[ProxyTarget]) -> Vec<&str> {
        targets.iter().map(ProxyTarget::as_str).collect()
    }

    #[test]
    fn strips_prefix_exactly_once() {
        assert_eq!(
            ProxyTarget::new("https://o.example.com", "/node/foo/bar").as_str(),
            "https://o.example.com/foo/bar"
        );
        assert_eq!(
            ProxyTarget::new("https://o.example.com", "/node/node/bar").as_str(),
            "https://o.example.com/node/bar"
        );
    }

    #[test]
    fn keeps_prefix_that_is_not_leading() {
        assert_eq!(strip_routing_prefix("/pkg/node/x"), "/pkg/node/x");
    }

    #[test]
    fn trailing_slash_on_origin_is_not_doubled() {
        assert_eq!(
            ProxyTarget::new("https://o.example.com/", "/node/yarn").as_str(),
            "https://o.example.com/yarn"
        );
    }

    #[test]
    fn mapping_with_fallback() {
        let targets = build_targets(
            Some("https://m.example.com"),
            "/node/@es/core",
            &node_config(true),
        );
        assert_eq!(
            urls(&targets),
            [
                "https://m.example.com/@es/core",
                "https://f1.example.com/@es/core",
                "https://f2.example.com/@es/core",
            ]
        );
    }

    #[test]
    fn mapping_without_fallback() {
        let targets = build_targets(Some("https://m.example.com"), "/node/yarn", &node_config(false));
        assert_eq!(urls(&targets), ["https://m.example.com/yarn"]);
    }

    #[test]
    fn no_mapping_uses_registry_then_fallbacks() {
        for use_fallback_for_mappings in [true, false] {
            let targets = build_targets(None, "/node/yarn", &node_config(use_fallback_for_mappings));
            assert_eq!(
                urls(&targets),
                [
                    "https://registry.example.com/yarn",
                    "https://f1.example.com/yarn",
                    "https://f2.example.com/yarn",
                ]
            );
        }
    }

    #[test]
    fn no_fallbacks_still_yields_one_candidate() {
        let config = NodeProxyConfig::default();
        let targets = build_targets(None, "/node/yarn", &config);
        assert_eq!(urls(&targets), ["https://registry.npmjs.org/yarn"]);
    }

    #[test]
    fn invalid_target_is_a_transport_error() {
        let target = ProxyTarget::new("not a url", "/node/yarn");
        let err = target.url().unwrap_err();
        assert_eq!(err.target(), "not a url/yarn");
    }
}
