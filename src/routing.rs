//! Request routing: path to package identity, identity to origin, origin to
//! the ordered list of candidate URLs.

mod mapping;
mod path;
mod targets;

pub use mapping::{RoutingRule, RoutingTable, WILDCARD, match_wildcard, wildcard_to_regex};
pub use path::{PackageIdentity, ROUTING_PREFIX, SCOPE_MARKER};
pub use targets::{ProxyTarget, build_targets, strip_routing_prefix};
