use regex::Regex;
use serde::{Deserialize, Serialize};

use super::PackageIdentity;
use crate::error::MappingResolutionError;

/// Matches any sequence of characters in a mapping pattern.
pub const WILDCARD: char = '*';

/// One `"pattern": "target"` entry of `node.mappings`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutingRule {
    pub pattern: String,
    pub target: String,
}

impl RoutingRule {
    pub fn new(pattern: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            target: target.into(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.pattern.contains(WILDCARD)
    }
}

#[derive(Debug)]
enum Matcher {
    Exact(String),
    Wildcard(Regex),
}

impl Matcher {
    fn matches(&self, key: &str) -> bool {
        match self {
            Matcher::Exact(pattern) => pattern == key,
            Matcher::Wildcard(regex) => regex.is_match(key),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    matcher: Matcher,
    target: String,
}

/// Mapping rules compiled once, evaluated in declaration order.
#[derive(Debug, Default)]
pub struct RoutingTable {
    rules: Vec<CompiledRule>,
}

impl RoutingTable {
    pub fn compile(rules: &[RoutingRule]) -> Result<Self, MappingResolutionError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let matcher = if rule.is_wildcard() {
                    Matcher::Wildcard(compile_wildcard(&rule.pattern)?)
                } else {
                    Matcher::Exact(rule.pattern.clone())
                };
                Ok(CompiledRule {
                    matcher,
                    target: rule.target.clone(),
                })
            })
            .collect::<Result<Vec<_>, MappingResolutionError>>()?;
        Ok(Self { rules })
    }

    /// Target origin of the first rule matching the identity's key.
    pub fn resolve(&self, identity: &PackageIdentity) -> Option<&str> {
        let key = identity.key();
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(&key))
            .map(|rule| rule.target.as_str())
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Anchored regex source for a wildcard pattern: `lodash*` becomes `^(?s:lodash.*)$`.
pub fn wildcard_to_regex(pattern: &str) -> String {
    let body = pattern
        .split(WILDCARD)
        .map(regex::escape)
        .collect::<Vec<_>>()
        .join(".*");
    format!("^(?s:{body})$")
}

fn compile_wildcard(pattern: &str) -> Result<Regex, MappingResolutionError> {
    Regex::new(&wildcard_to_regex(pattern)).map_err(|err| MappingResolutionError {
        pattern: pattern.to_owned(),
        reason: err.to_string(),
    })
}

/// Full-string wildcard match of `s` against `pattern`.
pub fn match_wildcard(s: &str, pattern: &str) -> Result<bool, MappingResolutionError> {
    Ok(compile_wildcard(pattern)?.is_match(s))
}
