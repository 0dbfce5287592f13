use std::fmt;

use crate::error::PathFormatError;

/// Path prefix served by the node proxy.
pub const ROUTING_PREFIX: &str = "/node";
/// First character of a scope segment (`@types`, `@aws-sdk`, ...).
pub const SCOPE_MARKER: char = '@';

/// Package addressed by a request path.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PackageIdentity {
    scope: Option<String>,
    name: String,
}

impl PackageIdentity {
    pub fn new(scope: Option<&str>, name: &str) -> Self {
        Self {
            scope: scope.map(str::to_owned),
            name: name.to_owned(),
        }
    }

    /// Parses `/<prefix>/@scope/name/...` or `/<prefix>/name/...`.
    ///
    /// Only the shape is checked; names are taken as they appear.
    pub fn parse(path: &str) -> Result<Self, PathFormatError> {
        let segments: Vec<&str> = path.split('/').collect();
        let malformed = || PathFormatError {
            path: path.to_owned(),
        };

        // segments[0] is the empty string before the leading slash and
        // segments[1] is the routing prefix.
        let first = segments
            .get(2)
            .copied()
            .filter(|s| !s.is_empty())
            .ok_or_else(malformed)?;

        if first.starts_with(SCOPE_MARKER) {
            let name = segments
                .get(3)
                .copied()
                .filter(|s| !s.is_empty())
                .ok_or_else(malformed)?;
            Ok(Self::new(Some(first), name))
        } else {
            Ok(Self::new(None, first))
        }
    }

    pub fn scope(&self) -> Option<&str> {
        self.scope.as_deref()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Lookup key used by mapping rules: `@scope/name` or `name`.
    pub fn key(&self) -> String {
        match &self.scope {
            Some(scope) => format!("{scope}/{}", self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for PackageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.scope {
            Some(scope) => write!(f, "{scope}/{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}
