use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::routing::RoutingRule;

/// Routing configuration for the `/node/` endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeProxyConfig {
    #[serde(default = "default_registry")]
    pub registry: String,
    #[serde(default)]
    pub fallback: Vec<String>,
    #[serde(default)]
    pub use_fallback_for_mappings: bool,
    /// Rules in the order they are declared in the file.
    #[serde(default, with = "ordered_rules")]
    pub mappings: Vec<RoutingRule>,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl NodeProxyConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl Default for NodeProxyConfig {
    fn default() -> Self {
        Self {
            registry: default_registry(),
            fallback: Vec::new(),
            use_fallback_for_mappings: false,
            mappings: Vec::new(),
            connect_timeout_secs: default_connect_timeout_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_registry() -> String {
    "https://registry.npmjs.org".to_string()
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_request_timeout_secs() -> u64 {
    60
}

/// `mappings` is a JSON object whose key order is significant, so it is read
/// entry by entry instead of through a hash map.
mod ordered_rules {
    use std::fmt;

    use serde::{
        Deserializer, Serializer,
        de::{MapAccess, Visitor},
        ser::SerializeMap,
    };

    use crate::routing::RoutingRule;

    pub fn serialize<S>(rules: &[RoutingRule], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(rules.len()))?;
        for rule in rules {
            map.serialize_entry(&rule.pattern, &rule.target)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<RoutingRule>, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(RulesVisitor)
    }

    struct RulesVisitor;

    impl<'de> Visitor<'de> for RulesVisitor {
        type Value = Vec<RoutingRule>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of package patterns to target origins")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut rules = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((pattern, target)) = access.next_entry::<String, String>()? {
                rules.push(RoutingRule { pattern, target });
            }
            Ok(rules)
        }

        fn visit_unit<E>(self) -> Result<Self::Value, E>
        where
            E: serde::de::Error,
        {
            Ok(Vec::new())
        }
    }
}
