use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use url::Url;

pub mod logging;
pub mod node;
pub mod server;


pub use logging::LoggingConfig;
pub use node::NodeProxyConfig;
pub use server::ServerConfig;

use crate::routing::RoutingTable;

/// Config location used when `--location` is not given, relative to the home directory.
pub const DEFAULT_CONFIG_FILE: &str = "/.gorp/gorp-config.json";

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub node: NodeProxyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Copy, Default)]
pub struct Overrides {
    pub port: Option<u16>,
}

impl Config {
    /// Resolves the config file path. The location is always taken relative
    /// to the user's home directory, falling back to the working directory.
    pub fn locate(location: Option<&str>) -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::locate_in(&home, location)
    }

    fn locate_in(home: &Path, location: Option<&str>) -> PathBuf {
        let location = location
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_CONFIG_FILE);
        home.join(location.trim_start_matches('/'))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parsing configuration json")
    }

    pub fn with_overrides(mut self, overrides: Overrides) -> Self {
        if let Some(port) = overrides.port.filter(|port| *port > 0) {
            self.server.port = port;
        }
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.workers == 0 {
            bail!("server.workers must be at least 1");
        }
        if self.node.connect_timeout_secs == 0 {
            bail!("node.connectTimeoutSecs must be at least 1");
        }
        if self.node.request_timeout_secs == 0 {
            bail!("node.requestTimeoutSecs must be at least 1");
        }
        validate_origin("node.registry", &self.node.registry)?;
        for (idx, origin) in self.node.fallback.iter().enumerate() {
            validate_origin(&format!("node.fallback[{idx}]"), origin)?;
        }
        for rule in &self.node.mappings {
            validate_origin(&format!("node.mappings[{:?}]", rule.pattern), &rule.target)?;
        }
        RoutingTable::compile(&self.node.mappings).context("compiling node.mappings")?;
        Ok(())
    }

    pub fn to_pretty_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serializing configuration")
    }
}

fn validate_origin(field: &str, origin: &str) -> Result<()> {
    let url = Url::parse(origin).with_context(|| format!("{field}: invalid origin {origin:?}"))?;
    if url.scheme() != "https" && url.scheme() != "http" {
        bail!("{field}: unsupported scheme in {origin}");
    }
    if url.host_str().is_none() {
        bail!("{field}: origin {origin} has no host");
    }
    Ok(())
}
