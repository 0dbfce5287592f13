use serde::{Deserialize, Serialize};

/// Log output settings. `RUST_LOG` takes precedence over `level` when set.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// One JSON object per line instead of the human readable format.
    pub json: bool,
    /// Colored output for the human readable format.
    pub ansi: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            ansi: true,
        }
    }
}
