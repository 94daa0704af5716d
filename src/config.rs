//! Configuration for the network stubber.
//!
//! Controls how stubs are picked up from the launch configuration and how
//! verbose logging is.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::Level;

/// Marker argument preceding the encoded stub payload.
pub const DEFAULT_MARKER: &str = "-NetworkStubs";

/// Main configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct StubberConfig {
    /// Launch argument handling
    #[serde(default)]
    pub launch: LaunchSettings,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingSettings,
}

impl StubberConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
        Self::from_yaml(&content)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml(yaml: &str) -> anyhow::Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> anyhow::Result<()> {
        self.launch.validate()?;
        self.logging.max_level()?;
        Ok(())
    }
}

/// Launch argument handling.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LaunchSettings {
    /// Argument (and environment variable) name announcing the payload
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Check the environment variable before the argument list
    #[serde(default = "default_true")]
    pub prefer_environment: bool,

    /// Log each step of launch processing
    #[serde(default = "default_true")]
    pub verbose_logging: bool,
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            marker: default_marker(),
            prefer_environment: true,
            verbose_logging: true,
        }
    }
}

impl LaunchSettings {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.marker.is_empty() {
            anyhow::bail!("Launch marker cannot be empty");
        }
        if !self.marker.starts_with('-') {
            anyhow::bail!("Launch marker must start with '-': {}", self.marker);
        }
        if self.marker.contains(char::is_whitespace) {
            anyhow::bail!("Launch marker cannot contain whitespace: {:?}", self.marker);
        }
        Ok(())
    }
}

fn default_marker() -> String {
    DEFAULT_MARKER.to_string()
}

fn default_true() -> bool {
    true
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSettings {
    /// Maximum level for the fmt subscriber (trace, debug, info, warn, error)
    #[serde(default = "default_level")]
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_level(),
        }
    }
}

impl LoggingSettings {
    pub fn max_level(&self) -> anyhow::Result<Level> {
        self.level
            .parse()
            .map_err(|_| anyhow::anyhow!("Invalid log level: {}", self.level))
    }
}

fn default_level() -> String {
    "info".to_string()
}
