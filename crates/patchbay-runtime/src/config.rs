//! Engine configuration
//!
//! Handles loading configuration from defaults, a TOML file, and
//! environment variables with the `PATCHBAY_` prefix (later sources
//! override earlier ones).

use std::path::{Path, PathBuf};

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

use patchbay_domain::error::{Error, Result};

/// Default environment variable prefix
pub const CONFIG_ENV_PREFIX: &str = "PATCHBAY_";

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, or error
    pub level: String,
    /// Emit JSON-formatted log lines
    pub json_format: bool,
    /// Optional log file; rotated daily when set
    pub file_output: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            file_output: None,
        }
    }
}

/// Gate tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    /// Queue depth past which a component is reported as falling behind
    pub queue_warn_depth: usize,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            queue_warn_depth: 1024,
        }
    }
}

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Logging section
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Gate section
    #[serde(default)]
    pub gate: GateConfig,
}

/// Configuration loader service
#[derive(Clone, Default)]
pub struct ConfigLoader {
    /// Configuration file path
    config_path: Option<PathBuf>,

    /// Environment prefix
    env_prefix: Option<String>,
}

impl ConfigLoader {
    /// Create a new configuration loader with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the configuration file path
    pub fn with_config_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config_path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Set the environment variable prefix
    pub fn with_env_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.env_prefix = Some(prefix.into());
        self
    }

    /// Load configuration from all sources
    ///
    /// Configuration sources are merged in this order (later sources
    /// override earlier):
    /// 1. Default values from `EngineConfig::default()`
    /// 2. TOML configuration file (if set)
    /// 3. Environment variables with the prefix, `__` separating sections
    ///    (e.g. `PATCHBAY_LOGGING__LEVEL=debug`)
    pub fn load(&self) -> Result<EngineConfig> {
        let mut figment = Figment::new().merge(Serialized::defaults(EngineConfig::default()));
        if let Some(config_path) = &self.config_path {
            figment = figment.merge(Toml::file(config_path));
        }
        let prefix = self
            .env_prefix
            .clone()
            .unwrap_or_else(|| CONFIG_ENV_PREFIX.to_string());
        figment = figment.merge(Env::prefixed(&prefix).split("__"));
        figment
            .extract()
            .map_err(|e| Error::config_with_source("failed to load engine configuration", e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let config = ConfigLoader::new().load().unwrap();
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.gate.queue_warn_depth, 1024);
    }

    #[test]
    fn test_toml_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[logging]\nlevel = \"debug\"\n\n[gate]\nqueue_warn_depth = 16\n"
        )
        .unwrap();
        let config = ConfigLoader::new()
            .with_config_path(file.path())
            .load()
            .unwrap();
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.gate.queue_warn_depth, 16);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = ConfigLoader::new()
            .with_config_path("/nonexistent/patchbay.toml")
            .load()
            .unwrap();
        assert_eq!(config.gate.queue_warn_depth, 1024);
    }
}
