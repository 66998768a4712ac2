//! Bootstrap configuration loading and config file resolution
//!
//! The dashboard reads a single TOML file at startup. A missing file is not an
//! error: a warning is logged and compiled defaults are used. An unreadable or
//! unparsable file is a configuration error.
//!
//! # Config File Resolution
//!
//! 1. Command-line argument (highest priority)
//! 2. `LUPULO_CONFIG` environment variable
//! 3. User config directory (`~/.config/lupulo/config.toml` on Linux)
//! 4. System config (`/etc/lupulo/config.toml`, Linux only)
//!
//! If none of these exist, [`DashConfig::default`] is used.

use crate::{Error, Result};
use crate::time::millis_to_duration;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the config file
pub const CONFIG_ENV_VAR: &str = "LUPULO_CONFIG";

/// Bootstrap configuration loaded from TOML
///
/// These settings cannot change during runtime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashConfig {
    /// Upstream Server-Sent Events URL (layouts, devices and data events)
    #[serde(default = "default_source_url")]
    pub source_url: String,

    /// Interface the HTTP API binds to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// HTTP API port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Widget repaint cadence in milliseconds
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Delay before reconnecting to the upstream source, unless the
    /// server sends its own `retry:` value
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,

    /// EventBus channel capacity
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,

    /// Device selected at startup (otherwise the first announced device)
    #[serde(default)]
    pub default_device: Option<String>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_source_url() -> String {
    "http://127.0.0.1:8080/subscribe".to_string()
}

fn default_bind_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_tick_interval_ms() -> u64 {
    1000
}

fn default_reconnect_delay_ms() -> u64 {
    3000
}

fn default_event_capacity() -> usize {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for DashConfig {
    fn default() -> Self {
        Self {
            source_url: default_source_url(),
            bind_host: default_bind_host(),
            port: default_port(),
            tick_interval_ms: default_tick_interval_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            event_capacity: default_event_capacity(),
            default_device: None,
            logging: LoggingConfig::default(),
        }
    }
}

impl DashConfig {
    /// Parse configuration from TOML text and validate it
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: DashConfig = toml::from_str(content)
            .map_err(|e| Error::Config(format!("Failed to parse TOML: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    ///
    /// A missing file yields defaults (with a warning). Any other read
    /// failure or a parse failure is an error.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => {
                let config = Self::from_toml_str(&content)?;
                info!("Loaded configuration from {}", path.display());
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    "Config file {} not found, using compiled defaults",
                    path.display()
                );
                Ok(Self::default())
            }
            Err(e) => Err(Error::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Reject values the runtime cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_ms == 0 {
            return Err(Error::Config("tick_interval_ms must be > 0".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be > 0".to_string()));
        }
        if self.source_url.trim().is_empty() {
            return Err(Error::Config("source_url must not be empty".to_string()));
        }
        Ok(())
    }

    /// Apply command-line overrides on top of the file values
    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(url) = overrides.source_url {
            self.source_url = url;
        }
        if let Some(host) = overrides.bind_host {
            self.bind_host = host;
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(device) = overrides.default_device {
            self.default_device = Some(device);
        }
        if let Some(level) = overrides.log_level {
            self.logging.level = level;
        }
    }

    /// Socket address string for the HTTP API
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.port)
    }

    pub fn tick_interval(&self) -> Duration {
        millis_to_duration(self.tick_interval_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        millis_to_duration(self.reconnect_delay_ms)
    }
}

/// Command-line configuration overrides
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub source_url: Option<String>,
    pub bind_host: Option<String>,
    pub port: Option<u16>,
    pub default_device: Option<String>,
    pub log_level: Option<String>,
}

/// Locates the config file following the resolution order above
pub struct ConfigResolver {
    cli_path: Option<PathBuf>,
}

impl ConfigResolver {
    pub fn new(cli_path: Option<PathBuf>) -> Self {
        Self { cli_path }
    }

    /// Resolve the config file path, or `None` when no candidate exists
    ///
    /// An explicit CLI or environment path is returned even if the file does
    /// not exist, so that `DashConfig::load` can report it.
    pub fn resolve(&self) -> Option<PathBuf> {
        if let Some(path) = &self.cli_path {
            return Some(path.clone());
        }

        if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
            if !path.trim().is_empty() {
                return Some(PathBuf::from(path));
            }
        }

        if let Some(user_config) = dirs::config_dir().map(|d| d.join("lupulo").join("config.toml")) {
            if user_config.exists() {
                return Some(user_config);
            }
        }

        if cfg!(target_os = "linux") {
            let system_config = PathBuf::from("/etc/lupulo/config.toml");
            if system_config.exists() {
                return Some(system_config);
            }
        }

        None
    }

    /// Resolve and load, falling back to defaults when nothing is found
    pub fn load(&self) -> Result<DashConfig> {
        match self.resolve() {
            Some(path) => DashConfig::load(&path),
            None => {
                warn!("No config file found, using compiled defaults");
                Ok(DashConfig::default())
            }
        }
    }
}
