//! # Configuration Management
//!
//! Centralized configuration for the control family and its host runtime.
//!
//! This module provides structured configuration for the family registration
//! (name, version, multicast groups), the module state (version string and
//! debug verbosity), the local socket runtime and logging.
//!
//! ## Configuration Sources
//! - TOML files via `from_file()`
//! - Direct instantiation with defaults
//! - Environment overrides via `from_env()`; `GENL_CONTROL_DEBUG_LEVEL` is the
//!   start-up parameter for the debug verbosity
//!
//! ## Debug Level
//! The conventional range is 0-4 (4 most verbose). Larger values are accepted
//! everywhere and only produce a validation warning.

use crate::error::{constants, ProtocolError, Result};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use tracing::Level;

/// Family names and multicast group names are limited to this many bytes
pub const MAX_NAME_LEN: usize = 16;

/// Default family name
pub const DEFAULT_FAMILY_NAME: &str = "mod";

/// Default family version
pub const DEFAULT_FAMILY_VERSION: u8 = 0;

/// Default multicast group, reserved for asynchronous notifications
pub const DEFAULT_MULTICAST_GROUP: &str = "hello_grp";

/// Module version reported by get-info
pub const MODULE_VERSION: &str = "0.0.0";

/// Debug verbosity at start-up
pub const DEFAULT_DEBUG_LEVEL: u16 = 4;

/// Highest debug level in the conventional range
pub const MAX_CONVENTIONAL_DEBUG_LEVEL: u16 = 4;

/// Capacity reserved for each outbound confirm
pub const DEFAULT_MESSAGE_CAPACITY: usize = 4096;

/// Max allowed message size (64 KB)
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024;

/// Main configuration structure that contains all configurable settings
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ControlConfig {
    /// Family registration
    #[serde(default)]
    pub family: FamilyConfig,

    /// Module state
    #[serde(default)]
    pub module: ModuleConfig,

    /// Local socket runtime
    #[serde(default)]
    pub server: ServerConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ControlConfig {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut file = File::open(path)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to open config file: {e}")))?;

        let mut contents = String::new();
        file.read_to_string(&mut contents)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to read config file: {e}")))?;

        Self::from_toml(&contents)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str::<Self>(content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to parse TOML: {e}")))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(level) = std::env::var("GENL_CONTROL_DEBUG_LEVEL") {
            config.module.debug_level = level.parse::<u16>().map_err(|e| {
                ProtocolError::ConfigError(format!("Invalid GENL_CONTROL_DEBUG_LEVEL: {e}"))
            })?;
        }

        if let Ok(name) = std::env::var("GENL_CONTROL_FAMILY_NAME") {
            config.family.name = name;
        }

        if let Ok(path) = std::env::var("GENL_CONTROL_SOCKET_PATH") {
            config.server.socket_path = path;
        }

        Ok(config)
    }

    /// Apply overrides to the default configuration
    pub fn default_with_overrides<F>(mutator: F) -> Self
    where
        F: FnOnce(&mut Self),
    {
        let mut config = Self::default();
        mutator(&mut config);
        config
    }

    /// Generate example configuration file content
    pub fn example_config() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate example config"))
    }

    /// Save configuration to a file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to serialize config: {e}")))?;

        std::fs::write(path, content)
            .map_err(|e| ProtocolError::ConfigError(format!("Failed to write config file: {e}")))?;

        Ok(())
    }

    /// Validate the configuration for common issues and misconfigurations
    ///
    /// Returns a list of validation errors. Empty list means configuration is valid.
    /// Entries starting with `WARNING:` are advisory.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        errors.extend(self.family.validate());
        errors.extend(self.module.validate());
        errors.extend(self.server.validate());
        errors.extend(self.logging.validate());
        errors
    }

    /// Validate and return Result, ignoring advisory warnings
    pub fn validate_strict(&self) -> Result<()> {
        let errors: Vec<String> = self
            .validate()
            .into_iter()
            .filter(|e| !e.starts_with("WARNING"))
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::ConfigError(format!(
                "Configuration validation failed:\n  - {}",
                errors.join("\n  - ")
            )))
        }
    }
}

/// Check a family or group name against the registration rules
pub fn check_name(name: &str, too_long: &'static str) -> Result<()> {
    if name.is_empty() {
        return Err(ProtocolError::Registration(
            constants::ERR_FAMILY_NAME_EMPTY.to_string(),
        ));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(ProtocolError::Registration(format!("{too_long}: '{name}'")));
    }
    Ok(())
}

/// Family registration settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FamilyConfig {
    /// Family name (at most 16 bytes)
    pub name: String,

    /// Family version stamped on every confirm
    pub version: u8,

    /// Declared multicast groups
    pub multicast_groups: Vec<String>,

    /// Bytes reserved for each outbound confirm
    pub message_capacity: usize,
}

impl Default for FamilyConfig {
    fn default() -> Self {
        Self {
            name: String::from(DEFAULT_FAMILY_NAME),
            version: DEFAULT_FAMILY_VERSION,
            multicast_groups: vec![String::from(DEFAULT_MULTICAST_GROUP)],
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
        }
    }
}

impl FamilyConfig {
    /// Validate family configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if let Err(e) = check_name(&self.name, constants::ERR_FAMILY_NAME_LONG) {
            errors.push(e.to_string());
        }

        for (i, group) in self.multicast_groups.iter().enumerate() {
            if let Err(e) = check_name(group, constants::ERR_GROUP_NAME_LONG) {
                errors.push(e.to_string());
            }
            if self.multicast_groups[..i].contains(group) {
                errors.push(format!("Duplicate multicast group: '{group}'"));
            }
        }

        if self.message_capacity < crate::core::message::HEADER_LEN + 64 {
            errors.push(format!(
                "Message capacity too small: {} bytes (minimum: {})",
                self.message_capacity,
                crate::core::message::HEADER_LEN + 64
            ));
        } else if self.message_capacity > MAX_MESSAGE_SIZE {
            errors.push(format!(
                "Message capacity too large: {} bytes (maximum: {MAX_MESSAGE_SIZE})",
                self.message_capacity
            ));
        }

        errors
    }
}

/// Module state settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ModuleConfig {
    /// Version string reported by get-info
    pub version: String,

    /// Debug verbosity at registration (0-4 conventional)
    pub debug_level: u16,
}

impl Default for ModuleConfig {
    fn default() -> Self {
        Self {
            version: String::from(MODULE_VERSION),
            debug_level: DEFAULT_DEBUG_LEVEL,
        }
    }
}

impl ModuleConfig {
    /// Validate module configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.version.is_empty() {
            errors.push("Module version cannot be empty".to_string());
        } else if self.version.contains('\0') {
            errors.push("Module version cannot contain NUL bytes".to_string());
        }

        if self.debug_level > MAX_CONVENTIONAL_DEBUG_LEVEL {
            errors.push(format!(
                "WARNING: debug level {} is above the conventional range 0-{MAX_CONVENTIONAL_DEBUG_LEVEL}",
                self.debug_level
            ));
        }

        errors
    }
}

/// Local socket runtime settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Unix socket path
    pub socket_path: String,

    /// Inbound requests queued ahead of the dispatcher
    pub backlog: usize,

    /// Timeout for graceful server shutdown
    #[serde(with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// How long a client waits for a confirm
    #[serde(with = "duration_serde")]
    pub response_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            socket_path: String::from("/tmp/genl-control.sock"),
            backlog: 64,
            shutdown_timeout: Duration::from_secs(10),
            response_timeout: Duration::from_secs(5),
        }
    }
}

impl ServerConfig {
    /// Validate server configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.socket_path.is_empty() {
            errors.push("Socket path cannot be empty".to_string());
        }

        if self.backlog == 0 {
            errors.push("Backlog must be greater than 0".to_string());
        } else if self.backlog > 100_000 {
            errors.push(format!(
                "Backlog too large: {} (max recommended: 100,000)",
                self.backlog
            ));
        }

        if self.shutdown_timeout.as_secs() < 1 {
            errors.push("Shutdown timeout too short (minimum: 1s)".to_string());
        } else if self.shutdown_timeout.as_secs() > 60 {
            errors.push("Shutdown timeout too long (maximum: 60s)".to_string());
        }

        if self.response_timeout.as_millis() < 10 {
            errors.push("Response timeout too short (minimum: 10ms)".to_string());
        }

        errors
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Application name for logs
    pub app_name: String,

    /// Log level
    #[serde(with = "log_level_serde")]
    pub log_level: Level,

    /// Whether to log to console
    pub log_to_console: bool,

    /// Whether to log to file
    pub log_to_file: bool,

    /// Path to log file (if log_to_file is true)
    pub log_file_path: Option<String>,

    /// Whether to use JSON formatting for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            app_name: String::from("genl-control"),
            log_level: Level::INFO,
            log_to_console: true,
            log_to_file: false,
            log_file_path: None,
            json_format: false,
        }
    }
}

impl LoggingConfig {
    /// Validate logging configuration
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if self.app_name.is_empty() {
            errors.push("Application name cannot be empty".to_string());
        } else if self.app_name.len() > 64 {
            errors.push(format!(
                "Application name too long: {} characters (maximum: 64)",
                self.app_name.len()
            ));
        }

        if self.log_to_file {
            if let Some(ref path) = self.log_file_path {
                if let Some(parent) = std::path::Path::new(path).parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        errors.push(format!(
                            "Log file directory does not exist: {}",
                            parent.display()
                        ));
                    }
                }
            } else {
                errors.push("log_file_path must be specified when log_to_file is true".to_string());
            }
        }

        if !self.log_to_console && !self.log_to_file {
            errors
                .push("At least one logging output (console or file) must be enabled".to_string());
        }

        errors
    }
}

/// Helper module for Duration serialization/deserialization
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = duration.as_millis() as u64;
        millis.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Helper module for tracing::Level serialization/deserialization
mod log_level_serde {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::str::FromStr;
    use tracing::Level;

    pub fn serialize<S>(level: &Level, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let level_str = match *level {
            Level::TRACE => "trace",
            Level::DEBUG => "debug",
            Level::INFO => "info",
            Level::WARN => "warn",
            Level::ERROR => "error",
        };
        level_str.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Level, D::Error>
    where
        D: Deserializer<'de>,
    {
        let level_str = String::deserialize(deserializer)?;
        Level::from_str(&level_str)
            .map_err(|_| serde::de::Error::custom(format!("Invalid log level: {level_str}")))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_overrides() {
        std::env::set_var("GENL_CONTROL_DEBUG_LEVEL", "2");
        std::env::set_var("GENL_CONTROL_FAMILY_NAME", "envfam");
        std::env::set_var("GENL_CONTROL_SOCKET_PATH", "/tmp/envfam.sock");

        let config = ControlConfig::from_env().unwrap();
        assert_eq!(config.module.debug_level, 2);
        assert_eq!(config.family.name, "envfam");
        assert_eq!(config.server.socket_path, "/tmp/envfam.sock");

        std::env::set_var("GENL_CONTROL_DEBUG_LEVEL", "loud");
        assert!(matches!(
            ControlConfig::from_env(),
            Err(ProtocolError::ConfigError(_))
        ));

        std::env::remove_var("GENL_CONTROL_DEBUG_LEVEL");
        std::env::remove_var("GENL_CONTROL_FAMILY_NAME");
        std::env::remove_var("GENL_CONTROL_SOCKET_PATH");
    }

    #[test]
    fn test_check_name() {
        assert!(check_name("mod", constants::ERR_FAMILY_NAME_LONG).is_ok());
        assert!(check_name("", constants::ERR_FAMILY_NAME_LONG).is_err());
        assert!(check_name(&"n".repeat(MAX_NAME_LEN + 1), constants::ERR_FAMILY_NAME_LONG).is_err());
    }
}
