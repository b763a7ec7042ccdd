//! Configuration loading traits and types.
//!
//! This module provides the standard way to load the supervisor's TOML
//! service configuration and the schema of that file.
//!
//! # Usage
//!
//! ```rust,no_run
//! use curtain_common::config::{ConfigLoader, ConfigError, GuardConfig};
//! use std::path::Path;
//!
//! fn main() -> Result<(), ConfigError> {
//!     let config = GuardConfig::load(Path::new("curtain.toml"))?;
//!     config.validate()?;
//!     println!("Service: {}", config.shared.service_name);
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::actuator::ActuatorId;
use crate::consts::{
    DEFAULT_ACTUATOR_IDS, DEFAULT_CONFIRM_WAIT_MS, DEFAULT_POLL_PERIOD_MS, DEFAULT_STORE_PATH,
    MAX_TIMING_MS, SERVICE_NAME,
};

/// Error type for configuration loading operations.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at specified path.
    #[error("Configuration file not found")]
    FileNotFound,

    /// TOML parsing failed.
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    /// Semantic validation failed.
    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

/// Log level for application logging.
///
/// Uses lowercase serde values for TOML compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Most verbose, detailed tracing information.
    Trace,
    /// Debug information useful during development.
    Debug,
    /// General information about application operation.
    #[default]
    Info,
    /// Warning messages for potentially problematic situations.
    Warn,
    /// Error messages for serious problems.
    Error,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub const fn as_directive(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Common configuration fields.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// log_level = "debug"
/// service_name = "curtain-guard-cell-02"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedConfig {
    /// Logging verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Application instance identifier.
    pub service_name: String,
}

impl Default for SharedConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            service_name: SERVICE_NAME.to_string(),
        }
    }
}

impl SharedConfig {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if `service_name` is empty.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.service_name.is_empty() {
            return Err(ConfigError::ValidationError(
                "service_name cannot be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Evaluator timing (`[monitor]`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MonitorConfig {
    /// Period between evaluator cycles [ms].
    #[serde(default = "default_poll_period_ms")]
    pub poll_period_ms: u64,
    /// Wait after a pause/resume command before re-checking run mode [ms].
    #[serde(default = "default_confirm_wait_ms")]
    pub confirm_wait_ms: u64,
}

fn default_poll_period_ms() -> u64 {
    DEFAULT_POLL_PERIOD_MS
}

fn default_confirm_wait_ms() -> u64 {
    DEFAULT_CONFIRM_WAIT_MS
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            poll_period_ms: DEFAULT_POLL_PERIOD_MS,
            confirm_wait_ms: DEFAULT_CONFIRM_WAIT_MS,
        }
    }
}

impl MonitorConfig {
    /// Evaluator poll period.
    pub const fn poll_period(&self) -> Duration {
        Duration::from_millis(self.poll_period_ms)
    }

    /// Actuation confirmation wait.
    pub const fn confirm_wait(&self) -> Duration {
        Duration::from_millis(self.confirm_wait_ms)
    }
}

/// Managed actuators (`[actuators]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ActuatorsConfig {
    /// Ids of the actuators this supervisor pauses and resumes.
    #[serde(default = "default_actuator_ids")]
    pub ids: Vec<ActuatorId>,
}

fn default_actuator_ids() -> Vec<ActuatorId> {
    DEFAULT_ACTUATOR_IDS.iter().copied().map(ActuatorId).collect()
}

impl Default for ActuatorsConfig {
    fn default() -> Self {
        Self {
            ids: default_actuator_ids(),
        }
    }
}

/// Durable store location (`[store]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StoreConfig {
    /// Path of the JSON file holding entries and the limited speed.
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_store_path() -> PathBuf {
    PathBuf::from(DEFAULT_STORE_PATH)
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

/// Complete service configuration (`curtain.toml`).
///
/// Every section is optional.
///
/// # TOML Example
///
/// ```toml
/// [shared]
/// service_name = "curtain-guard"
///
/// [monitor]
/// poll_period_ms = 50
/// confirm_wait_ms = 200
///
/// [actuators]
/// ids = [1, 2]
///
/// [store]
/// path = "curtain_config/curtain_safety_config.json"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct GuardConfig {
    #[serde(default)]
    pub shared: SharedConfig,
    #[serde(default)]
    pub monitor: MonitorConfig,
    #[serde(default)]
    pub actuators: ActuatorsConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl GuardConfig {
    /// Validate all sections.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ValidationError` if:
    /// - `service_name` is empty
    /// - `poll_period_ms` is outside `1..=10000`
    /// - `confirm_wait_ms` exceeds 10000
    /// - the actuator list is empty or has duplicates
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.shared.validate()?;

        if self.monitor.poll_period_ms == 0 || self.monitor.poll_period_ms > MAX_TIMING_MS {
            return Err(ConfigError::ValidationError(format!(
                "poll_period_ms {} out of range 1..={MAX_TIMING_MS}",
                self.monitor.poll_period_ms
            )));
        }
        if self.monitor.confirm_wait_ms > MAX_TIMING_MS {
            return Err(ConfigError::ValidationError(format!(
                "confirm_wait_ms {} exceeds {MAX_TIMING_MS}",
                self.monitor.confirm_wait_ms
            )));
        }

        if self.actuators.ids.is_empty() {
            return Err(ConfigError::ValidationError(
                "actuators.ids cannot be empty".to_string(),
            ));
        }
        let mut seen = HashSet::new();
        for id in &self.actuators.ids {
            if !seen.insert(id) {
                return Err(ConfigError::ValidationError(format!(
                    "duplicate actuator id {id}"
                )));
            }
        }
        Ok(())
    }
}

/// Trait for loading configuration from TOML files.
///
/// Provides a default implementation that works with any type
/// implementing `serde::de::DeserializeOwned`.
///
/// # Contract
///
/// - Returns `ConfigError::FileNotFound` if the file does not exist
/// - Returns `ConfigError::ParseError` if TOML syntax is invalid
pub trait ConfigLoader: Sized + serde::de::DeserializeOwned {
    /// Load configuration from a TOML file.
    fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::FileNotFound
            } else {
                ConfigError::ParseError(e.to_string())
            }
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError(e.to_string()))
    }
}

// Blanket implementation for all types that implement DeserializeOwned.
impl<T: serde::de::DeserializeOwned> ConfigLoader for T {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_log_level_default() {
        assert_eq!(LogLevel::default(), LogLevel::Info);
    }

    #[test]
    fn test_log_level_deserialization() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct TestWrapper {
            level: LogLevel,
        }

        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"trace\"")
                .unwrap()
                .level,
            LogLevel::Trace
        );
        assert_eq!(
            toml::from_str::<TestWrapper>("level = \"warn\"")
                .unwrap()
                .level,
            LogLevel::Warn
        );
        assert_eq!(LogLevel::Debug.as_directive(), "debug");
    }

    #[test]
    fn test_shared_config_validation_empty_service_name() {
        let config = SharedConfig {
            log_level: LogLevel::Info,
            service_name: "".to_string(),
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_config_loader_file_not_found() {
        let result = GuardConfig::load(Path::new("/nonexistent/path/curtain.toml"));
        assert!(matches!(result, Err(ConfigError::FileNotFound)));
    }

    #[test]
    fn test_config_loader_parse_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "invalid toml {{{{").unwrap();

        let result = GuardConfig::load(file.path());
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }

    #[test]
    fn test_empty_file_yields_defaults() {
        let file = NamedTempFile::new().unwrap();
        let config = GuardConfig::load(file.path()).unwrap();

        assert_eq!(config.shared.service_name, SERVICE_NAME);
        assert_eq!(config.monitor, MonitorConfig::default());
        assert_eq!(config.actuators.ids, vec![ActuatorId(1), ActuatorId(2)]);
        assert_eq!(config.store.path, PathBuf::from(DEFAULT_STORE_PATH));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_full_config_loads() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[shared]
log_level = "debug"
service_name = "cell-7"

[monitor]
poll_period_ms = 20
confirm_wait_ms = 0

[actuators]
ids = [3]

[store]
path = "/var/lib/curtain/store.json"
"#
        )
        .unwrap();
        file.flush().unwrap();

        let config = GuardConfig::load(file.path()).unwrap();
        assert_eq!(config.shared.log_level, LogLevel::Debug);
        assert_eq!(config.monitor.poll_period(), Duration::from_millis(20));
        assert_eq!(config.monitor.confirm_wait(), Duration::ZERO);
        assert_eq!(config.actuators.ids, vec![ActuatorId(3)]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_unknown_field_rejected() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "[monitor]\npoll_rate = 5").unwrap();
        assert!(matches!(
            GuardConfig::load(file.path()),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_validation_bounds() {
        let mut config = GuardConfig::default();
        config.monitor.poll_period_ms = 0;
        assert!(config.validate().is_err());

        let mut config = GuardConfig::default();
        config.monitor.confirm_wait_ms = MAX_TIMING_MS + 1;
        assert!(config.validate().is_err());

        let mut config = GuardConfig::default();
        config.actuators.ids.clear();
        assert!(config.validate().is_err());

        let mut config = GuardConfig::default();
        config.actuators.ids = vec![ActuatorId(1), ActuatorId(1)];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(msg)) if msg.contains("duplicate")
        ));
    }
}
