//! Configuration file support for linecardchk
//!
//! Loads and validates configuration from a TOML file.
//! Default location: /etc/sonic/linecardchk.toml
//!
//! Every field has a default, so a missing file or a partial file is fine.

use crate::error::{LinecardError, Result};
use crate::shell::VSH_CMD;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/sonic/linecardchk.toml";

/// State file and history log locations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Last counter snapshot
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Append-only history log
    #[serde(default = "default_history_log")]
    pub history_log: PathBuf,
}

/// Device access configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Command prefix that runs one CLI command
    #[serde(default = "default_cli_prefix")]
    pub cli_prefix: String,

    /// Model prefix of the monitored modules in `show module`
    #[serde(default = "default_module_model")]
    pub module_model: String,

    /// Hardware error counter to track
    #[serde(default = "default_counter_name")]
    pub counter_name: String,
}

/// Where alerts are delivered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSinkKind {
    /// System log via `logger`
    Syslog,
    /// Process log only
    Log,
}

/// Alert delivery configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    #[serde(default = "default_sink")]
    pub sink: AlertSinkKind,

    /// Syslog facility
    #[serde(default = "default_facility")]
    pub facility: String,

    /// Syslog tag
    #[serde(default = "default_tag")]
    pub tag: String,
}

/// Complete linecardchk configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckerConfig {
    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub device: DeviceConfig,

    #[serde(default)]
    pub alert: AlertConfig,
}

// Default functions
fn default_state_file() -> PathBuf {
    PathBuf::from("/bootflash/error_stats.json")
}

fn default_history_log() -> PathBuf {
    PathBuf::from("/bootflash/error_stats.log")
}

fn default_cli_prefix() -> String {
    VSH_CMD.to_string()
}

fn default_module_model() -> String {
    "N7K-M132XP".to_string()
}

fn default_counter_name() -> String {
    "mstat_rx_pkts_bad_crc".to_string()
}

fn default_sink() -> AlertSinkKind {
    AlertSinkKind::Syslog
}

fn default_facility() -> String {
    "local0".to_string()
}

fn default_tag() -> String {
    "linecardchk".to_string()
}

// Default implementations
impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            history_log: default_history_log(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            cli_prefix: default_cli_prefix(),
            module_model: default_module_model(),
            counter_name: default_counter_name(),
        }
    }
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            sink: default_sink(),
            facility: default_facility(),
            tag: default_tag(),
        }
    }
}

impl CheckerConfig {
    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| {
                LinecardError::Configuration(format!(
                    "Failed to parse config file {}: {}",
                    path.display(),
                    e
                ))
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %path.display(), "Config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(LinecardError::Configuration(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.paths.state_file.as_os_str().is_empty() {
            return Err(LinecardError::Configuration(
                "state_file must not be empty".to_string(),
            ));
        }

        if self.paths.history_log.as_os_str().is_empty() {
            return Err(LinecardError::Configuration(
                "history_log must not be empty".to_string(),
            ));
        }

        if self.paths.state_file == self.paths.history_log {
            return Err(LinecardError::Configuration(
                "state_file and history_log must differ".to_string(),
            ));
        }

        if self.device.module_model.trim().is_empty() {
            return Err(LinecardError::Configuration(
                "module_model must not be empty".to_string(),
            ));
        }

        if self.device.counter_name.split_whitespace().count() != 1 {
            return Err(LinecardError::Configuration(
                "counter_name must be a single token".to_string(),
            ));
        }

        Ok(())
    }
}
