//! Tool configuration using Figment
//!
//! Configuration is loaded from, in order of increasing precedence:
//! 1. Built-in defaults
//! 2. TOML configuration file (default: `config/hp3478a.toml`)
//! 3. Environment variables prefixed with `HP3478A_`
//!
//! A missing configuration file is not an error; the defaults apply.
//!
//! # Environment Variable Overrides
//!
//! Nested keys are separated by a double underscore:
//!
//! ```text
//! HP3478A_SERIAL__PORT=/dev/ttyUSB1
//! HP3478A_ADAPTER__TIMEOUT_MS=1000
//! HP3478A_APPLICATION__LOG_LEVEL=debug
//! ```
//!
//! # Example
//!
//! ```no_run
//! use hp3478a_cal::config::ToolConfig;
//!
//! fn main() -> hp3478a_cal::error::AppResult<()> {
//!     let config = ToolConfig::load_from("config/hp3478a.toml")?;
//!     println!("Port: {}", config.serial.port);
//!     Ok(())
//! }
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AppResult, CalError};

/// Default configuration file location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/hp3478a.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "HP3478A_";

/// Largest read timeout the adapter accepts for `++read_tmo_ms`.
pub const MAX_ADAPTER_TIMEOUT_MS: u64 = 3000;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Serial transport settings
    #[serde(default)]
    pub serial: SerialConfig,
    /// GPIB adapter settings
    #[serde(default)]
    pub adapter: AdapterConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Serial port parameters for the USB-to-GPIB adapter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate
    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,
    /// Data bits (5 to 8)
    #[serde(default = "default_data_bits")]
    pub data_bits: u8,
    /// Stop bits (1 or 2)
    #[serde(default = "default_stop_bits")]
    pub stop_bits: u8,
    /// Parity setting
    #[serde(default)]
    pub parity: Parity,
    /// Flow control setting
    #[serde(default)]
    pub flow_control: FlowControl,
}

/// Parity modes for serial communication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Odd,
    Even,
}

/// Flow control modes for serial communication
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowControl {
    #[default]
    None,
    Software,
    Hardware,
}

/// GPIB adapter behaviour
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdapterConfig {
    /// Substring that must appear in the adapter's `++ver` response
    #[serde(default = "default_version")]
    pub version: String,
    /// Response timeout in milliseconds, also programmed into the adapter
    /// as `++read_tmo_ms`; must be 1 to 3000
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl AdapterConfig {
    /// Response timeout as a `Duration`
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_log_level() -> String {
    "info".to_string()
}

fn default_port() -> String {
    if cfg!(windows) {
        "COM1".to_string()
    } else {
        "/dev/ttyUSB0".to_string()
    }
}

fn default_baud_rate() -> u32 {
    115200
}

fn default_data_bits() -> u8 {
    8
}

fn default_stop_bits() -> u8 {
    1
}

fn default_version() -> String {
    "GPIB-USB".to_string()
}

fn default_timeout_ms() -> u64 {
    500
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud_rate: default_baud_rate(),
            data_bits: default_data_bits(),
            stop_bits: default_stop_bits(),
            parity: Parity::default(),
            flow_control: FlowControl::default(),
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl ToolConfig {
    /// Load configuration from the default location and environment
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// Environment variables still take precedence over the file. The
    /// result is validated before it is returned.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Serial port name is not empty and baud rate is non-zero
    /// - Data bits are 5-8 and stop bits are 1 or 2
    /// - Adapter version substring is not empty
    /// - Adapter timeout is within what `++read_tmo_ms` accepts
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(CalError::ConfigValidation(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.serial.port.is_empty() {
            return Err(CalError::ConfigValidation(
                "Serial 'port' cannot be empty".to_string(),
            ));
        }

        if self.serial.baud_rate == 0 {
            return Err(CalError::ConfigValidation(
                "Serial 'baud_rate' must be greater than zero".to_string(),
            ));
        }

        if !(5..=8).contains(&self.serial.data_bits) {
            return Err(CalError::ConfigValidation(format!(
                "Invalid data_bits {}. Must be 5-8",
                self.serial.data_bits
            )));
        }

        if !matches!(self.serial.stop_bits, 1 | 2) {
            return Err(CalError::ConfigValidation(format!(
                "Invalid stop_bits {}. Must be 1 or 2",
                self.serial.stop_bits
            )));
        }

        if self.adapter.version.is_empty() {
            return Err(CalError::ConfigValidation(
                "Adapter 'version' substring cannot be empty".to_string(),
            ));
        }

        if !(1..=MAX_ADAPTER_TIMEOUT_MS).contains(&self.adapter.timeout_ms) {
            return Err(CalError::ConfigValidation(format!(
                "Invalid timeout_ms {}. Must be 1-{}",
                self.adapter.timeout_ms, MAX_ADAPTER_TIMEOUT_MS
            )));
        }

        Ok(())
    }
}
