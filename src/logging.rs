//! Tracing initialization
//!
//! `RUST_LOG` wins when set; otherwise the configured
//! `application.log_level` applies. Logs go to stderr so the calibration
//! report printed on stdout can be redirected on its own.

use tracing_subscriber::EnvFilter;

use crate::config::ToolConfig;
use crate::error::{AppResult, CalError};

/// Install the global tracing subscriber from configuration
pub fn init_from_config(config: &ToolConfig) -> AppResult<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.application.log_level))
        .map_err(|e| CalError::ConfigValidation(format!("Invalid log filter: {}", e)))?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| CalError::ConfigValidation(format!("Tracing already initialized: {}", e)))
}
