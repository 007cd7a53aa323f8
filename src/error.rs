//! Custom error types for the calibration tool.
//!
//! `CalError` is the single error type shared by the adapter session, the
//! calibration codec and the read/write workflows. It is built with
//! `thiserror`, and `#[from]` conversions let `?` lift I/O and configuration
//! errors without boilerplate.
//!
//! ## Error Hierarchy
//!
//! - **`Configuration`**: the GPIB adapter did not acknowledge an initialization
//!   directive, or a session parameter (GPIB address) is out of range. Fatal
//!   before any instrument I/O happens.
//! - **`Communication`**: the instrument did not answer the status probe.
//! - **`Transfer`**: one nibble of the 256-step SRAM transfer was missing or
//!   failed read-back verification. The whole transfer is aborted.
//! - **`Validation`**: checksum failure where it is fatal (before a write).
//! - **`Format`**: a codec function got a buffer of the wrong length. This is
//!   a programming error and is never recovered from.
//! - **`Io`**: any transport or file error that is not a read timeout. Read
//!   timeouts are absorbed by the session and never reach this type.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, CalError>;

#[derive(Error, Debug)]
pub enum CalError {
    #[error("Adapter configuration error: {0}")]
    Configuration(String),

    #[error("Instrument communication failure: {0}")]
    Communication(String),

    #[error("Transfer failed at SRAM address {address}: {reason}")]
    Transfer { address: u8, reason: String },

    #[error("Calibration data validation failed: {0}")]
    Validation(String),

    #[error("Invalid buffer length: expected {expected} bytes, got {actual}")]
    Format { expected: usize, actual: usize },

    #[error("Calibration file has {len} bytes, expected exactly 256")]
    FileSize { len: usize },

    #[error("Configuration load error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    ConfigValidation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    #[error("Operation aborted by user")]
    Aborted,
}
