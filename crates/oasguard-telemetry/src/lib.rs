//! Logging for the oasguard tools.
//!
//! Sets up `tracing-subscriber` with pretty or JSON output on stderr, so that
//! reports printed on stdout stay machine-readable. Standard event names and
//! helper macros live in [`logging`].
//!
//! # Usage
//!
//! ```ignore
//! use oasguard_telemetry::{LogFormat, TelemetryConfig};
//!
//! let config = TelemetryConfig::new()
//!     .with_log_level("info")
//!     .with_log_format(LogFormat::Json);
//!
//! oasguard_telemetry::init(&config)?;
//! ```

pub mod config;
pub mod logging;

pub use config::{LogFormat, TelemetryConfig};
pub use logging::events;

use thiserror::Error;

/// Telemetry errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// Failed to initialize logging.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}

/// Initialize logging with the given configuration.
///
/// Fails if a global subscriber is already installed.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)
}
