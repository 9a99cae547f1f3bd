//! Structured logging to stderr.
//!
//! stdout is reserved for reports, so every layer writes to stderr.

use crate::{LogFormat, TelemetryConfig, TelemetryError};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Initialize the logging subsystem.
///
/// Sets up tracing-subscriber with either JSON or pretty format,
/// respecting the configured log level.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    // Build the env filter from config or RUST_LOG
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    match config.log_format {
        LogFormat::Json => init_json_logging(filter),
        LogFormat::Pretty => init_pretty_logging(filter),
    }
}

fn init_json_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let json_layer = fmt::layer()
        .json()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_current_span(true)
        .with_span_list(false)
        .with_file(false)
        .with_line_number(false)
        .flatten_event(true)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(json_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

fn init_pretty_logging(filter: EnvFilter) -> Result<(), TelemetryError> {
    let pretty_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(filter);

    tracing_subscriber::registry()
        .with(pretty_layer)
        .try_init()
        .map_err(|e: tracing_subscriber::util::TryInitError| {
            TelemetryError::LoggingInit(e.to_string())
        })
}

/// Standard log event names.
pub mod events {
    /// A specification could not be read or parsed.
    pub const SPEC_LOAD_FAILED: &str = "spec_load_failed";

    /// Two specifications are about to be compared.
    pub const COMPARISON_STARTED: &str = "comparison_started";

    /// A comparison finished with an overall verdict.
    pub const COMPARISON_COMPLETED: &str = "comparison_completed";

    /// A report file was written.
    pub const REPORT_WRITTEN: &str = "report_written";

    /// A report file could not be written.
    pub const REPORT_WRITE_FAILED: &str = "report_write_failed";
}

/// Helper macros for structured logging with standard fields.
///
/// These wrap the tracing macros to ensure consistent field naming.
#[macro_export]
macro_rules! log_spec_load_failed {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::SPEC_LOAD_FAILED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_comparison_started {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::COMPARISON_STARTED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_comparison_completed {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::COMPARISON_COMPLETED,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_report_written {
    ($($field:tt)*) => {
        tracing::info!(
            event = $crate::logging::events::REPORT_WRITTEN,
            $($field)*
        )
    };
}

#[macro_export]
macro_rules! log_report_write_failed {
    ($($field:tt)*) => {
        tracing::error!(
            event = $crate::logging::events::REPORT_WRITE_FAILED,
            $($field)*
        )
    };
}
