//! Telemetry
//!
//! Log subscriber setup.

pub mod logging;

pub use logging::{LogFormat, LogLevel, LoggingConfig, ENV_LOG_FORMAT};
