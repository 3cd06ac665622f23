//! Logging
//!
//! `tracing-subscriber` setup for the skill backend. Components log through the
//! `tracing` macros; this module only installs the global subscriber.

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{ConfigurationError, SmartHomeError};

/// Environment variable selecting the output format (`pretty`, `json`, `compact`).
pub const ENV_LOG_FORMAT: &str = "SMART_HOME_LOG_FORMAT";

/// Minimum level captured when `RUST_LOG` does not say otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable, for local runs.
    Pretty,
    /// One JSON object per line, for log ingestion.
    Json,
    Compact,
}

impl LogFormat {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "json" => Some(Self::Json),
            "compact" => Some(Self::Compact),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    /// Include the module target in each line.
    pub include_target: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Json,
            include_target: true,
        }
    }
}

impl LoggingConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default configuration with the format taken from `SMART_HOME_LOG_FORMAT`.
    pub fn from_env() -> Result<Self, SmartHomeError> {
        let mut config = Self::default();
        if let Ok(value) = std::env::var(ENV_LOG_FORMAT) {
            config.format = LogFormat::parse(&value).ok_or_else(|| {
                SmartHomeError::Configuration(ConfigurationError::InvalidConfig {
                    message: format!(
                        "{} must be pretty, json or compact, got {:?}",
                        ENV_LOG_FORMAT, value
                    ),
                })
            })?;
        }
        Ok(config)
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_target(mut self, include: bool) -> Self {
        self.include_target = include;
        self
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::from(self.level).into())
            .from_env_lossy()
    }

    /// Install the global subscriber. Call once at startup.
    ///
    /// Fails if a global subscriber is already installed.
    pub fn init(self) -> Result<(), SmartHomeError> {
        let registry = tracing_subscriber::registry().with(self.filter());

        let result = match self.format {
            LogFormat::Pretty => registry
                .with(fmt::layer().pretty().with_target(self.include_target))
                .try_init(),
            LogFormat::Json => registry
                .with(
                    fmt::layer()
                        .json()
                        .with_current_span(true)
                        .with_target(self.include_target),
                )
                .try_init(),
            LogFormat::Compact => registry
                .with(fmt::layer().compact().with_target(self.include_target))
                .try_init(),
        };

        result.map_err(|e| {
            SmartHomeError::Configuration(ConfigurationError::InvalidConfig {
                message: format!("failed to install log subscriber: {}", e),
            })
        })
    }
}
