//! Structured logging setup.
//!
//! One `tracing-subscriber` fmt layer writing to stderr, in the format chosen
//! by `application.log_format`. `RUST_LOG` takes precedence over the
//! configured level. Stdout stays free for command output such as the CSV
//! written by `ev_logger parse`.
//!
//! Interrupt-context code only emits `trace!` events; everything user-facing
//! comes from the storage consumer on the main loop.
//!
//! # Example
//! ```no_run
//! use ev_logger::{config::LoggerConfig, tracing_config};
//! use tracing::info;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = LoggerConfig::load()?;
//! tracing_config::init_from_config(&config)?;
//! info!("logger started");
//! # Ok(())
//! # }
//! ```

use std::io::IsTerminal;
use std::str::FromStr;

use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use crate::config::LoggerConfig;
use crate::error::{AppResult, LoggerError};

/// Log line format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Multi-line, colored when stderr is a terminal
    Pretty,
    /// Single line per event
    Compact,
    /// JSON lines, for log collection
    Json,
}

impl FromStr for OutputFormat {
    type Err = LoggerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(OutputFormat::Pretty),
            "compact" => Ok(OutputFormat::Compact),
            "json" => Ok(OutputFormat::Json),
            other => Err(LoggerError::Configuration(format!(
                "Invalid log format '{other}'. Must be one of: pretty, compact, json"
            ))),
        }
    }
}

/// Subscriber settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TracingConfig {
    /// Default level when `RUST_LOG` is unset
    pub level: Level,
    /// Line format
    pub format: OutputFormat,
}

impl TracingConfig {
    /// Level and format from the `application` section.
    pub fn from_logger_config(config: &LoggerConfig) -> AppResult<Self> {
        Ok(Self {
            level: parse_log_level(&config.application.log_level)?,
            format: config.application.log_format.parse()?,
        })
    }

    /// Replace the output format.
    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }
}

/// Initialize tracing from the logger configuration.
pub fn init_from_config(config: &LoggerConfig) -> AppResult<()> {
    init(TracingConfig::from_logger_config(config)?)
}

/// Install the global subscriber.
///
/// Returns `Ok(())` if one is already installed.
pub fn init(config: TracingConfig) -> AppResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str().to_lowercase()));

    let layer = match config.format {
        OutputFormat::Pretty => fmt::layer()
            .with_writer(std::io::stderr)
            .pretty()
            .with_ansi(std::io::stderr().is_terminal())
            .boxed(),
        OutputFormat::Compact => fmt::layer()
            .with_writer(std::io::stderr)
            .compact()
            .with_ansi(false)
            .boxed(),
        OutputFormat::Json => fmt::layer().with_writer(std::io::stderr).json().boxed(),
    };

    tracing_subscriber::registry()
        .with(layer.with_filter(env_filter))
        .try_init()
        .or_else(|e| {
            if e.to_string().contains("a global default trace dispatcher has already been set") {
                Ok(())
            } else {
                Err(LoggerError::Configuration(format!(
                    "Failed to initialize tracing: {e}"
                )))
            }
        })
}

/// Parse log level string into tracing Level
pub fn parse_log_level(level: &str) -> AppResult<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(LoggerError::Configuration(format!(
            "Invalid log level '{level}'. Must be one of: trace, debug, info, warn, error"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert!(matches!(parse_log_level("trace"), Ok(Level::TRACE)));
        assert!(matches!(parse_log_level("Debug"), Ok(Level::DEBUG)));
        assert!(parse_log_level("invalid").is_err());
    }

    #[test]
    fn test_settings_follow_application_section() {
        let mut config = LoggerConfig::default();
        config.application.log_level = "debug".to_string();
        config.application.log_format = "JSON".to_string();

        let settings = TracingConfig::from_logger_config(&config).unwrap();
        assert_eq!(settings.level, Level::DEBUG);
        assert_eq!(settings.format, OutputFormat::Json);

        let settings = settings.with_format(OutputFormat::Pretty);
        assert_eq!(settings.format, OutputFormat::Pretty);
    }

    #[test]
    fn test_unknown_format_is_rejected() {
        let mut config = LoggerConfig::default();
        config.application.log_format = "xml".to_string();
        assert!(TracingConfig::from_logger_config(&config).is_err());
        assert!(config.validate().is_err());
    }
}
