//! Logger Configuration using Figment
//!
//! Configuration is loaded from:
//! 1. `config/ev_logger.toml` (base configuration)
//! 2. Environment variables prefixed with `EV_LOGGER_`, nested with `__`
//!
//! Every field has a default, so an empty file (or no file) yields the
//! stock 1 kHz / 7-channel / 2 KiB-ring logger.
//!
//! # Example
//! ```no_run
//! use ev_logger::config::LoggerConfig;
//!
//! let config = LoggerConfig::load()?;
//! println!("Sampling at {} Hz", config.acquisition.sample_rate_hz);
//! # Ok::<(), ev_logger::error::LoggerError>(())
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::data::sample::ANALOG_CHANNELS;
use crate::error::{AppResult, LoggerError};

/// Default configuration file, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = "config/ev_logger.toml";

/// Top-level logger configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    pub application: ApplicationConfig,
    pub acquisition: AcquisitionConfig,
    pub buffer: BufferConfig,
    pub storage: StorageConfig,
    pub control: ControlConfig,
}

/// Application-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Application name
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log line format (pretty, compact, json)
    pub log_format: String,
}

/// Sampling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcquisitionConfig {
    /// Scheduler tick rate
    pub sample_rate_hz: u32,
    /// Physical converter inputs, in record order
    pub analog_channels: Vec<u8>,
}

/// Ring buffer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferConfig {
    /// Bytes; must be a power of two
    pub capacity: usize,
}

/// Storage consumer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Host directory standing in for the card (host runs only)
    pub root: PathBuf,
    pub file_stem: String,
    pub file_extension: String,
    /// Write `stem_NNNN.ext` per session instead of truncating `stem.ext`
    pub numbered_sessions: bool,
    /// Append to an existing `stem.ext` instead of truncating it
    pub append_existing: bool,
    /// Native write granularity of the medium
    pub block_size: usize,
    pub card_poll_ms: u64,
    pub mount_retry_ms: u64,
    pub open_retry_ms: u64,
    pub close_retry_ms: u64,
    pub status_interval_ms: u32,
    /// Reported volume size for the host volume
    pub volume_capacity_mb: u64,
}

/// Button handling configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControlConfig {
    pub debounce_ms: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: "EV Logger".to_string(),
            log_level: "info".to_string(),
            log_format: "compact".to_string(),
        }
    }
}

impl Default for AcquisitionConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 1_000,
            analog_channels: vec![6, 7, 12, 13, 14, 15, 5],
        }
    }
}

impl Default for BufferConfig {
    fn default() -> Self {
        Self { capacity: 2_048 }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("card"),
            file_stem: "data".to_string(),
            file_extension: "log".to_string(),
            numbered_sessions: false,
            append_existing: false,
            block_size: 512,
            card_poll_ms: 250,
            mount_retry_ms: 100,
            open_retry_ms: 500,
            close_retry_ms: 100,
            status_interval_ms: 200,
            volume_capacity_mb: 2_000,
        }
    }
}

impl Default for ControlConfig {
    fn default() -> Self {
        Self { debounce_ms: 250 }
    }
}

impl AcquisitionConfig {
    /// Scheduler tick period.
    pub fn sample_period(&self) -> Duration {
        Duration::from_nanos(1_000_000_000 / u64::from(self.sample_rate_hz.max(1)))
    }
}

impl StorageConfig {
    pub fn card_poll(&self) -> Duration {
        Duration::from_millis(self.card_poll_ms)
    }

    pub fn mount_retry(&self) -> Duration {
        Duration::from_millis(self.mount_retry_ms)
    }

    pub fn open_retry(&self) -> Duration {
        Duration::from_millis(self.open_retry_ms)
    }

    pub fn close_retry(&self) -> Duration {
        Duration::from_millis(self.close_retry_ms)
    }

    pub fn volume_capacity_bytes(&self) -> u64 {
        self.volume_capacity_mb.saturating_mul(1_000_000)
    }
}

impl LoggerConfig {
    /// Load configuration from `config/ev_logger.toml` and environment variables
    ///
    /// Environment variables override the file with prefix `EV_LOGGER_`.
    /// Example: `EV_LOGGER_STORAGE__BLOCK_SIZE=1024`
    pub fn load() -> AppResult<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let config: Self = Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed("EV_LOGGER_").split("__"))
            .extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Collects every violation into a single error message.
    pub fn validate(&self) -> AppResult<()> {
        let mut problems = Vec::new();

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.to_lowercase().as_str()) {
            problems.push(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            ));
        }

        let valid_formats = ["pretty", "compact", "json"];
        if !valid_formats.contains(&self.application.log_format.to_lowercase().as_str()) {
            problems.push(format!(
                "Invalid log_format '{}'. Must be one of: {}",
                self.application.log_format,
                valid_formats.join(", ")
            ));
        }

        if self.acquisition.sample_rate_hz == 0 {
            problems.push("sample_rate_hz must be greater than zero".to_string());
        }

        if self.acquisition.analog_channels.len() != ANALOG_CHANNELS {
            problems.push(format!(
                "analog_channels lists {} inputs, the record layout has {}",
                self.acquisition.analog_channels.len(),
                ANALOG_CHANNELS
            ));
        }

        let capacity = self.buffer.capacity;
        if capacity == 0 || !capacity.is_power_of_two() {
            problems.push(format!("buffer capacity {capacity} is not a power of two"));
        }

        let block = self.storage.block_size;
        if block == 0 || block >= capacity {
            problems.push(format!(
                "block_size {block} must be non-zero and smaller than the buffer capacity {capacity}"
            ));
        }

        if self.storage.file_stem.is_empty() {
            problems.push("file_stem must not be empty".to_string());
        }

        if self.control.debounce_ms == 0 {
            problems.push("debounce_ms must be greater than zero".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(LoggerError::Configuration(problems.join("; ")))
        }
    }

    /// Scan order as the fixed-size array the acquisition layer expects.
    pub fn analog_channel_array(&self) -> AppResult<[u8; ANALOG_CHANNELS]> {
        self.acquisition
            .analog_channels
            .as_slice()
            .try_into()
            .map_err(|_| {
                LoggerError::Configuration(format!(
                    "expected {} analog channels, found {}",
                    ANALOG_CHANNELS,
                    self.acquisition.analog_channels.len()
                ))
            })
    }
}
