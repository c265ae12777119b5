//! Custom error types for the logger.
//!
//! `LoggerError` is the crate-level error used by configuration loading and
//! component construction. `StorageError` is what every persistent-storage
//! collaborator returns; the storage consumer recovers from all of its
//! variants with fixed-delay retries, so none of them is fatal to a session.
//!
//! Errors raised in interrupt context never travel through these types. The
//! sample scheduler and the acquisition state machines record flags and
//! counters instead, and the main loop decides what to show the operator.

use crate::data::ring_buffer::BufferError;
use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, LoggerError>;

#[derive(Error, Debug)]
pub enum LoggerError {
    #[error("Configuration error: {0}")]
    Config(#[from] Box<figment::Error>),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Ring buffer error: {0}")]
    Buffer(#[from] BufferError),

    #[error("Invalid ring buffer capacity {0}: must be a non-zero power of two")]
    InvalidCapacity(usize),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Simulation error: {0}")]
    Simulation(String),
}

impl From<figment::Error> for LoggerError {
    fn from(value: figment::Error) -> Self {
        LoggerError::Config(Box::new(value))
    }
}

/// Failure reported by a [`PersistentFile`](crate::hardware::capabilities::PersistentFile)
/// collaborator.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("no storage medium present")]
    NoMedium,

    #[error("volume not mounted")]
    NotMounted,

    #[error("invalid file handle")]
    InvalidHandle,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("volume full")]
    DiskFull,

    #[error("short write: {written} of {requested} bytes")]
    ShortWrite { requested: usize, written: usize },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("device error: {0}")]
    Device(String),
}

/// The serial link could not accept a byte (transmitter still busy).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("serial link busy")]
pub struct SerialBusy;
