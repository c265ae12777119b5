//! # EV Logger Core Library
//!
//! Fixed-rate data acquisition and storage for a vehicle/battery logger. A
//! timer interrupt samples seven analog channels and a three-axis
//! accelerometer every period, appends one binary record per cycle to a
//! lock-free ring buffer, and a cooperative main loop drains the ring to a
//! file on removable storage in whole storage blocks.
//!
//! ## Crate Structure
//!
//! - **`acquisition`**: interrupt-context producers. `AnalogAcquisition` starts
//!   converter scans, `AccelAcquisitionFsm` walks the X/Y/Z register reads one
//!   serial completion at a time, and `SampleScheduler` hands each finished
//!   cycle to the ring buffer on the next tick.
//! - **`data`**: the two-slot sample mailbox, the SPSC byte ring and the
//!   on-disk record layout (plus the desktop-side decoder and CSV export).
//! - **`logger`**: the shared capture flags, the debounced logging button
//!   state machine, the storage consumer and the status screen.
//! - **`hardware`**: capability traits for every board collaborator, with
//!   host implementations and instrumented mocks.
//! - **`platform`**: a tokio-based host simulation wiring everything together.
//! - **`config`**, **`error`**, **`tracing_config`**: configuration loading,
//!   error types and structured logging setup.
//!
//! ## Contexts
//!
//! Interrupt handlers never block and never return errors; they record flags
//! and counters. Only the storage consumer waits, and only on one bounded
//! filesystem operation at a time.

pub mod acquisition;
pub mod config;
pub mod data;
pub mod error;
pub mod hardware;
pub mod logger;
pub mod platform;
pub mod tracing_config;

pub use config::LoggerConfig;
pub use error::{AppResult, LoggerError};
