//! Collaborator Capabilities
//!
//! The acquisition core never touches peripheral registers. Everything it needs
//! from the board is expressed as a small capability trait:
//!
//! - `AnalogConversionEngine` - multi-channel converter scan with block-transfer completion
//! - `SerialTransferEngine` - byte-wise link to the accelerometer
//! - `PersistentFile` - filesystem on removable block storage
//! - `StatusDisplay` - character display for operator feedback
//! - `MonotonicClock` - wrapping millisecond counter
//! - `SampleTimer` - the fixed-rate timer that fires the sample scheduler
//!
//! # Design Philosophy
//!
//! Interrupt-side capabilities (`AnalogConversionEngine`, `SerialTransferEngine`)
//! are synchronous and take `&mut self`: they are owned by exactly one component
//! and must return in bounded time. Completion is never awaited; the platform
//! delivers it later as a separate event.
//!
//! `PersistentFile` is the only async capability. It is driven from the main
//! loop, every call may fail, and the caller owns all retry policy.
//!
//! `StatusDisplay`, `MonotonicClock` and `SampleTimer` are shared between
//! contexts, so they take `&self` and use interior mutability.

use async_trait::async_trait;

use crate::error::{SerialBusy, StorageError};

/// Capability: Multi-Channel Analog Conversion
///
/// # Contract
/// - `configure` runs once at startup and fixes the physical scan order
/// - `trigger` starts one scan and returns immediately
/// - Scan results arrive later through the platform's block-transfer
///   completion, which lands them in the active sample slot
pub trait AnalogConversionEngine: Send {
    /// Program the scan sequence.
    ///
    /// # Arguments
    /// * `channels` - Physical input numbers, in the order results are stored
    fn configure(&mut self, channels: &[u8]);

    /// Start one conversion scan (non-blocking).
    fn trigger(&mut self);
}

/// Capability: Byte-Wise Serial Exchange
///
/// One `send_byte` starts one register read; its completion is delivered as a
/// separate event carrying the byte read back.
pub trait SerialTransferEngine: Send {
    /// Select the device before the first byte of an exchange.
    fn begin_transaction(&mut self) {}

    /// Queue a command byte.
    ///
    /// # Returns
    /// - Ok(()) if the byte was accepted
    /// - Err(SerialBusy) if the transmitter cannot take it now
    fn send_byte(&mut self, byte: u8) -> Result<(), SerialBusy>;

    /// Deselect the device after the last byte of an exchange.
    fn end_transaction(&mut self) {}
}

/// Opaque handle to an open file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u32);

/// How a file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Read and write, creating the file or truncating an existing one.
    ReadWriteCreateAlways,
    /// Read and write, creating the file if missing and appending otherwise.
    ReadWriteAppend,
}

/// Capacity figures for the mounted volume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VolumeSpace {
    pub total_bytes: u64,
    pub free_bytes: u64,
}

impl VolumeSpace {
    /// Bytes in use.
    pub fn used_bytes(&self) -> u64 {
        self.total_bytes.saturating_sub(self.free_bytes)
    }

    /// Percentage of the volume in use, rounded down. An empty volume reports 0.
    pub fn used_percent(&self) -> u8 {
        if self.total_bytes == 0 {
            return 0;
        }
        (self.used_bytes().saturating_mul(100) / self.total_bytes).min(100) as u8
    }
}

/// Capability: Filesystem on Block Storage
///
/// # Contract
/// - Every operation may fail; none is retried internally
/// - Writes are expected in storage-block sized chunks but any length is legal
/// - `write` returns the byte count actually written (short writes are legal)
#[async_trait]
pub trait PersistentFile: Send + Sync {
    /// Whether a medium is inserted.
    ///
    /// # Default Implementation
    /// Reports the medium as always present.
    async fn card_present(&self) -> bool {
        true
    }

    /// Mount the volume.
    async fn mount(&mut self) -> Result<(), StorageError>;

    /// Open `name` in the given mode.
    async fn open(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle, StorageError>;

    /// Append bytes at the current position.
    async fn write(&mut self, handle: FileHandle, bytes: &[u8]) -> Result<usize, StorageError>;

    /// Flush cached data for the file to the medium.
    async fn sync(&mut self, handle: FileHandle) -> Result<(), StorageError>;

    /// Close the file, releasing the handle on success.
    async fn close(&mut self, handle: FileHandle) -> Result<(), StorageError>;

    /// Current size of an open file in bytes (0 for an unknown handle).
    async fn size(&self, handle: FileHandle) -> u64;

    /// Total and free space on the mounted volume.
    async fn free_space(&self) -> Result<VolumeSpace, StorageError>;

    /// Names of the files in the volume root.
    ///
    /// # Default Implementation
    /// Returns an empty listing.
    async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        Ok(Vec::new())
    }
}

/// Capability: Character Status Display
///
/// Fire-and-forget; no failure path is modelled.
pub trait StatusDisplay: Send + Sync {
    /// Blank one row.
    fn clear_line(&self, row: u8);

    /// Draw `text` starting at `(row, col)`.
    fn draw_text(&self, row: u8, col: u8, text: &str);
}

/// Capability: Monotonic Millisecond Clock
///
/// The counter wraps at `u32::MAX`; compare instants with wrapping subtraction.
pub trait MonotonicClock: Send + Sync {
    /// Milliseconds since an arbitrary epoch.
    fn now_millis(&self) -> u32;
}

/// Milliseconds from `earlier` to `now`, tolerant of one counter wrap.
pub fn elapsed_millis(now: u32, earlier: u32) -> u32 {
    now.wrapping_sub(earlier)
}

/// Capability: Fixed-Rate Sample Timer
///
/// While active, the platform calls the sample scheduler's tick handler once
/// per period. Starting or stopping takes effect before the call returns.
pub trait SampleTimer: Send + Sync {
    /// Start firing ticks.
    fn start(&self);

    /// Stop firing ticks.
    fn stop(&self);

    /// Whether ticks are currently firing.
    fn is_active(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_millis_survives_wrap() {
        assert_eq!(elapsed_millis(10, u32::MAX - 5), 16);
        assert_eq!(elapsed_millis(300, 50), 250);
    }

    #[test]
    fn persistent_file_can_be_shared_by_reference() {
        // `&self` methods are awaited across task boundaries.
        fn assert_shareable<T: Send + Sync + ?Sized>() {}
        assert_shareable::<dyn PersistentFile>();
    }

    #[test]
    fn volume_usage_percent() {
        let space = VolumeSpace {
            total_bytes: 1_000,
            free_bytes: 250,
        };
        assert_eq!(space.used_bytes(), 750);
        assert_eq!(space.used_percent(), 75);
        assert_eq!(VolumeSpace::default().used_percent(), 0);
    }
}
