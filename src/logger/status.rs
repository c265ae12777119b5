//! Status screen layout.
//!
//! ```text
//! row 0  === EV LOGGER ===
//! row 1  Logging: ON
//! row 2  Buffer: 12%
//! row 3  File: 1536kb
//! row 4  120/1907MB (6%)
//! row 7  <debug line>
//! ```

use crate::hardware::capabilities::{StatusDisplay, VolumeSpace};

/// Banner row.
pub const TITLE_ROW: u8 = 0;
/// `Logging: ON|OFF`, owned by the control FSM.
pub const STATE_ROW: u8 = 1;
/// Ring buffer fill percentage.
pub const BUFFER_ROW: u8 = 2;
/// Size of the open session file.
pub const FILE_ROW: u8 = 3;
/// Volume usage.
pub const VOLUME_ROW: u8 = 4;
/// Storage errors and overflow warnings.
pub const DEBUG_ROW: u8 = 7;

/// Banner drawn at startup.
pub const TITLE: &str = "=== EV LOGGER ===";

const BYTES_PER_KB: u64 = 1_000;
const BYTES_PER_MB: u64 = 1_000_000;

/// Replace the whole of `row` with `text`.
pub fn show_line(display: &dyn StatusDisplay, row: u8, text: &str) {
    display.clear_line(row);
    display.draw_text(row, 0, text);
}

/// State row text.
pub fn logging_line(running: bool) -> String {
    format!("Logging: {}", if running { "ON" } else { "OFF" })
}

/// Buffer row text, e.g. `Buffer: 42%`.
pub fn buffer_line(fill_percent: u8) -> String {
    format!("Buffer: {fill_percent}%")
}

/// File row text in decimal kilobytes, rounded down.
pub fn file_line(size_bytes: u64) -> String {
    format!("File: {}kb", size_bytes / BYTES_PER_KB)
}

/// Volume row text: used and total megabytes with the used percentage.
pub fn volume_line(space: &VolumeSpace) -> String {
    format!(
        "{}/{}MB ({}%)",
        space.used_bytes() / BYTES_PER_MB,
        space.total_bytes / BYTES_PER_MB,
        space.used_percent()
    )
}
