//! In-memory character display.
//!
//! Holds the screen as text rows (the panel is 8 rows of 17 characters) and
//! mirrors every row change to the `display` tracing target, so a host run
//! shows the same status lines an operator would see on the device.

use parking_lot::Mutex;
use tracing::info;

use crate::hardware::capabilities::StatusDisplay;

/// Rows on the panel.
pub const DISPLAY_ROWS: usize = 8;
/// Characters per row.
pub const DISPLAY_COLS: usize = 17;

/// Text-backed [`StatusDisplay`].
pub struct TextDisplay {
    rows: Mutex<Vec<String>>,
    echo: bool,
}

impl Default for TextDisplay {
    fn default() -> Self {
        Self::new()
    }
}

impl TextDisplay {
    /// Blank display that echoes changes to tracing.
    pub fn new() -> Self {
        Self {
            rows: Mutex::new(vec![String::new(); DISPLAY_ROWS]),
            echo: true,
        }
    }

    /// Blank display that stays quiet (tests).
    pub fn silent() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    /// Current text of `row`, trailing blanks trimmed.
    pub fn row(&self, row: u8) -> String {
        self.rows
            .lock()
            .get(usize::from(row))
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default()
    }

    /// Every row, trailing blanks trimmed.
    pub fn snapshot(&self) -> Vec<String> {
        self.rows
            .lock()
            .iter()
            .map(|text| text.trim_end().to_string())
            .collect()
    }
}

impl StatusDisplay for TextDisplay {
    fn clear_line(&self, row: u8) {
        if let Some(line) = self.rows.lock().get_mut(usize::from(row)) {
            line.clear();
        }
    }

    fn draw_text(&self, row: u8, col: u8, text: &str) {
        let col = usize::from(col);
        if col >= DISPLAY_COLS {
            return;
        }

        let rendered = {
            let mut rows = self.rows.lock();
            let Some(line) = rows.get_mut(usize::from(row)) else {
                return;
            };

            let mut chars: Vec<char> = line.chars().collect();
            if chars.len() < col {
                chars.resize(col, ' ');
            }
            for (offset, ch) in text.chars().take(DISPLAY_COLS - col).enumerate() {
                match chars.get_mut(col + offset) {
                    Some(slot) => *slot = ch,
                    None => chars.push(ch),
                }
            }
            *line = chars.into_iter().collect();
            line.trim_end().to_string()
        };

        if self.echo {
            info!(target: "display", row, text = %rendered);
        }
    }
}
