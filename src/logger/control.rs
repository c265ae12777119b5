//! Logging control state machine (button interrupt handler).
//!
//! Two states, toggled by a debounced press of the logging button. The order
//! in which the running flag and the sample timer change is part of the
//! contract:
//!
//! - start: raise `running`, then start the timer, so the first tick already
//!   sees capture active
//! - stop: stop the timer, then drop `running`, so no tick runs after the
//!   flag falls

use std::sync::Arc;

use tracing::{debug, trace};

use crate::hardware::capabilities::{elapsed_millis, MonotonicClock, SampleTimer, StatusDisplay};
use crate::logger::state::RunningState;
use crate::logger::status::{logging_line, show_line, STATE_ROW};

/// Capture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingState {
    /// Sample timer stopped, no file open.
    Stopped,
    /// Sample timer firing.
    Running,
}

/// Physical buttons delivering edge events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    /// Starts and stops capture.
    Logging,
    /// Reserved; edges are accepted and ignored.
    Aux,
}

/// Debounced start/stop toggle driven by logging-button edges.
///
/// Starting raises the running flag before the timer starts; stopping stops
/// the timer before the flag drops.
pub struct LoggingControlFsm {
    timer: Arc<dyn SampleTimer>,
    clock: Arc<dyn MonotonicClock>,
    display: Arc<dyn StatusDisplay>,
    state: Arc<RunningState>,
    debounce_ms: u32,
    last_toggle: Option<u32>,
    current: LoggingState,
}

impl LoggingControlFsm {
    /// Controller in `Stopped`, with the timer assumed idle.
    pub fn new(
        timer: Arc<dyn SampleTimer>,
        clock: Arc<dyn MonotonicClock>,
        display: Arc<dyn StatusDisplay>,
        state: Arc<RunningState>,
        debounce_ms: u32,
    ) -> Self {
        Self {
            timer,
            clock,
            display,
            state,
            debounce_ms,
            last_toggle: None,
            current: LoggingState::Stopped,
        }
    }

    /// State after the last accepted toggle.
    pub fn current_state(&self) -> LoggingState {
        self.current
    }

    /// Handle one edge. Returns the new state if the edge toggled capture.
    pub fn on_button_edge(&mut self, button: Button) -> Option<LoggingState> {
        if button == Button::Aux {
            trace!("aux button edge ignored");
            return None;
        }

        let now = self.clock.now_millis();
        if let Some(last) = self.last_toggle {
            if elapsed_millis(now, last) < self.debounce_ms {
                trace!(now, last, "logging button edge debounced");
                return None;
            }
        }
        self.last_toggle = Some(now);

        self.current = match self.current {
            LoggingState::Stopped => {
                self.state.set_running(true);
                self.timer.start();
                LoggingState::Running
            }
            LoggingState::Running => {
                self.timer.stop();
                self.state.set_running(false);
                LoggingState::Stopped
            }
        };

        show_line(
            self.display.as_ref(),
            STATE_ROW,
            &logging_line(self.current == LoggingState::Running),
        );
        debug!(state = ?self.current, at_ms = now, "logging toggled");
        Some(self.current)
    }
}
