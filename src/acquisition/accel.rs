//! Interrupt-driven accelerometer read-out.
//!
//! Reading X, Y and Z takes three serial register reads. Rather than spinning
//! on the link, the state machine issues one command byte and returns; each
//! serial-completion event stores the byte read back into the filling sample
//! slot and issues the next command.
//!
//! ```text
//! restart()            -> RequestAxis(X)   tx read-X
//! complete(x)          -> RequestAxis(Y)   store X, tx read-Y
//! complete(y)          -> RequestAxis(Z)   store Y, tx read-Z
//! complete(z)          -> Done             store Z, deselect
//! ```
//!
//! If the link refuses the next command the machine parks in
//! `AxisReady(axis)` with that axis stored; the remaining axes keep their
//! previous values until the next `restart()`.

use std::sync::Arc;

use crate::data::sample::{Axis, SampleSlots, ANALOG_CHANNELS};
use crate::hardware::capabilities::SerialTransferEngine;

/// Output register holding the X reading.
pub const DOUTX: u8 = 0x06;
/// Output register holding the Y reading.
pub const DOUTY: u8 = 0x07;
/// Output register holding the Z reading.
pub const DOUTZ: u8 = 0x08;

/// Output register for an axis.
pub const fn output_register(axis: Axis) -> u8 {
    match axis {
        Axis::X => DOUTX,
        Axis::Y => DOUTY,
        Axis::Z => DOUTZ,
    }
}

/// Read command for an axis: register address shifted left by two, R/W bit clear.
pub const fn read_command(axis: Axis) -> u8 {
    output_register(axis) << 2
}

/// Progress through one X/Y/Z exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccelState {
    /// No exchange started.
    Idle,
    /// Read command for this axis is on the wire.
    RequestAxis(Axis),
    /// Axis stored, but the link refused the next command.
    AxisReady(Axis),
    /// All three axes stored this cycle.
    Done,
}

/// State machine for the accelerometer exchange.
pub struct AccelAcquisitionFsm<S, const N: usize = ANALOG_CHANNELS> {
    link: S,
    slots: Arc<SampleSlots<N>>,
    state: AccelState,
    stalls: u32,
}

impl<S: SerialTransferEngine, const N: usize> AccelAcquisitionFsm<S, N> {
    /// Bind the link and the slot pair the readings go to.
    pub fn new(link: S, slots: Arc<SampleSlots<N>>) -> Self {
        Self {
            link,
            slots,
            state: AccelState::Idle,
            stalls: 0,
        }
    }

    /// Abandon any exchange in flight and start a new one at X.
    pub fn restart(&mut self) {
        if matches!(
            self.state,
            AccelState::RequestAxis(_) | AccelState::AxisReady(_)
        ) {
            self.link.end_transaction();
        }

        self.link.begin_transaction();
        self.state = match self.link.send_byte(read_command(Axis::X)) {
            Ok(()) => AccelState::RequestAxis(Axis::X),
            Err(_) => {
                self.stalls = self.stalls.wrapping_add(1);
                self.link.end_transaction();
                AccelState::Idle
            }
        };
    }

    /// Serial-completion event carrying the byte read back.
    ///
    /// Advances exactly one step. Outside `RequestAxis` the event is spurious
    /// and ignored.
    pub fn on_serial_complete(&mut self, received: u8) {
        let AccelState::RequestAxis(axis) = self.state else {
            return;
        };

        self.slots.store_accel(axis, received);
        self.state = AccelState::AxisReady(axis);

        match axis.next() {
            Some(next) => {
                if self.link.send_byte(read_command(next)).is_ok() {
                    self.state = AccelState::RequestAxis(next);
                } else {
                    self.stalls = self.stalls.wrapping_add(1);
                }
            }
            None => {
                self.link.end_transaction();
                self.state = AccelState::Done;
            }
        }
    }

    /// Current step, for diagnostics.
    pub fn current_state(&self) -> AccelState {
        self.state
    }

    /// Number of command bytes the link refused.
    pub fn stalls(&self) -> u32 {
        self.stalls
    }
}
