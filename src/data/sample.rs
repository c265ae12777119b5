//! Per-cycle sample storage shared between acquisition producers and the scheduler.
//!
//! One acquisition cycle fills a [`SampleSlot`]: the analog scan lands all
//! channels at once (block-transfer completion) while the accelerometer axes
//! arrive one at a time from the serial state machine. At each tick the
//! scheduler takes the finished slot out of [`SampleSlots`] under a short
//! critical section, so a record handed to the ring buffer can never be torn
//! by a producer that is still writing.

use parking_lot::Mutex;

/// Number of analog channels in the default scan (A6, A7, A12..A15, A5).
pub const ANALOG_CHANNELS: usize = 7;

/// Number of accelerometer axes.
pub const ACCEL_AXES: usize = 3;

/// Accelerometer axis, in acquisition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    /// All axes in the order they are read.
    pub const ALL: [Axis; ACCEL_AXES] = [Axis::X, Axis::Y, Axis::Z];

    /// Position of this axis in [`SampleSlot::accel`].
    pub const fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis read after this one, if any.
    pub const fn next(self) -> Option<Axis> {
        match self {
            Axis::X => Some(Axis::Y),
            Axis::Y => Some(Axis::Z),
            Axis::Z => None,
        }
    }
}

/// Readings from one acquisition cycle.
///
/// Fixed size; `N` is the number of analog channels in the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleSlot<const N: usize = ANALOG_CHANNELS> {
    /// Raw converter counts, in scan order.
    pub analog: [u16; N],
    /// Raw accelerometer output per axis (X, Y, Z).
    pub accel: [u16; ACCEL_AXES],
}

impl<const N: usize> Default for SampleSlot<N> {
    fn default() -> Self {
        Self {
            analog: [0; N],
            accel: [0; ACCEL_AXES],
        }
    }
}

impl<const N: usize> SampleSlot<N> {
    /// Raw reading for one axis.
    pub fn axis(&self, axis: Axis) -> u16 {
        self.accel[axis.index()]
    }
}

/// A finished slot taken at a tick boundary, with completeness of the cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handoff<const N: usize = ANALOG_CHANNELS> {
    pub slot: SampleSlot<N>,
    /// The analog scan for this cycle landed before the tick.
    pub analog_complete: bool,
    /// Every accelerometer axis was refreshed before the tick.
    pub accel_complete: bool,
}

struct SlotPair<const N: usize> {
    filling: SampleSlot<N>,
    ready: SampleSlot<N>,
    analog_fresh: bool,
    accel_fresh: [bool; ACCEL_AXES],
}

/// The `filling`/`ready` slot pair.
///
/// Producers write into `filling`. [`SampleSlots::swap`] publishes `filling`
/// as `ready` and keeps it as the starting point of the next cycle, so a
/// channel that is not refreshed in time repeats its last reading instead of
/// reverting to an older one.
pub struct SampleSlots<const N: usize = ANALOG_CHANNELS> {
    inner: Mutex<SlotPair<N>>,
}

impl<const N: usize> Default for SampleSlots<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SampleSlots<N> {
    /// Both slots zeroed.
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(SlotPair {
                filling: SampleSlot::default(),
                ready: SampleSlot::default(),
                analog_fresh: false,
                accel_fresh: [false; ACCEL_AXES],
            }),
        }
    }

    /// Land a completed analog scan in the filling slot.
    pub fn store_analog(&self, values: &[u16; N]) {
        let mut pair = self.inner.lock();
        pair.filling.analog = *values;
        pair.analog_fresh = true;
    }

    /// Store one accelerometer byte in the filling slot.
    pub fn store_accel(&self, axis: Axis, raw: u8) {
        let mut pair = self.inner.lock();
        pair.filling.accel[axis.index()] = u16::from(raw);
        pair.accel_fresh[axis.index()] = true;
    }

    /// Publish the filling slot as ready and start a new cycle.
    pub fn swap(&self) -> Handoff<N> {
        let mut pair = self.inner.lock();
        pair.ready = pair.filling;

        let handoff = Handoff {
            slot: pair.ready,
            analog_complete: pair.analog_fresh,
            accel_complete: pair.accel_fresh.iter().all(|fresh| *fresh),
        };

        pair.analog_fresh = false;
        pair.accel_fresh = [false; ACCEL_AXES];
        handoff
    }

    /// Last slot published by [`SampleSlots::swap`].
    pub fn ready(&self) -> SampleSlot<N> {
        self.inner.lock().ready
    }

    /// Slot currently being filled.
    pub fn filling(&self) -> SampleSlot<N> {
        self.inner.lock().filling
    }
}
