//! Multi-channel analog scan bound to the sample slot pair.
//!
//! `trigger()` only starts the converter. The block-transfer completion that
//! follows is delivered by the platform to [`AnalogAcquisition::on_transfer_complete`],
//! which lands the whole scan in the filling slot at once.

use std::sync::Arc;

use crate::data::sample::{SampleSlots, ANALOG_CHANNELS};
use crate::hardware::capabilities::AnalogConversionEngine;

/// Analog scan driver.
pub struct AnalogAcquisition<A, const N: usize = ANALOG_CHANNELS> {
    engine: A,
    slots: Arc<SampleSlots<N>>,
    channels: [u8; N],
    in_flight: bool,
}

impl<A: AnalogConversionEngine, const N: usize> AnalogAcquisition<A, N> {
    /// Program the scan order once and bind the destination slots.
    pub fn init(mut engine: A, channels: [u8; N], slots: Arc<SampleSlots<N>>) -> Self {
        engine.configure(&channels);
        Self {
            engine,
            slots,
            channels,
            in_flight: false,
        }
    }

    /// Start the next scan (non-blocking).
    pub fn trigger(&mut self) {
        self.engine.trigger();
        self.in_flight = true;
    }

    /// Block-transfer completion: results in scan order.
    pub fn on_transfer_complete(&mut self, results: &[u16; N]) {
        self.slots.store_analog(results);
        self.in_flight = false;
    }

    /// A scan was triggered and has not completed yet.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Physical scan order.
    pub fn channels(&self) -> &[u8; N] {
        &self.channels
    }
}
