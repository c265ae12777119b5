//! Fixed-rate sample scheduler (timer interrupt handler).
//!
//! Every tick, in order:
//! 1. Take the previous cycle's slot and, if capture is running, append it to
//!    the ring buffer. A full ring drops the record; nothing is retried.
//! 2. Re-arm the analog scan and the accelerometer exchange for the next cycle,
//!    whatever happened in step 1 and whether or not capture is running.
//!
//! So the record enqueued at tick N+1 holds what was acquired during
//! `[N, N+1)`. The handler never blocks and never reports errors; it keeps
//! counters that the main loop reads through [`AcquisitionCounters`].

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::acquisition::accel::{AccelAcquisitionFsm, AccelState};
use crate::acquisition::analog::AnalogAcquisition;
use crate::data::ring_buffer::{BufferError, BufferProducer};
use crate::data::sample::{SampleSlot, SampleSlots, ANALOG_CHANNELS};
use crate::error::AppResult;
use crate::hardware::capabilities::{AnalogConversionEngine, SerialTransferEngine};
use crate::logger::state::RunningState;

/// Tick statistics written by the scheduler and read by the main loop.
#[derive(Debug, Default)]
pub struct AcquisitionCounters {
    ticks: AtomicU32,
    enqueued: AtomicU32,
    dropped: AtomicU32,
    partial_analog: AtomicU32,
    partial_accel: AtomicU32,
    accel_stalls: AtomicU32,
}

/// Point-in-time copy of [`AcquisitionCounters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AcquisitionStats {
    /// Timer ticks handled.
    pub ticks: u32,
    /// Records appended to the ring buffer.
    pub enqueued: u32,
    /// Records dropped because the ring buffer was full.
    pub dropped: u32,
    /// Ticks at which the analog scan had not landed.
    pub partial_analog: u32,
    /// Ticks at which the accelerometer exchange had not reached `Done`.
    pub partial_accel: u32,
    /// Accelerometer command bytes the serial link refused.
    pub accel_stalls: u32,
}

impl AcquisitionCounters {
    /// Copy all counters.
    pub fn snapshot(&self) -> AcquisitionStats {
        AcquisitionStats {
            ticks: self.ticks.load(Ordering::Relaxed),
            enqueued: self.enqueued.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            partial_analog: self.partial_analog.load(Ordering::Relaxed),
            partial_accel: self.partial_accel.load(Ordering::Relaxed),
            accel_stalls: self.accel_stalls.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU32) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// Timer-interrupt side of the pipeline.
pub struct SampleScheduler<A, S, const N: usize = ANALOG_CHANNELS> {
    analog: AnalogAcquisition<A, N>,
    accel: AccelAcquisitionFsm<S, N>,
    slots: Arc<SampleSlots<N>>,
    producer: BufferProducer,
    state: Arc<RunningState>,
    counters: Arc<AcquisitionCounters>,
    record: Vec<u8>,
}

impl<A, S, const N: usize> SampleScheduler<A, S, N>
where
    A: AnalogConversionEngine,
    S: SerialTransferEngine,
{
    /// Assemble the scheduler from its producers and the ring's write end.
    ///
    /// Fails if one encoded record could never fit in the ring.
    pub fn new(
        analog: AnalogAcquisition<A, N>,
        accel: AccelAcquisitionFsm<S, N>,
        slots: Arc<SampleSlots<N>>,
        producer: BufferProducer,
        state: Arc<RunningState>,
    ) -> AppResult<Self> {
        let record_len = SampleSlot::<N>::RECORD_LEN;
        if record_len >= producer.capacity() {
            return Err(BufferError::TooLarge {
                len: record_len,
                capacity: producer.capacity(),
            }
            .into());
        }

        Ok(Self {
            analog,
            accel,
            slots,
            producer,
            state,
            counters: Arc::new(AcquisitionCounters::default()),
            record: vec![0u8; record_len],
        })
    }

    /// Timer tick.
    pub fn on_tick(&mut self) {
        let handoff = self.slots.swap();
        AcquisitionCounters::bump(&self.counters.ticks);

        if !handoff.analog_complete {
            AcquisitionCounters::bump(&self.counters.partial_analog);
        }
        if !handoff.accel_complete {
            AcquisitionCounters::bump(&self.counters.partial_accel);
        }

        if self.state.is_running() {
            let len = handoff.slot.encode_into(&mut self.record);
            match self.producer.write(&self.record[..len]) {
                Ok(()) => AcquisitionCounters::bump(&self.counters.enqueued),
                Err(_) => AcquisitionCounters::bump(&self.counters.dropped),
            }
        }

        self.analog.trigger();
        let stalls = self.accel.stalls();
        self.accel.restart();
        self.count_stalls(stalls);
    }

    /// Block-transfer completion for the analog scan.
    pub fn on_scan_complete(&mut self, results: &[u16; N]) {
        self.analog.on_transfer_complete(results);
    }

    /// Serial completion for the accelerometer link.
    pub fn on_serial_complete(&mut self, received: u8) {
        let stalls = self.accel.stalls();
        self.accel.on_serial_complete(received);
        self.count_stalls(stalls);
    }

    /// Accelerometer exchange progress.
    pub fn accel_state(&self) -> AccelState {
        self.accel.current_state()
    }

    /// Shared counters, for the main loop.
    pub fn counters(&self) -> Arc<AcquisitionCounters> {
        Arc::clone(&self.counters)
    }

    fn count_stalls(&self, before: u32) {
        let refused = self.accel.stalls().wrapping_sub(before);
        if refused > 0 {
            self.counters.accel_stalls.fetch_add(refused, Ordering::Relaxed);
        }
    }
}
