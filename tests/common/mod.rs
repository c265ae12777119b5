//! Shared pipeline rig for the integration tests.
//!
//! Wires the real acquisition and storage components to the instrumented
//! mocks, with the interrupt side driven by hand from the test body.

#![allow(dead_code)]

use std::sync::Arc;

use ev_logger::acquisition::{AccelAcquisitionFsm, AnalogAcquisition, SampleScheduler};
use ev_logger::config::StorageConfig;
use ev_logger::data::ring_buffer::CircularByteBuffer;
use ev_logger::data::sample::SampleSlots;
use ev_logger::hardware::clock::TickClock;
use ev_logger::hardware::display::TextDisplay;
use ev_logger::hardware::mock::{MockAnalogEngine, MockSampleTimer, MockSerialLink, MockVolume};
use ev_logger::hardware::SampleTimer;
use ev_logger::logger::{LoggingControlFsm, RunningState, StorageConsumer};

pub type Scheduler<const N: usize> = SampleScheduler<MockAnalogEngine, MockSerialLink, N>;

pub struct Pipeline<const N: usize> {
    pub scheduler: Scheduler<N>,
    pub consumer: StorageConsumer<MockVolume>,
    pub control: LoggingControlFsm,
    pub engine: MockAnalogEngine,
    pub link: MockSerialLink,
    pub volume: MockVolume,
    pub timer: MockSampleTimer,
    pub state: Arc<RunningState>,
    pub display: Arc<TextDisplay>,
    pub clock: TickClock,
}

impl<const N: usize> Pipeline<N> {
    pub fn new(capacity: usize, settings: StorageConfig) -> Self {
        let state = Arc::new(RunningState::new());
        let clock = TickClock::new();
        let display = Arc::new(TextDisplay::silent());
        let timer = MockSampleTimer::new(Arc::clone(&state));

        let slots = Arc::new(SampleSlots::<N>::new());
        let engine = MockAnalogEngine::new();
        let link = MockSerialLink::new();
        let channels: [u8; N] = std::array::from_fn(|i| i as u8);
        let analog = AnalogAcquisition::init(engine.clone(), channels, Arc::clone(&slots));
        let accel = AccelAcquisitionFsm::new(link.clone(), Arc::clone(&slots));
        let (producer, buffer) = CircularByteBuffer::split(capacity).unwrap();
        let scheduler =
            SampleScheduler::new(analog, accel, slots, producer, Arc::clone(&state)).unwrap();

        let volume = MockVolume::new();
        let consumer = StorageConsumer::new(
            volume.clone(),
            buffer,
            Arc::clone(&state),
            display.clone(),
            Arc::new(clock.clone()),
            settings,
        )
        .with_counters(scheduler.counters());

        let control = LoggingControlFsm::new(
            Arc::new(timer.clone()),
            Arc::new(clock.clone()),
            display.clone(),
            Arc::clone(&state),
            250,
        );

        Self {
            scheduler,
            consumer,
            control,
            engine,
            link,
            volume,
            timer,
            state,
            display,
            clock,
        }
    }

    /// One timer period: the tick itself, then every completion it caused.
    pub fn tick(&mut self) {
        self.scheduler.on_tick();
        while let Some(scan) = self.engine.take_completion() {
            let results: [u16; N] = scan.as_slice().try_into().unwrap();
            self.scheduler.on_scan_complete(&results);
        }
        while let Some(byte) = self.link.take_completion() {
            self.scheduler.on_serial_complete(byte);
        }
    }

    /// Tick only while the sample timer is running, as the hardware would.
    pub fn timer_tick(&mut self) {
        if self.timer.is_active() {
            self.tick();
        }
    }
}
