//! Host Simulation
//!
//! Runs the complete pipeline on a desktop. Interrupt handlers become one
//! tokio task that owns the sample scheduler, the button controller and the
//! 1 ms system tick; the storage consumer runs as a second task writing to a
//! host directory. Converter and accelerometer readings come from a seeded
//! synthetic sensor model refreshed by a 10 ms hook.
//!
//! A session is scripted: the logging button is pressed at start, pressed
//! again after the requested duration, and the run ends once the consumer
//! has closed the file.

use std::f64::consts::TAU;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tracing::{debug, info, trace};

use crate::acquisition::accel::{output_register, AccelAcquisitionFsm};
use crate::acquisition::analog::AnalogAcquisition;
use crate::acquisition::scheduler::{AcquisitionStats, SampleScheduler};
use crate::config::LoggerConfig;
use crate::data::ring_buffer::CircularByteBuffer;
use crate::data::sample::{Axis, SampleSlots, ANALOG_CHANNELS};
use crate::error::{AppResult, LoggerError};
use crate::hardware::capabilities::{elapsed_millis, MonotonicClock, SampleTimer};
use crate::hardware::clock::{Period, SystemTick, TickClock};
use crate::hardware::display::TextDisplay;
use crate::hardware::host_fs::HostVolume;
use crate::hardware::mock::{MockAnalogEngine, MockSerialLink};
use crate::logger::control::{Button, LoggingControlFsm};
use crate::logger::state::RunningState;
use crate::logger::storage::StorageConsumer;

/// Full-scale converter reading.
const ADC_FULL_SCALE: f64 = 4_095.0;

/// How long a scripted button press may take to change the capture state.
pub const PRESS_TIMEOUT: Duration = Duration::from_secs(2);

/// Sample timer whose ticks are delivered by the simulation task.
#[derive(Debug, Default)]
pub struct SimulatedTimer {
    active: AtomicBool,
}

impl SampleTimer for SimulatedTimer {
    fn start(&self) {
        self.active.store(true, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }
}

/// Seeded slow sine waves plus noise, one per channel and axis.
pub struct SensorModel {
    rng: StdRng,
}

impl SensorModel {
    /// Model whose noise is reproducible for a given `seed`.
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Converter readings at `now_ms`.
    pub fn analog(&mut self, now_ms: u32) -> Vec<u16> {
        let t = f64::from(now_ms) / 1_000.0;
        (0..ANALOG_CHANNELS)
            .map(|channel| {
                let freq = 0.5 + channel as f64 * 0.25;
                let wave = 2_048.0 + 1_500.0 * (TAU * freq * t).sin();
                let noise = f64::from(self.rng.gen_range(-12i32..=12));
                (wave + noise).clamp(0.0, ADC_FULL_SCALE) as u16
            })
            .collect()
    }

    /// Raw accelerometer output register for `axis` at `now_ms`.
    pub fn accel(&mut self, axis: Axis, now_ms: u32) -> u8 {
        let t = f64::from(now_ms) / 1_000.0;
        let wave = 128.0 + 60.0 * (TAU * 2.0 * t + axis.index() as f64).sin();
        let noise = f64::from(self.rng.gen_range(-3i32..=3));
        (wave + noise).clamp(0.0, 255.0) as u8
    }
}

/// Outcome of a simulated session.
#[derive(Debug, Clone)]
pub struct SimulationReport {
    /// Directory standing in for the card.
    pub root: PathBuf,
    /// Session file, if one was opened.
    pub file: Option<String>,
    /// Size of the session file on disk.
    pub file_bytes: u64,
    /// Scheduler counters at the end of the session.
    pub stats: AcquisitionStats,
}

/// Interrupt-side events the script can inject.
#[derive(Debug)]
enum Interrupt {
    Button(Button),
}

/// Capture for `duration` and return what ended up on disk.
///
/// The stop press waits until the tick clock has moved at least one debounce
/// window past the start press, otherwise it would be ignored. Each press must
/// take effect within [`PRESS_TIMEOUT`] or the session fails.
pub async fn run_session(config: &LoggerConfig, duration: Duration, seed: u64) -> AppResult<SimulationReport> {
    config.validate()?;

    let state = Arc::new(RunningState::new());
    let clock = TickClock::new();
    let display = Arc::new(TextDisplay::new());
    let timer = Arc::new(SimulatedTimer::default());

    let slots = Arc::new(SampleSlots::<ANALOG_CHANNELS>::new());
    let engine = MockAnalogEngine::new();
    let link = MockSerialLink::new();
    let analog = AnalogAcquisition::init(
        engine.clone(),
        config.analog_channel_array()?,
        Arc::clone(&slots),
    );
    let accel = AccelAcquisitionFsm::new(link.clone(), Arc::clone(&slots));
    let (producer, buffer) = CircularByteBuffer::split(config.buffer.capacity)?;
    let mut scheduler = SampleScheduler::new(analog, accel, slots, producer, Arc::clone(&state))?;
    let counters = scheduler.counters();

    let mut control = LoggingControlFsm::new(
        timer.clone(),
        Arc::new(clock.clone()),
        display.clone(),
        Arc::clone(&state),
        config.control.debounce_ms,
    );

    let mut system_tick = SystemTick::new(clock.clone());
    {
        let engine = engine.clone();
        let link = link.clone();
        let mut model = SensorModel::new(seed);
        system_tick.hooks_mut().register(
            Period::TenMillis,
            Box::new(move |now: u32| {
                engine.set_results(&model.analog(now));
                for axis in Axis::ALL {
                    link.set_register(output_register(axis), model.accel(axis, now));
                }
            }),
        );
    }
    {
        let counters = scheduler.counters();
        system_tick.hooks_mut().register(
            Period::OneSecond,
            Box::new(move |now: u32| {
                let stats = counters.snapshot();
                debug!(uptime_ms = now, ticks = stats.ticks, dropped = stats.dropped, "heartbeat");
            }),
        );
    }

    let volume = HostVolume::new(&config.storage.root, config.storage.volume_capacity_bytes());
    let consumer = StorageConsumer::new(
        volume,
        buffer,
        Arc::clone(&state),
        display.clone(),
        Arc::new(clock.clone()),
        config.storage.clone(),
    )
    .with_counters(Arc::clone(&counters));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let (irq_tx, mut irq_rx) = mpsc::unbounded_channel::<Interrupt>();

    let consumer_task = tokio::spawn(consumer.run(shutdown_rx.clone()));

    let sample_period = config.acquisition.sample_period();
    let interrupt_task = {
        let mut shutdown = shutdown_rx;
        let timer = Arc::clone(&timer);
        tokio::spawn(async move {
            let mut system = interval(Duration::from_millis(1));
            system.set_missed_tick_behavior(MissedTickBehavior::Burst);
            let mut sample = interval(sample_period);
            sample.set_missed_tick_behavior(MissedTickBehavior::Burst);

            loop {
                tokio::select! {
                    _ = system.tick() => {
                        system_tick.tick();
                    }
                    _ = sample.tick() => {
                        if !timer.is_active() {
                            continue;
                        }
                        scheduler.on_tick();
                        // Completions fire as soon as the hardware would finish.
                        while let Some(scan) = engine.take_completion() {
                            match <[u16; ANALOG_CHANNELS]>::try_from(scan.as_slice()) {
                                Ok(results) => scheduler.on_scan_complete(&results),
                                Err(_) => trace!(len = scan.len(), "scan length mismatch"),
                            }
                        }
                        while let Some(byte) = link.take_completion() {
                            scheduler.on_serial_complete(byte);
                        }
                    }
                    Some(irq) = irq_rx.recv() => {
                        let Interrupt::Button(button) = irq;
                        control.on_button_edge(button);
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            break;
                        }
                    }
                }
            }
        })
    };

    info!(duration_ms = duration.as_millis() as u64, "simulated session starting");
    send_press(&irq_tx)?;
    wait_until(PRESS_TIMEOUT, "the start press", || state.is_running()).await?;
    let started = clock.now_millis();

    sleep(duration).await;
    // Debounce is measured on the tick clock, which can trail wall time.
    let debounce_ms = config.control.debounce_ms;
    wait_until(
        PRESS_TIMEOUT + Duration::from_millis(u64::from(debounce_ms)),
        "the debounce window",
        || elapsed_millis(clock.now_millis(), started) >= debounce_ms,
    )
    .await?;
    send_press(&irq_tx)?;
    wait_until(PRESS_TIMEOUT, "the stop press", || !state.is_running()).await?;

    shutdown_tx
        .send(true)
        .map_err(|e| LoggerError::Simulation(format!("shutdown signal lost: {e}")))?;

    let consumer = consumer_task
        .await
        .map_err(|e| LoggerError::Simulation(format!("storage task failed: {e}")))?;
    interrupt_task
        .await
        .map_err(|e| LoggerError::Simulation(format!("interrupt task failed: {e}")))?;

    let root = consumer.fs().root().to_path_buf();
    let file = consumer.file_name().map(str::to_owned);
    let file_bytes = match &file {
        Some(name) => tokio::fs::metadata(root.join(name)).await?.len(),
        None => 0,
    };
    let stats = counters.snapshot();
    info!(?file, file_bytes, enqueued = stats.enqueued, dropped = stats.dropped, "simulated session finished");

    Ok(SimulationReport {
        root,
        file,
        file_bytes,
        stats,
    })
}

fn send_press(irq: &mpsc::UnboundedSender<Interrupt>) -> AppResult<()> {
    irq.send(Interrupt::Button(Button::Logging))
        .map_err(|_| LoggerError::Simulation("interrupt task stopped".to_string()))
}

/// Poll `condition` every millisecond until it holds or `limit` passes.
async fn wait_until(limit: Duration, what: &str, mut condition: impl FnMut() -> bool) -> AppResult<()> {
    timeout(limit, async {
        while !condition() {
            sleep(Duration::from_millis(1)).await;
        }
    })
    .await
    .map_err(|_| LoggerError::Simulation(format!("timed out waiting for {what}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::record::decode_records;
    use crate::data::sample::SampleSlot;
    use tempfile::tempdir;

    #[test]
    fn test_sensor_model_stays_in_range() {
        let mut model = SensorModel::new(7);
        for now in (0..5_000).step_by(10) {
            let scan = model.analog(now);
            assert_eq!(scan.len(), ANALOG_CHANNELS);
            assert!(scan.iter().all(|v| f64::from(*v) <= ADC_FULL_SCALE));
        }
    }

    #[test]
    fn test_simulated_timer() {
        let timer = SimulatedTimer::default();
        assert!(!timer.is_active());
        timer.start();
        assert!(timer.is_active());
        timer.stop();
        assert!(!timer.is_active());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_session_writes_whole_records() {
        let dir = tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.storage.root = dir.path().join("card");

        let report = run_session(&config, Duration::from_millis(300), 1).await.unwrap();

        assert_eq!(report.file.as_deref(), Some("data.log"));
        assert!(report.stats.enqueued > 0);

        let data = std::fs::read(report.root.join("data.log")).unwrap();
        assert_eq!(data.len() as u64, report.file_bytes);
        assert_eq!(data.len() % SampleSlot::<ANALOG_CHANNELS>::RECORD_LEN, 0);

        let (records, trailing) = decode_records::<ANALOG_CHANNELS>(&data);
        assert_eq!(trailing, 0);
        assert!(!records.is_empty());
        assert!(records
            .iter()
            .flat_map(|r| r.analog.iter())
            .all(|v| f64::from(*v) <= ADC_FULL_SCALE));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_zero_duration_session_still_stops() {
        let dir = tempdir().unwrap();
        let mut config = LoggerConfig::default();
        config.storage.root = dir.path().join("card");

        // The stop press lands inside the debounce window unless it waits
        // for the tick clock.
        for seed in 0..8 {
            let report = tokio::time::timeout(
                Duration::from_secs(5),
                run_session(&config, Duration::ZERO, seed),
            )
            .await
            .expect("session did not stop")
            .unwrap();

            assert_eq!(report.file.as_deref(), Some("data.log"));
            assert_eq!(
                report.file_bytes as usize % SampleSlot::<ANALOG_CHANNELS>::RECORD_LEN,
                0
            );
        }
    }
}
