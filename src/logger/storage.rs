//! Storage consumer (main loop).
//!
//! Drains the ring buffer to the data file one storage block at a time and
//! owns the whole file lifecycle:
//!
//! ```text
//!            running && !file_open            !running
//!   Idle ───────────────────────────► Open ─────────────► Closing
//!    ▲        (retry on failure)       │ drain blocks      │ flush → sync → close
//!    └─────────────────────────────────┴───────────────────┘ (close retried)
//! ```
//!
//! Each [`StorageConsumer::step`] issues at most one filesystem operation, so
//! the loop is revisited often and never holds the medium for more than one
//! bounded call. Every failure is recovered locally with a fixed delay and
//! shown on the debug row; none of them stops capture.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

use crate::acquisition::scheduler::AcquisitionCounters;
use crate::config::StorageConfig;
use crate::data::ring_buffer::BufferConsumer;
use crate::error::StorageError;
use crate::hardware::capabilities::{
    elapsed_millis, FileHandle, MonotonicClock, OpenMode, PersistentFile, StatusDisplay,
};
use crate::logger::state::RunningState;
use crate::logger::status::{
    buffer_line, file_line, logging_line, show_line, volume_line, BUFFER_ROW, DEBUG_ROW, FILE_ROW,
    STATE_ROW, TITLE, TITLE_ROW, VOLUME_ROW,
};

/// Pause between loop iterations that found nothing to do.
const IDLE_POLL: Duration = Duration::from_millis(1);

/// Highest session number before wrapping back to 1.
const MAX_SESSION_NUMBER: u16 = 9_999;

/// Where the close sequence has got to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseStage {
    /// Writing out what was buffered when capture stopped.
    Flush { remaining: usize },
    /// Flushing file data to the medium.
    Sync,
    /// Releasing the handle.
    Close,
}

/// File lifecycle of the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// No session file.
    Idle,
    /// Session file open and accepting blocks.
    Open(FileHandle),
    /// Capture stopped; working through the close sequence.
    Closing(FileHandle, CloseStage),
}

/// What one [`StorageConsumer::step`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do.
    Idle,
    /// File open, less than one block buffered.
    Waiting,
    /// Session file opened.
    Opened,
    /// Open failed; retried after the configured delay.
    OpenFailed,
    /// Bytes written from the buffer.
    Wrote(usize),
    /// Write failed or came up short; the block is lost.
    WriteFailed,
    /// Bytes of the remainder written while closing.
    Flushed(usize),
    Synced,
    SyncFailed,
    Closed,
    CloseFailed,
    /// Bytes captured without a file were dropped.
    Discarded(usize),
}

impl StepOutcome {
    /// Whether the loop may pause before the next step.
    pub fn is_quiet(self) -> bool {
        matches!(self, StepOutcome::Idle | StepOutcome::Waiting)
    }
}

/// Main-loop side of the pipeline.
pub struct StorageConsumer<F> {
    fs: F,
    buffer: BufferConsumer,
    state: Arc<RunningState>,
    display: Arc<dyn StatusDisplay>,
    clock: Arc<dyn MonotonicClock>,
    counters: Option<Arc<AcquisitionCounters>>,
    settings: StorageConfig,
    scratch: Vec<u8>,
    phase: Phase,
    file_name: Option<String>,
    last_status: Option<u32>,
    last_file_size: u64,
    overflow_reported: bool,
}

impl<F: PersistentFile> StorageConsumer<F> {
    /// Consumer in [`Phase::Idle`] that drains `buffer` into `fs`.
    pub fn new(
        fs: F,
        buffer: BufferConsumer,
        state: Arc<RunningState>,
        display: Arc<dyn StatusDisplay>,
        clock: Arc<dyn MonotonicClock>,
        settings: StorageConfig,
    ) -> Self {
        let scratch = vec![0u8; settings.block_size.max(1)];
        Self {
            fs,
            buffer,
            state,
            display,
            clock,
            counters: None,
            settings,
            scratch,
            phase: Phase::Idle,
            file_name: None,
            last_status: None,
            last_file_size: 0,
            overflow_reported: false,
        }
    }

    /// Report scheduler counters alongside status refreshes.
    pub fn with_counters(mut self, counters: Arc<AcquisitionCounters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Current file lifecycle phase.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Name of the current (or last) session file.
    pub fn file_name(&self) -> Option<&str> {
        self.file_name.as_deref()
    }

    /// The storage backend.
    pub fn fs(&self) -> &F {
        &self.fs
    }

    /// Consumer end of the ring buffer.
    pub fn buffer(&self) -> &BufferConsumer {
        &self.buffer
    }

    fn block_size(&self) -> usize {
        self.scratch.len()
    }

    fn show_debug(&self, text: &str) {
        show_line(self.display.as_ref(), DEBUG_ROW, text);
    }

    /// Wait for a medium, mount it and draw the initial screen.
    ///
    /// Loops until the mount succeeds.
    #[instrument(skip(self))]
    pub async fn prepare(&mut self) {
        show_line(self.display.as_ref(), TITLE_ROW, TITLE);

        let mut prompted = false;
        while !self.fs.card_present().await {
            if !prompted {
                info!("waiting for storage medium");
                self.show_debug("Insert SD Card");
                prompted = true;
            }
            sleep(self.settings.card_poll()).await;
        }

        while let Err(e) = self.fs.mount().await {
            warn!(error = %e, "mount failed, retrying");
            self.show_debug(&format!("Mount fail: {e}"));
            sleep(self.settings.mount_retry()).await;
        }
        info!("volume mounted");

        self.display.clear_line(DEBUG_ROW);
        self.refresh_status().await;
    }

    /// Advance the consumer by at most one filesystem operation.
    pub async fn step(&mut self) -> StepOutcome {
        match self.phase {
            Phase::Idle => self.step_idle().await,
            Phase::Open(handle) => self.step_open(handle).await,
            Phase::Closing(handle, stage) => self.step_closing(handle, stage).await,
        }
    }

    async fn step_idle(&mut self) -> StepOutcome {
        if !self.state.is_running() {
            let stale = self.buffer.used();
            if stale == 0 {
                return StepOutcome::Idle;
            }
            // Captured while the file never opened; the producer is stopped.
            self.buffer.reset();
            debug!(bytes = stale, "discarded bytes captured without an open file");
            return StepOutcome::Discarded(stale);
        }

        let (name, mode) = self.session_target().await;
        match self.fs.open(&name, mode).await {
            Ok(handle) => {
                self.buffer.clear_overflow();
                self.overflow_reported = false;
                self.last_file_size = 0;
                self.state.set_file_open(true);
                self.display.clear_line(DEBUG_ROW);
                self.phase = Phase::Open(handle);
                info!(file = %name, "capture session opened");
                self.file_name = Some(name);
                StepOutcome::Opened
            }
            Err(e) => {
                warn!(file = %name, error = %e, "open failed, retrying");
                self.show_debug(&format!("Open fail: {e}"));
                sleep(self.settings.open_retry()).await;
                StepOutcome::OpenFailed
            }
        }
    }

    async fn step_open(&mut self, handle: FileHandle) -> StepOutcome {
        if !self.state.is_running() {
            let remaining = self.buffer.used();
            info!(buffered = remaining, "capture stopped, closing session");
            return self
                .step_closing(handle, CloseStage::Flush { remaining })
                .await;
        }

        let block = self.block_size();
        if self.buffer.used() < block {
            return StepOutcome::Waiting;
        }

        match self.write_chunk(handle, block).await {
            Ok(written) => StepOutcome::Wrote(written),
            Err(e) => {
                self.report_write_failure(&e);
                StepOutcome::WriteFailed
            }
        }
    }

    async fn step_closing(&mut self, handle: FileHandle, stage: CloseStage) -> StepOutcome {
        match stage {
            CloseStage::Flush { remaining } => {
                let chunk = remaining.min(self.block_size()).min(self.buffer.used());
                if chunk == 0 {
                    return self.sync_file(handle).await;
                }

                self.phase = Phase::Closing(
                    handle,
                    CloseStage::Flush {
                        remaining: remaining - chunk,
                    },
                );
                match self.write_chunk(handle, chunk).await {
                    Ok(written) => StepOutcome::Flushed(written),
                    Err(e) => {
                        self.report_write_failure(&e);
                        StepOutcome::WriteFailed
                    }
                }
            }
            CloseStage::Sync => self.sync_file(handle).await,
            CloseStage::Close => self.close_file(handle).await,
        }
    }

    async fn sync_file(&mut self, handle: FileHandle) -> StepOutcome {
        // A failed sync is reported once; the close still goes ahead.
        self.phase = Phase::Closing(handle, CloseStage::Close);
        match self.fs.sync(handle).await {
            Ok(()) => StepOutcome::Synced,
            Err(e) => {
                warn!(error = %e, "sync failed");
                self.show_debug("sync fail");
                StepOutcome::SyncFailed
            }
        }
    }

    async fn close_file(&mut self, handle: FileHandle) -> StepOutcome {
        let size = self.fs.size(handle).await;
        match self.fs.close(handle).await {
            Ok(()) => {
                self.state.set_file_open(false);
                self.last_file_size = size;
                if !self.state.is_running() {
                    self.buffer.reset();
                }
                self.phase = Phase::Idle;
                match &self.counters {
                    Some(counters) => {
                        let stats = counters.snapshot();
                        info!(
                            file = ?self.file_name,
                            bytes = size,
                            enqueued = stats.enqueued,
                            dropped = stats.dropped,
                            "capture session closed"
                        );
                    }
                    None => info!(file = ?self.file_name, bytes = size, "capture session closed"),
                }
                StepOutcome::Closed
            }
            Err(e) => {
                warn!(error = %e, "close failed, retrying");
                self.show_debug(&format!("close fail: {e}"));
                sleep(self.settings.close_retry()).await;
                StepOutcome::CloseFailed
            }
        }
    }

    /// Move up to `len` bytes from the ring to the file.
    ///
    /// The bytes leave the ring whether or not the write succeeds.
    async fn write_chunk(&mut self, handle: FileHandle, len: usize) -> Result<usize, StorageError> {
        let n = self.buffer.read(&mut self.scratch[..len]);
        let written = self.fs.write(handle, &self.scratch[..n]).await?;
        if written < n {
            return Err(StorageError::ShortWrite {
                requested: n,
                written,
            });
        }
        Ok(written)
    }

    fn report_write_failure(&self, e: &StorageError) {
        warn!(error = %e, "block write failed");
        self.show_debug(&format!("write fail: {e}"));
    }

    /// File name and open mode for the next session.
    async fn session_target(&self) -> (String, OpenMode) {
        let stem = &self.settings.file_stem;
        let ext = &self.settings.file_extension;

        if !self.settings.numbered_sessions {
            let mode = if self.settings.append_existing {
                OpenMode::ReadWriteAppend
            } else {
                OpenMode::ReadWriteCreateAlways
            };
            return (format!("{stem}.{ext}"), mode);
        }

        let existing = match self.fs.list_files().await {
            Ok(names) => names,
            Err(e) => {
                warn!(error = %e, "could not list volume, numbering from 1");
                Vec::new()
            }
        };
        let number = next_session_number(&existing, stem, ext);
        (
            session_file_name(stem, ext, number),
            OpenMode::ReadWriteCreateAlways,
        )
    }

    /// Redraw the status rows if the refresh interval has passed.
    pub async fn poll_status(&mut self) {
        let now = self.clock.now_millis();
        let due = match self.last_status {
            None => true,
            Some(last) => elapsed_millis(now, last) >= self.settings.status_interval_ms,
        };
        if due {
            self.refresh_status().await;
        }
    }

    async fn refresh_status(&mut self) {
        self.last_status = Some(self.clock.now_millis());
        let display = Arc::clone(&self.display);
        let display = display.as_ref();

        show_line(display, STATE_ROW, &logging_line(self.state.is_running()));
        show_line(display, BUFFER_ROW, &buffer_line(self.buffer.fill_percent()));

        match self.phase {
            Phase::Open(handle) | Phase::Closing(handle, _) => {
                self.last_file_size = self.fs.size(handle).await;
            }
            Phase::Idle => {}
        }
        show_line(display, FILE_ROW, &file_line(self.last_file_size));

        match self.fs.free_space().await {
            Ok(space) => show_line(display, VOLUME_ROW, &volume_line(&space)),
            Err(e) => debug!(error = %e, "free space unavailable"),
        }

        if self.buffer.is_overflowed() {
            show_line(display, DEBUG_ROW, "Buffer overflow");
            if !self.overflow_reported {
                let dropped = self.counters.as_ref().map(|c| c.snapshot().dropped);
                warn!(?dropped, "ring buffer overflow, records dropped");
                self.overflow_reported = true;
            }
        }

        if let Some(counters) = &self.counters {
            let stats = counters.snapshot();
            debug!(
                ticks = stats.ticks,
                enqueued = stats.enqueued,
                dropped = stats.dropped,
                partial_analog = stats.partial_analog,
                partial_accel = stats.partial_accel,
                accel_stalls = stats.accel_stalls,
                "acquisition counters"
            );
        }
    }

    /// Drive the consumer until `shutdown` is raised and capture has wound down.
    ///
    /// Returns the consumer so callers can inspect the final state.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) -> Self {
        self.prepare().await;

        loop {
            let outcome = self.step().await;
            self.poll_status().await;

            if *shutdown.borrow()
                && self.phase == Phase::Idle
                && !self.state.is_running()
                && self.buffer.used() == 0
            {
                break;
            }

            if outcome.is_quiet() {
                sleep(IDLE_POLL).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        self.refresh_status().await;
        info!("storage consumer stopped");
        self
    }
}

/// Next free session number given the files already on the volume.
///
/// Numbers run 1..=9999 and wrap back to 1.
pub fn next_session_number(existing: &[String], stem: &str, ext: &str) -> u16 {
    let prefix = format!("{stem}_");
    let suffix = format!(".{ext}");

    let highest = existing
        .iter()
        .filter_map(|name| name.strip_prefix(&prefix)?.strip_suffix(&suffix).map(str::to_owned))
        .filter(|digits| digits.len() == 4 && digits.bytes().all(|b| b.is_ascii_digit()))
        .filter_map(|digits| digits.parse::<u16>().ok())
        .max()
        .unwrap_or(0);

    match (highest + 1) % (MAX_SESSION_NUMBER + 1) {
        0 => 1,
        n => n,
    }
}

/// `stem_NNNN.ext`
pub fn session_file_name(stem: &str, ext: &str, number: u16) -> String {
    format!("{stem}_{number:04}.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::ring_buffer::{BufferProducer, CircularByteBuffer};
    use crate::hardware::clock::TickClock;
    use crate::hardware::display::TextDisplay;
    use crate::hardware::mock::{FaultPoint, MockVolume, StorageOp};
    use tracing_test::traced_test;

    struct Rig {
        consumer: StorageConsumer<MockVolume>,
        producer: BufferProducer,
        volume: MockVolume,
        state: Arc<RunningState>,
        display: Arc<TextDisplay>,
        clock: TickClock,
    }

    async fn rig(settings: StorageConfig) -> Rig {
        let (producer, buffer) = CircularByteBuffer::split(2048).unwrap();
        let volume = MockVolume::new();
        let state = Arc::new(RunningState::new());
        let display = Arc::new(TextDisplay::silent());
        let clock = TickClock::new();
        let mut consumer = StorageConsumer::new(
            volume.clone(),
            buffer,
            Arc::clone(&state),
            display.clone(),
            Arc::new(clock.clone()),
            settings,
        );
        consumer.prepare().await;
        Rig {
            consumer,
            producer,
            volume,
            state,
            display,
            clock,
        }
    }

    async fn open_session(rig: &mut Rig) {
        rig.state.set_running(true);
        assert_eq!(rig.consumer.step().await, StepOutcome::Opened);
    }

    fn fill(producer: &mut BufferProducer, len: usize) {
        let data: Vec<u8> = (0..len).map(|i| i as u8).collect();
        producer.write(&data).unwrap();
    }

    #[test]
    fn test_session_numbering() {
        let names = vec![
            "data_0001.log".to_string(),
            "data_0007.log".to_string(),
            "data_12.log".to_string(),
            "other_0042.log".to_string(),
            "data_0099.bin".to_string(),
        ];
        assert_eq!(next_session_number(&names, "data", "log"), 8);
        assert_eq!(next_session_number(&[], "data", "log"), 1);
        assert_eq!(
            next_session_number(&["data_9999.log".to_string()], "data", "log"),
            1
        );
        assert_eq!(session_file_name("data", "log", 8), "data_0008.log");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_retries_mount() {
        let (_producer, buffer) = CircularByteBuffer::split(2048).unwrap();
        let volume = MockVolume::new();
        volume.fail_next(FaultPoint::Mount, 2);
        let display = Arc::new(TextDisplay::silent());

        let mut consumer = StorageConsumer::new(
            volume.clone(),
            buffer,
            Arc::new(RunningState::new()),
            display.clone(),
            Arc::new(TickClock::new()),
            StorageConfig::default(),
        );
        consumer.prepare().await;

        assert_eq!(
            volume.ops(),
            vec![StorageOp::Mount, StorageOp::Mount, StorageOp::Mount]
        );
        assert!(volume.is_mounted());
        assert_eq!(display.row(TITLE_ROW), TITLE);
        assert_eq!(display.row(DEBUG_ROW), "");
        assert_eq!(display.row(VOLUME_ROW), "0/2000MB (0%)");
    }

    #[tokio::test(start_paused = true)]
    async fn test_prepare_waits_for_card() {
        let (_producer, buffer) = CircularByteBuffer::split(2048).unwrap();
        let volume = MockVolume::new();
        volume.set_card_present(false);
        let display = Arc::new(TextDisplay::silent());

        let mut consumer = StorageConsumer::new(
            volume.clone(),
            buffer,
            Arc::new(RunningState::new()),
            display.clone(),
            Arc::new(TickClock::new()),
            StorageConfig::default(),
        );

        let inserter = {
            let volume = volume.clone();
            let display = Arc::clone(&display);
            async move {
                sleep(Duration::from_millis(600)).await;
                assert_eq!(display.row(DEBUG_ROW), "Insert SD Card");
                assert!(!volume.is_mounted());
                volume.set_card_present(true);
            }
        };
        tokio::join!(consumer.prepare(), inserter);

        assert!(volume.is_mounted());
        assert_eq!(display.row(DEBUG_ROW), "");
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_open_failure_is_retried_and_shown() {
        let mut rig = rig(StorageConfig::default()).await;
        rig.volume.fail_next(FaultPoint::Open, 2);
        rig.state.set_running(true);

        assert_eq!(rig.consumer.step().await, StepOutcome::OpenFailed);
        // The panel is 17 columns wide.
        assert_eq!(rig.display.row(DEBUG_ROW), "Open fail: device");
        assert!(!rig.state.is_file_open());

        assert_eq!(rig.consumer.step().await, StepOutcome::OpenFailed);
        assert_eq!(rig.consumer.step().await, StepOutcome::Opened);
        assert!(rig.state.is_file_open());
        assert_eq!(rig.display.row(DEBUG_ROW), "");
        assert_eq!(rig.consumer.file_name(), Some("data.log"));
        assert!(logs_contain("open failed, retrying"));
        assert!(logs_contain("capture session opened"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_drains_whole_blocks_only() {
        let mut rig = rig(StorageConfig::default()).await;
        open_session(&mut rig).await;

        fill(&mut rig.producer, 600);
        assert_eq!(rig.consumer.step().await, StepOutcome::Wrote(512));
        assert_eq!(rig.consumer.step().await, StepOutcome::Waiting);
        assert_eq!(rig.consumer.buffer().used(), 88);
        assert_eq!(rig.volume.writes(), vec![512]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_is_not_retried() {
        let mut rig = rig(StorageConfig::default()).await;
        open_session(&mut rig).await;
        rig.volume.fail_next(FaultPoint::Write, 1);

        fill(&mut rig.producer, 1024);
        assert_eq!(rig.consumer.step().await, StepOutcome::WriteFailed);
        assert!(rig.display.row(DEBUG_ROW).starts_with("write fail"));
        assert_eq!(rig.consumer.step().await, StepOutcome::Wrote(512));
        assert_eq!(rig.volume.file("data.log").unwrap().len(), 512);
        assert!(rig.state.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_sequence_flushes_syncs_and_closes() {
        let mut rig = rig(StorageConfig::default()).await;
        open_session(&mut rig).await;

        fill(&mut rig.producer, 700);
        rig.state.set_running(false);

        assert_eq!(rig.consumer.step().await, StepOutcome::Flushed(512));
        assert_eq!(rig.consumer.step().await, StepOutcome::Flushed(188));
        assert_eq!(rig.consumer.step().await, StepOutcome::Synced);
        assert!(rig.state.is_file_open());
        assert_eq!(rig.consumer.step().await, StepOutcome::Closed);

        assert!(!rig.state.is_file_open());
        assert_eq!(rig.consumer.phase(), Phase::Idle);
        assert_eq!(rig.volume.file("data.log").unwrap().len(), 700);
        assert_eq!(rig.volume.open_files(), 0);
        assert_eq!(rig.consumer.step().await, StepOutcome::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_is_retried_until_it_succeeds() {
        let mut rig = rig(StorageConfig::default()).await;
        open_session(&mut rig).await;
        rig.volume.fail_next(FaultPoint::Close, 2);
        rig.volume.fail_next(FaultPoint::Sync, 1);
        rig.state.set_running(false);

        assert_eq!(rig.consumer.step().await, StepOutcome::SyncFailed);
        assert_eq!(rig.display.row(DEBUG_ROW), "sync fail");
        assert_eq!(rig.consumer.step().await, StepOutcome::CloseFailed);
        assert!(rig.display.row(DEBUG_ROW).starts_with("close fail: "));
        assert!(rig.state.is_file_open());
        assert_eq!(rig.consumer.step().await, StepOutcome::CloseFailed);
        assert_eq!(rig.consumer.step().await, StepOutcome::Closed);
        assert!(!rig.state.is_file_open());
    }

    #[tokio::test(start_paused = true)]
    #[traced_test]
    async fn test_overflow_shown_then_cleared_by_next_session() {
        let mut rig = rig(StorageConfig::default()).await;
        rig.state.set_running(true);
        rig.volume.fail_next(FaultPoint::Open, 1);
        assert_eq!(rig.consumer.step().await, StepOutcome::OpenFailed);

        // Nothing drains while the open keeps failing.
        fill(&mut rig.producer, 2000);
        assert!(rig.producer.write(&[0; 100]).is_err());
        rig.clock.advance(200);
        rig.consumer.poll_status().await;
        assert_eq!(rig.display.row(DEBUG_ROW), "Buffer overflow");
        assert_eq!(rig.display.row(BUFFER_ROW), "Buffer: 97%");
        assert!(logs_contain("ring buffer overflow"));

        assert_eq!(rig.consumer.step().await, StepOutcome::Opened);
        assert!(!rig.consumer.buffer().is_overflowed());
        assert_eq!(rig.consumer.buffer().used(), 2000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_refresh_follows_interval() {
        let mut rig = rig(StorageConfig::default()).await;
        open_session(&mut rig).await;
        fill(&mut rig.producer, 1024);
        rig.consumer.step().await;

        rig.clock.advance(199);
        rig.consumer.poll_status().await;
        assert_eq!(rig.display.row(BUFFER_ROW), "Buffer: 0%");

        rig.clock.advance(1);
        rig.consumer.poll_status().await;
        assert_eq!(rig.display.row(FILE_ROW), "File: 0kb");
        assert_eq!(rig.display.row(BUFFER_ROW), "Buffer: 25%");
        assert_eq!(rig.display.row(STATE_ROW), "Logging: ON");

        rig.consumer.step().await;
        rig.clock.advance(200);
        rig.consumer.poll_status().await;
        assert_eq!(rig.display.row(FILE_ROW), "File: 1kb");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_bytes_discarded_when_idle() {
        let mut rig = rig(StorageConfig::default()).await;
        fill(&mut rig.producer, 64);
        assert_eq!(rig.consumer.step().await, StepOutcome::Discarded(64));
        assert_eq!(rig.consumer.buffer().used(), 0);
        assert_eq!(rig.consumer.step().await, StepOutcome::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_numbered_sessions_pick_next_free_name() {
        let settings = StorageConfig {
            numbered_sessions: true,
            ..StorageConfig::default()
        };
        let mut rig = rig(settings).await;
        rig.volume.insert_file("data_0003.log", &[]);

        open_session(&mut rig).await;
        assert_eq!(rig.consumer.file_name(), Some("data_0004.log"));

        rig.state.set_running(false);
        while rig.consumer.step().await != StepOutcome::Closed {}
        open_session(&mut rig).await;
        assert_eq!(rig.consumer.file_name(), Some("data_0005.log"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_existing_keeps_previous_data() {
        let settings = StorageConfig {
            append_existing: true,
            ..StorageConfig::default()
        };
        let mut rig = rig(settings).await;
        rig.volume.insert_file("data.log", b"earlier");

        open_session(&mut rig).await;
        assert_eq!(rig.consumer.file_name(), Some("data.log"));
        fill(&mut rig.producer, 512);
        assert_eq!(rig.consumer.step().await, StepOutcome::Wrote(512));

        let data = rig.volume.file("data.log").unwrap();
        assert_eq!(data.len(), 7 + 512);
        assert_eq!(&data[..7], b"earlier");
    }

    #[tokio::test(start_paused = true)]
    async fn test_default_session_truncates_previous_data() {
        let mut rig = rig(StorageConfig::default()).await;
        rig.volume.insert_file("data.log", b"earlier");

        open_session(&mut rig).await;
        assert_eq!(rig.volume.file("data.log"), Some(Vec::new()));
    }
}
