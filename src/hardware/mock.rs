//! Mock Hardware Implementations
//!
//! Instrumented fakes for every collaborator, used by the unit and integration
//! tests and by the host simulation. Each mock is a cheap `Clone` handle over
//! shared state, so a test can move one copy into the component under test and
//! keep another to inspect calls or inject faults.
//!
//! # Available Mocks
//!
//! - `MockAnalogEngine` - records scan configuration, queues one completion per trigger
//! - `MockSerialLink` - register-map accelerometer link with refusable sends
//! - `MockSampleTimer` - records start/stop together with the running flag seen at the call
//! - `MockVolume` - in-memory filesystem with per-operation fault injection

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{SerialBusy, StorageError};
use crate::hardware::capabilities::{
    AnalogConversionEngine, FileHandle, OpenMode, PersistentFile, SampleTimer,
    SerialTransferEngine, VolumeSpace,
};
use crate::logger::state::RunningState;

// =============================================================================
// MockAnalogEngine - Simulated Converter
// =============================================================================

#[derive(Default)]
struct AnalogInner {
    configured: Option<Vec<u8>>,
    results: Vec<u16>,
    pending: VecDeque<Vec<u16>>,
    triggers: u32,
}

/// Converter that completes each triggered scan with the current result set.
#[derive(Clone, Default)]
pub struct MockAnalogEngine {
    inner: Arc<Mutex<AnalogInner>>,
}

impl MockAnalogEngine {
    /// Converter with no results configured.
    pub fn new() -> Self {
        Self::default()
    }

    /// Values the next triggered scans will produce.
    pub fn set_results(&self, results: &[u16]) {
        self.inner.lock().results = results.to_vec();
    }

    /// Pop the oldest finished scan, as the block-transfer completion would.
    pub fn take_completion(&self) -> Option<Vec<u16>> {
        self.inner.lock().pending.pop_front()
    }

    /// Scan order passed to `configure`, if any.
    pub fn configured_channels(&self) -> Option<Vec<u8>> {
        self.inner.lock().configured.clone()
    }

    /// Number of scans triggered.
    pub fn trigger_count(&self) -> u32 {
        self.inner.lock().triggers
    }
}

impl AnalogConversionEngine for MockAnalogEngine {
    fn configure(&mut self, channels: &[u8]) {
        let mut inner = self.inner.lock();
        inner.configured = Some(channels.to_vec());
        if inner.results.len() != channels.len() {
            inner.results = vec![0; channels.len()];
        }
    }

    fn trigger(&mut self) {
        let mut inner = self.inner.lock();
        inner.triggers += 1;
        let scan = inner.results.clone();
        inner.pending.push_back(scan);
    }
}

// =============================================================================
// MockSerialLink - Simulated Accelerometer Link
// =============================================================================

#[derive(Default)]
struct SerialInner {
    registers: HashMap<u8, u8>,
    sent: Vec<u8>,
    pending: VecDeque<u8>,
    refuse: u32,
    selected: bool,
}

/// Accelerometer link answering register reads from a register map.
#[derive(Clone, Default)]
pub struct MockSerialLink {
    inner: Arc<Mutex<SerialInner>>,
}

impl MockSerialLink {
    /// Link with every register reading zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Value returned by reads of `register`.
    pub fn set_register(&self, register: u8, value: u8) {
        self.inner.lock().registers.insert(register, value);
    }

    /// Refuse the next `count` sends with [`SerialBusy`].
    pub fn refuse_next_sends(&self, count: u32) {
        self.inner.lock().refuse = count;
    }

    /// Pop the oldest completed read, as the serial interrupt would.
    pub fn take_completion(&self) -> Option<u8> {
        self.inner.lock().pending.pop_front()
    }

    /// Command bytes accepted so far.
    pub fn sent(&self) -> Vec<u8> {
        self.inner.lock().sent.clone()
    }

    /// Whether the device is currently selected.
    pub fn is_selected(&self) -> bool {
        self.inner.lock().selected
    }
}

impl SerialTransferEngine for MockSerialLink {
    fn begin_transaction(&mut self) {
        self.inner.lock().selected = true;
    }

    fn send_byte(&mut self, byte: u8) -> Result<(), SerialBusy> {
        let mut inner = self.inner.lock();
        if inner.refuse > 0 {
            inner.refuse -= 1;
            return Err(SerialBusy);
        }

        inner.sent.push(byte);
        let value = inner.registers.get(&(byte >> 2)).copied().unwrap_or(0);
        inner.pending.push_back(value);
        Ok(())
    }

    fn end_transaction(&mut self) {
        self.inner.lock().selected = false;
    }
}

// =============================================================================
// MockSampleTimer - Instrumented Timer
// =============================================================================

/// A start or stop call, with the running flag observed at that moment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerEvent {
    Started { running_seen: bool },
    Stopped { running_seen: bool },
}

#[derive(Default)]
struct TimerInner {
    active: bool,
    events: Vec<TimerEvent>,
}

/// Timer that records each start/stop and the running flag it observed.
#[derive(Clone)]
pub struct MockSampleTimer {
    inner: Arc<Mutex<TimerInner>>,
    running: Arc<RunningState>,
}

impl MockSampleTimer {
    /// Timer reading `running` on every call.
    pub fn new(running: Arc<RunningState>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(TimerInner::default())),
            running,
        }
    }

    /// Calls made so far.
    pub fn events(&self) -> Vec<TimerEvent> {
        self.inner.lock().events.clone()
    }
}

impl SampleTimer for MockSampleTimer {
    fn start(&self) {
        let running_seen = self.running.is_running();
        let mut inner = self.inner.lock();
        inner.active = true;
        inner.events.push(TimerEvent::Started { running_seen });
    }

    fn stop(&self) {
        let running_seen = self.running.is_running();
        let mut inner = self.inner.lock();
        inner.active = false;
        inner.events.push(TimerEvent::Stopped { running_seen });
    }

    fn is_active(&self) -> bool {
        self.inner.lock().active
    }
}

// =============================================================================
// MockVolume - In-Memory Filesystem
// =============================================================================

/// A storage call as seen by [`MockVolume`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageOp {
    Mount,
    Open(String),
    Write(usize),
    Sync,
    Close,
}

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FaultPoint {
    Mount,
    Open,
    Write,
    Sync,
    Close,
}

#[derive(Default)]
struct VolumeInner {
    card_present: bool,
    mounted: bool,
    capacity: u64,
    files: HashMap<String, Vec<u8>>,
    open: HashMap<u32, String>,
    next_handle: u32,
    faults: HashMap<FaultPoint, u32>,
    ops: Vec<StorageOp>,
}

impl VolumeInner {
    fn take_fault(&mut self, point: FaultPoint) -> bool {
        match self.faults.get_mut(&point) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                true
            }
            _ => false,
        }
    }

    fn used(&self) -> u64 {
        self.files.values().map(|data| data.len() as u64).sum()
    }
}

/// In-memory volume recording every call.
///
/// Clones share state, so a test can keep one handle for inspection while
/// the consumer owns another.
///
/// ```
/// use ev_logger::hardware::capabilities::{OpenMode, PersistentFile};
/// use ev_logger::hardware::mock::{FaultPoint, MockVolume, StorageOp};
///
/// # tokio_test::block_on(async {
/// let inspector = MockVolume::new();
/// let mut volume = inspector.clone();
/// inspector.fail_next(FaultPoint::Open, 1);
///
/// volume.mount().await.unwrap();
/// assert!(volume.open("data.log", OpenMode::ReadWriteCreateAlways).await.is_err());
/// let handle = volume.open("data.log", OpenMode::ReadWriteCreateAlways).await.unwrap();
/// volume.write(handle, &[1, 2, 3]).await.unwrap();
///
/// assert_eq!(inspector.file("data.log"), Some(vec![1, 2, 3]));
/// assert_eq!(inspector.ops().last(), Some(&StorageOp::Write(3)));
/// # });
/// ```
#[derive(Clone)]
pub struct MockVolume {
    inner: Arc<Mutex<VolumeInner>>,
}

impl Default for MockVolume {
    fn default() -> Self {
        Self::new()
    }
}

impl MockVolume {
    /// 2 GB volume with a card inserted.
    pub fn new() -> Self {
        Self::with_capacity(2_000_000_000)
    }

    /// Volume of `capacity` bytes with a card inserted.
    pub fn with_capacity(capacity: u64) -> Self {
        Self {
            inner: Arc::new(Mutex::new(VolumeInner {
                card_present: true,
                capacity,
                next_handle: 1,
                ..VolumeInner::default()
            })),
        }
    }

    /// Insert or remove the card.
    pub fn set_card_present(&self, present: bool) {
        self.inner.lock().card_present = present;
    }

    /// Fail the next `count` calls at `point`.
    pub fn fail_next(&self, point: FaultPoint, count: u32) {
        self.inner.lock().faults.insert(point, count);
    }

    /// Pre-populate a file.
    pub fn insert_file(&self, name: &str, data: &[u8]) {
        self.inner.lock().files.insert(name.to_string(), data.to_vec());
    }

    /// Contents of `name`, if it exists.
    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.inner.lock().files.get(name).cloned()
    }

    /// Every call made so far (including failed ones).
    pub fn ops(&self) -> Vec<StorageOp> {
        self.inner.lock().ops.clone()
    }

    /// Byte counts of the writes issued so far.
    pub fn writes(&self) -> Vec<usize> {
        self.inner
            .lock()
            .ops
            .iter()
            .filter_map(|op| match op {
                StorageOp::Write(len) => Some(*len),
                _ => None,
            })
            .collect()
    }

    /// Number of files currently open.
    pub fn open_files(&self) -> usize {
        self.inner.lock().open.len()
    }

    /// Whether the volume has been mounted.
    pub fn is_mounted(&self) -> bool {
        self.inner.lock().mounted
    }
}

#[async_trait]
impl PersistentFile for MockVolume {
    async fn card_present(&self) -> bool {
        self.inner.lock().card_present
    }

    async fn mount(&mut self) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.ops.push(StorageOp::Mount);
        if !inner.card_present {
            return Err(StorageError::NoMedium);
        }
        if inner.take_fault(FaultPoint::Mount) {
            return Err(StorageError::Device("mount fault".into()));
        }
        inner.mounted = true;
        Ok(())
    }

    async fn open(&mut self, name: &str, mode: OpenMode) -> Result<FileHandle, StorageError> {
        let mut inner = self.inner.lock();
        inner.ops.push(StorageOp::Open(name.to_string()));
        if !inner.mounted {
            return Err(StorageError::NotMounted);
        }
        if inner.take_fault(FaultPoint::Open) {
            return Err(StorageError::Device("open fault".into()));
        }

        let file = inner.files.entry(name.to_string()).or_default();
        if mode == OpenMode::ReadWriteCreateAlways {
            file.clear();
        }

        let handle = inner.next_handle;
        inner.next_handle += 1;
        inner.open.insert(handle, name.to_string());
        Ok(FileHandle(handle))
    }

    async fn write(&mut self, handle: FileHandle, bytes: &[u8]) -> Result<usize, StorageError> {
        let mut inner = self.inner.lock();
        inner.ops.push(StorageOp::Write(bytes.len()));
        if inner.take_fault(FaultPoint::Write) {
            return Err(StorageError::Device("write fault".into()));
        }
        if inner.used() + bytes.len() as u64 > inner.capacity {
            return Err(StorageError::DiskFull);
        }

        let name = inner
            .open
            .get(&handle.0)
            .cloned()
            .ok_or(StorageError::InvalidHandle)?;
        inner.files.entry(name).or_default().extend_from_slice(bytes);
        Ok(bytes.len())
    }

    async fn sync(&mut self, handle: FileHandle) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.ops.push(StorageOp::Sync);
        if !inner.open.contains_key(&handle.0) {
            return Err(StorageError::InvalidHandle);
        }
        if inner.take_fault(FaultPoint::Sync) {
            return Err(StorageError::Device("sync fault".into()));
        }
        Ok(())
    }

    async fn close(&mut self, handle: FileHandle) -> Result<(), StorageError> {
        let mut inner = self.inner.lock();
        inner.ops.push(StorageOp::Close);
        if inner.take_fault(FaultPoint::Close) {
            return Err(StorageError::Device("close fault".into()));
        }
        inner
            .open
            .remove(&handle.0)
            .map(|_| ())
            .ok_or(StorageError::InvalidHandle)
    }

    async fn size(&self, handle: FileHandle) -> u64 {
        let inner = self.inner.lock();
        inner
            .open
            .get(&handle.0)
            .and_then(|name| inner.files.get(name))
            .map_or(0, |data| data.len() as u64)
    }

    async fn free_space(&self) -> Result<VolumeSpace, StorageError> {
        let inner = self.inner.lock();
        if !inner.mounted {
            return Err(StorageError::NotMounted);
        }
        Ok(VolumeSpace {
            total_bytes: inner.capacity,
            free_bytes: inner.capacity.saturating_sub(inner.used()),
        })
    }

    async fn list_files(&self) -> Result<Vec<String>, StorageError> {
        let inner = self.inner.lock();
        if !inner.mounted {
            return Err(StorageError::NotMounted);
        }
        let mut names: Vec<String> = inner.files.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analog_engine_queues_one_scan_per_trigger() {
        let mut engine = MockAnalogEngine::new();
        engine.configure(&[1, 2]);
        engine.set_results(&[7, 8]);
        engine.trigger();
        engine.trigger();

        assert_eq!(engine.take_completion(), Some(vec![7, 8]));
        assert_eq!(engine.take_completion(), Some(vec![7, 8]));
        assert_eq!(engine.take_completion(), None);
    }

    #[test]
    fn serial_link_answers_from_register_map() {
        let mut link = MockSerialLink::new();
        link.set_register(0x06, 0x42);
        link.send_byte(0x06 << 2).unwrap();
        assert_eq!(link.take_completion(), Some(0x42));

        link.refuse_next_sends(1);
        assert_eq!(link.send_byte(0x18), Err(SerialBusy));
        assert_eq!(link.sent(), vec![0x18]);
    }

    #[tokio::test]
    async fn volume_injects_faults_then_recovers() {
        let mut volume = MockVolume::new();
        volume.fail_next(FaultPoint::Mount, 1);

        assert!(volume.mount().await.is_err());
        volume.mount().await.unwrap();

        let handle = volume
            .open("data.log", OpenMode::ReadWriteCreateAlways)
            .await
            .unwrap();
        assert_eq!(volume.write(handle, &[1, 2, 3]).await.unwrap(), 3);
        assert_eq!(volume.size(handle).await, 3);
        volume.close(handle).await.unwrap();

        assert_eq!(volume.file("data.log"), Some(vec![1, 2, 3]));
        assert_eq!(volume.open_files(), 0);
    }

    #[tokio::test]
    async fn volume_refuses_writes_past_capacity() {
        let mut volume = MockVolume::with_capacity(4);
        volume.mount().await.unwrap();
        let handle = volume
            .open("data.log", OpenMode::ReadWriteCreateAlways)
            .await
            .unwrap();

        assert!(matches!(
            volume.write(handle, &[0; 5]).await,
            Err(StorageError::DiskFull)
        ));
    }
}
