//! Board Collaborators
//!
//! Capability traits the logger core is written against, plus the host-side
//! implementations: a tick clock with periodic hooks, a text display, a
//! directory-backed volume and instrumented mocks.

pub mod capabilities;
pub mod clock;
pub mod display;
pub mod host_fs;
pub mod mock;

pub use capabilities::{
    AnalogConversionEngine, FileHandle, MonotonicClock, OpenMode, PersistentFile, SampleTimer,
    SerialTransferEngine, StatusDisplay, VolumeSpace,
};
pub use clock::{Period, PeriodicHooks, SystemTick, TickClock};
pub use display::TextDisplay;
pub use host_fs::HostVolume;
