//! Interrupt-context acquisition: analog scan, accelerometer exchange, and the
//! fixed-rate scheduler that hands finished cycles to the ring buffer.
pub mod accel;
pub mod analog;
pub mod scheduler;

pub use accel::{AccelAcquisitionFsm, AccelState};
pub use analog::AnalogAcquisition;
pub use scheduler::{AcquisitionCounters, AcquisitionStats, SampleScheduler};
