//! Main-loop and button-side logic: shared capture flags, the logging control
//! state machine, the storage consumer and the status screen.
pub mod control;
pub mod state;
pub mod status;
pub mod storage;

pub use control::{Button, LoggingControlFsm, LoggingState};
pub use state::RunningState;
pub use storage::{StepOutcome, StorageConsumer};
