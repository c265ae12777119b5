//! Sample records and the buffering between acquisition and storage.
pub mod record;
pub mod ring_buffer;
pub mod sample;
