//! Single-producer/single-consumer byte ring for staging sample records.
//!
//! The sample scheduler (interrupt context) appends serialized records and the
//! storage consumer (main loop) drains them in storage-block sized chunks. The
//! two indices are the only synchronization: the producer is the sole writer of
//! `head`, the consumer the sole writer of `tail`.
//!
//! # Features
//! - Lock-free, bounded-time operations (at most two memory copies per call)
//! - Overflow is rejected whole, never partially written
//! - Sticky overflow flag, cleared only by the consumer
//!
//! # Index Layout
//! ```text
//! head: AtomicUsize   (free-running write counter, producer-owned)
//! tail: AtomicUsize   (free-running read counter, consumer-owned)
//! position = counter & (capacity - 1)
//! used     = head - tail (wrapping)
//! ```
//!
//! Because the counters are free-running rather than pre-masked, `used` ranges
//! over `0..=capacity` and the ring can hold exactly `capacity` bytes; a full
//! ring is never mistaken for an empty one.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::error::{AppResult, LoggerError};

/// Reasons a [`BufferProducer::write`] was rejected.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferError {
    /// A single write may never reach the total capacity.
    #[error("write of {len} bytes can never fit a {capacity}-byte ring")]
    TooLarge { len: usize, capacity: usize },

    /// Not enough free space right now; the record was dropped.
    #[error("ring overflow: {requested} bytes requested, {free} free")]
    Overflow { requested: usize, free: usize },
}

/// Shared state behind the producer and consumer handles.
///
/// # Safety
/// Byte storage lives in `UnsafeCell`s and is accessed through raw pointers.
/// This is sound because:
/// - Only one [`BufferProducer`] and one [`BufferConsumer`] exist per ring
/// - The producer writes only the free region `[head, tail + capacity)`
/// - The consumer reads only the filled region `[tail, head)`
/// - The producer publishes `head` with Release after copying; the consumer
///   loads it with Acquire before copying (and symmetrically for `tail`)
pub struct CircularByteBuffer {
    storage: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
    overflow: AtomicBool,
}

// SAFETY: see the type-level documentation. Each byte is touched by at most one
// side at a time, and ownership of a region changes hands only through the
// Release/Acquire pairs on `head` and `tail`.
unsafe impl Sync for CircularByteBuffer {}

impl CircularByteBuffer {
    /// Create a ring of `capacity` bytes, split into its two endpoints.
    ///
    /// `capacity` must be a non-zero power of two.
    ///
    /// # Example
    /// ```
    /// use ev_logger::data::ring_buffer::CircularByteBuffer;
    ///
    /// let (mut tx, mut rx) = CircularByteBuffer::split(2048).unwrap();
    /// tx.write(b"sample").unwrap();
    /// let mut out = [0u8; 16];
    /// assert_eq!(rx.read(&mut out), 6);
    /// assert_eq!(&out[..6], b"sample");
    /// ```
    pub fn split(capacity: usize) -> AppResult<(BufferProducer, BufferConsumer)> {
        if capacity == 0 || !capacity.is_power_of_two() {
            return Err(LoggerError::InvalidCapacity(capacity));
        }

        let storage = (0..capacity).map(|_| UnsafeCell::new(0u8)).collect();
        let ring = Arc::new(Self {
            storage,
            capacity,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
            overflow: AtomicBool::new(false),
        });

        Ok((
            BufferProducer {
                ring: Arc::clone(&ring),
            },
            BufferConsumer { ring },
        ))
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently buffered.
    pub fn used(&self) -> usize {
        let head = self.head.load(Ordering::Acquire);
        let tail = self.tail.load(Ordering::Acquire);
        head.wrapping_sub(tail).min(self.capacity)
    }

    /// Bytes that can be written before the ring is full.
    pub fn free(&self) -> usize {
        self.capacity - self.used()
    }

    /// Whether a write has been rejected since the flag was last cleared.
    pub fn is_overflowed(&self) -> bool {
        self.overflow.load(Ordering::Acquire)
    }

    /// Fill percentage, rounded down.
    pub fn fill_percent(&self) -> u8 {
        ((self.used() * 100) / self.capacity) as u8
    }

    fn data_ptr(&self) -> *mut u8 {
        UnsafeCell::raw_get(self.storage.as_ptr())
    }
}

/// Write endpoint, owned by the sample scheduler.
pub struct BufferProducer {
    ring: Arc<CircularByteBuffer>,
}

impl BufferProducer {
    /// Append `data` as one unit.
    ///
    /// Rejects with [`BufferError::TooLarge`] when `data` could never fit, and
    /// with [`BufferError::Overflow`] (setting the sticky flag) when it does
    /// not fit right now. A rejected write leaves contents and indices alone.
    pub fn write(&mut self, data: &[u8]) -> Result<(), BufferError> {
        let ring = &*self.ring;
        let len = data.len();

        if len >= ring.capacity {
            return Err(BufferError::TooLarge {
                len,
                capacity: ring.capacity,
            });
        }

        let head = ring.head.load(Ordering::Relaxed);
        let tail = ring.tail.load(Ordering::Acquire);
        let free = ring.capacity - head.wrapping_sub(tail).min(ring.capacity);

        if free < len {
            ring.overflow.store(true, Ordering::Release);
            return Err(BufferError::Overflow {
                requested: len,
                free,
            });
        }

        let start = head & ring.mask;
        let first = len.min(ring.capacity - start);

        // SAFETY: `[start, start + first)` and `[0, len - first)` lie inside the
        // storage slice and inside the free region, which the consumer does not
        // read until `head` is published below.
        unsafe {
            let base = ring.data_ptr();
            std::ptr::copy_nonoverlapping(data.as_ptr(), base.add(start), first);
            std::ptr::copy_nonoverlapping(data.as_ptr().add(first), base, len - first);
        }

        ring.head.store(head.wrapping_add(len), Ordering::Release);
        Ok(())
    }

    /// Bytes currently buffered.
    pub fn used(&self) -> usize {
        self.ring.used()
    }

    /// Bytes that can be written before the ring is full.
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.ring.capacity
    }

    /// Whether the sticky overflow flag is set.
    pub fn is_overflowed(&self) -> bool {
        self.ring.is_overflowed()
    }
}

/// Read endpoint, owned by the storage consumer.
pub struct BufferConsumer {
    ring: Arc<CircularByteBuffer>,
}

impl BufferConsumer {
    /// Move up to `dst.len()` buffered bytes into `dst`.
    ///
    /// Partial reads are normal: the count is clamped to what is buffered.
    /// Returns the number of bytes copied.
    pub fn read(&mut self, dst: &mut [u8]) -> usize {
        let ring = &*self.ring;

        let tail = ring.tail.load(Ordering::Relaxed);
        let head = ring.head.load(Ordering::Acquire);
        let len = dst.len().min(head.wrapping_sub(tail).min(ring.capacity));

        if len == 0 {
            return 0;
        }

        let start = tail & ring.mask;
        let first = len.min(ring.capacity - start);

        // SAFETY: `[tail, tail + len)` was published by the producer's Release
        // store of `head`; it will not be overwritten until `tail` moves past it.
        unsafe {
            let base = ring.data_ptr();
            std::ptr::copy_nonoverlapping(base.add(start), dst.as_mut_ptr(), first);
            std::ptr::copy_nonoverlapping(base, dst.as_mut_ptr().add(first), len - first);
        }

        ring.tail.store(tail.wrapping_add(len), Ordering::Release);
        len
    }

    /// Empty the ring and clear the overflow flag.
    ///
    /// Discards by moving `tail` up to `head`, so the producer-owned index is
    /// never written from this side. Call only while capture is stopped.
    pub fn reset(&mut self) {
        let head = self.ring.head.load(Ordering::Acquire);
        self.ring.tail.store(head, Ordering::Release);
        self.clear_overflow();
    }

    /// Acknowledge a previous overflow (start of a new capture session).
    pub fn clear_overflow(&mut self) {
        self.ring.overflow.store(false, Ordering::Release);
    }

    /// Bytes currently buffered.
    pub fn used(&self) -> usize {
        self.ring.used()
    }

    /// Bytes that can be written before the ring is full.
    pub fn free(&self) -> usize {
        self.ring.free()
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.ring.capacity
    }

    /// Whether the sticky overflow flag is set.
    pub fn is_overflowed(&self) -> bool {
        self.ring.is_overflowed()
    }

    /// Fill percentage, rounded down.
    pub fn fill_percent(&self) -> u8 {
        self.ring.fill_percent()
    }
}
