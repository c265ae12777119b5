//! System tick source.
//!
//! [`TickClock`] is the wrapping millisecond counter every context reads.
//! [`SystemTick`] owns it on the tick side, advancing it once per millisecond
//! and running the actions registered in its [`PeriodicHooks`] table.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use crate::hardware::capabilities::MonotonicClock;

/// Wrapping millisecond counter, cheap to clone and share.
#[derive(Debug, Clone, Default)]
pub struct TickClock {
    millis: Arc<AtomicU32>,
}

impl TickClock {
    /// Counter at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Counter starting at `millis` (handy for exercising wraparound).
    pub fn starting_at(millis: u32) -> Self {
        Self {
            millis: Arc::new(AtomicU32::new(millis)),
        }
    }

    /// Advance by `millis`, wrapping. Returns the new value.
    pub fn advance(&self, millis: u32) -> u32 {
        self.millis
            .fetch_add(millis, Ordering::AcqRel)
            .wrapping_add(millis)
    }
}

impl MonotonicClock for TickClock {
    fn now_millis(&self) -> u32 {
        self.millis.load(Ordering::Acquire)
    }
}

/// Dispatch periods supported by the hook table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    TenMillis,
    HundredMillis,
    OneSecond,
}

impl Period {
    const ALL: [Period; 3] = [Period::TenMillis, Period::HundredMillis, Period::OneSecond];

    /// Length of the period in milliseconds.
    pub const fn millis(self) -> u32 {
        match self {
            Period::TenMillis => 10,
            Period::HundredMillis => 100,
            Period::OneSecond => 1_000,
        }
    }

    const fn slot(self) -> usize {
        match self {
            Period::TenMillis => 0,
            Period::HundredMillis => 1,
            Period::OneSecond => 2,
        }
    }
}

/// Action run from the tick context; receives the current millisecond count.
pub type Hook = Box<dyn FnMut(u32) + Send>;

/// One hook per period, each with its own millisecond countdown.
///
/// Cadence stays regular when the millisecond counter wraps.
pub struct PeriodicHooks {
    table: [Option<Hook>; 3],
    remaining: [u32; 3],
}

impl Default for PeriodicHooks {
    fn default() -> Self {
        Self {
            table: [None, None, None],
            remaining: Period::ALL.map(Period::millis),
        }
    }
}

impl PeriodicHooks {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `hook` to `period`, returning whatever was bound before.
    pub fn register(&mut self, period: Period, hook: Hook) -> Option<Hook> {
        self.table[period.slot()].replace(hook)
    }

    /// Unbind the hook for `period`.
    pub fn clear(&mut self, period: Period) -> Option<Hook> {
        self.table[period.slot()].take()
    }

    /// Account for one elapsed millisecond and run every hook that fell due.
    ///
    /// Must be called exactly once per millisecond; `now` is only passed
    /// through to the hooks.
    pub fn dispatch(&mut self, now: u32) {
        for period in Period::ALL {
            let slot = period.slot();
            self.remaining[slot] -= 1;
            if self.remaining[slot] != 0 {
                continue;
            }
            self.remaining[slot] = period.millis();
            if let Some(hook) = self.table[slot].as_mut() {
                hook(now);
            }
        }
    }
}

/// The 1 ms system tick: advances the clock, then runs due hooks.
pub struct SystemTick {
    clock: TickClock,
    hooks: PeriodicHooks,
}

impl SystemTick {
    /// Tick source driving `clock`.
    pub fn new(clock: TickClock) -> Self {
        Self {
            clock,
            hooks: PeriodicHooks::new(),
        }
    }

    /// Hook table, for registration.
    pub fn hooks_mut(&mut self) -> &mut PeriodicHooks {
        &mut self.hooks
    }

    /// The clock this source advances.
    pub fn clock(&self) -> &TickClock {
        &self.clock
    }

    /// One millisecond elapsed.
    pub fn tick(&mut self) -> u32 {
        let now = self.clock.advance(1);
        self.hooks.dispatch(now);
        now
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn clock_wraps() {
        let clock = TickClock::starting_at(u32::MAX - 1);
        assert_eq!(clock.advance(3), 1);
        assert_eq!(clock.now_millis(), 1);
    }

    #[test]
    fn hooks_fire_on_their_period() {
        let fast = Arc::new(AtomicUsize::new(0));
        let slow = Arc::new(AtomicUsize::new(0));

        let mut tick = SystemTick::new(TickClock::new());
        let counter = Arc::clone(&fast);
        tick.hooks_mut().register(
            Period::TenMillis,
            Box::new(move |_: u32| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );
        let counter = Arc::clone(&slow);
        tick.hooks_mut().register(
            Period::OneSecond,
            Box::new(move |_: u32| {
                counter.fetch_add(1, Ordering::Relaxed);
            }),
        );

        for _ in 0..2_000 {
            tick.tick();
        }

        assert_eq!(fast.load(Ordering::Relaxed), 200);
        assert_eq!(slow.load(Ordering::Relaxed), 2);
        assert_eq!(tick.clock().now_millis(), 2_000);
    }

    #[test]
    fn hooks_keep_cadence_across_wrap() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));

        let mut tick = SystemTick::new(TickClock::starting_at(u32::MAX - 14));
        let log = Arc::clone(&seen);
        tick.hooks_mut().register(
            Period::TenMillis,
            Box::new(move |now: u32| log.lock().push(now)),
        );

        for _ in 0..40 {
            tick.tick();
        }

        let seen = seen.lock();
        assert_eq!(seen.len(), 4);
        assert!(seen.windows(2).all(|w| w[1].wrapping_sub(w[0]) == 10));
    }

    #[test]
    fn register_replaces_previous_hook() {
        let mut hooks = PeriodicHooks::new();
        assert!(hooks.register(Period::HundredMillis, Box::new(|_: u32| {})).is_none());
        assert!(hooks.register(Period::HundredMillis, Box::new(|_: u32| {})).is_some());
        assert!(hooks.clear(Period::HundredMillis).is_some());
        assert!(hooks.clear(Period::HundredMillis).is_none());
    }
}
