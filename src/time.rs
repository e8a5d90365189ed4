//! Coarse-grained "relative time" (spec.md §3, §4.6).
//!
//! Time is tracked in whole seconds since the clock was created, updated by
//! a single `tick()` call the event loop is expected to make once per pass
//! — no syscall is issued by `now()`. This mirrors the teacher's pattern of
//! a process-wide monotonic counter (`stats.rs`'s `AtomicU64` counters) but
//! scoped to one [`Clock`] value instead of a module-level static, per the
//! "single owned Engine value" guidance in spec.md §9.

use core::sync::atomic::{AtomicU32, Ordering};
use std::time::Instant;

/// Timestamps at or above this value are interpreted as absolute Unix time;
/// below it, as a relative number of seconds added to process start. This
/// mirrors memcached's `REALTIME_MAXDELTA` convention (60 days in seconds).
pub const REL_TIME_MAXDELTA: u32 = 60 * 60 * 24 * 60;

/// A process-wide coarse clock: whole seconds since `Clock::new()`.
pub struct Clock {
    started_at: Instant,
    epoch_at_start: u32,
    /// Cached "now" in relative seconds, advanced by `tick()`.
    rel_now: AtomicU32,
}

impl Clock {
    /// Create a clock. `epoch_at_start` is the Unix time (seconds) at the
    /// moment of construction — callers without a wall clock may pass 0,
    /// which disables absolute-timestamp interpretation (every `expire_at`
    /// is then treated as relative).
    pub fn new(epoch_at_start: u32) -> Self {
        Self {
            started_at: Instant::now(),
            epoch_at_start,
            rel_now: AtomicU32::new(0),
        }
    }

    /// Advance the cached "now" from the real monotonic clock. Call this
    /// once per event-loop pass; `now()` performs no syscall.
    pub fn tick(&self) {
        let elapsed = self.started_at.elapsed().as_secs() as u32;
        self.rel_now.store(elapsed, Ordering::Relaxed);
    }

    /// Relative seconds since the clock was created.
    #[inline]
    pub fn now(&self) -> u32 {
        self.rel_now.load(Ordering::Relaxed)
    }

    /// Resolve a client-supplied expiry value to relative seconds, per
    /// spec.md §4.6: values `< REL_TIME_MAXDELTA` are relative offsets from
    /// now; values `>= REL_TIME_MAXDELTA` are absolute Unix timestamps and
    /// are rebased onto this clock's relative timeline. `0` means "no
    /// expiry" and is passed through unchanged.
    pub fn normalize_expiry(&self, raw: u32) -> u32 {
        if raw == 0 {
            return 0;
        }
        if raw < REL_TIME_MAXDELTA {
            self.now().saturating_add(raw)
        } else {
            // Absolute epoch time; rebase onto our relative timeline.
            raw.saturating_sub(self.epoch_at_start)
        }
    }
}
