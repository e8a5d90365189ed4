//! Cache-wide counters.
//!
//! All counters use `Relaxed` ordering — they are observational only and are
//! not used as synchronization primitives. The single-threaded worker that
//! owns the slab region and hash index provides the real ordering guarantees
//! (spec.md §5); these counters exist purely so an admin thread can read a
//! [`Snapshot`] without locking the worker's state.

use core::sync::atomic::{AtomicU64, Ordering};

#[derive(Default)]
pub struct Stats {
    /// Items currently linked into the hash index.
    pub curr_items: AtomicU64,
    /// Total `item_insert` calls that linked a new item.
    pub total_items: AtomicU64,
    /// `item_get` calls that found a live, unexpired item.
    pub get_hits: AtomicU64,
    /// `item_get` calls that found nothing (absent, expired, or flushed).
    pub get_misses: AtomicU64,
    /// Items unlinked because `_item_expired` was true on access.
    pub expired_unlinks: AtomicU64,
    /// Items unlinked by `item_flush` becoming visible on next access.
    pub flushed_unlinks: AtomicU64,
    /// `item_delete` calls that found and removed an item.
    pub deletes: AtomicU64,
    /// Slabs carved from the reserve.
    pub slabs_carved: AtomicU64,
    /// Times `slab_get_item` evicted a slab to satisfy a request.
    pub slab_evictions: AtomicU64,
    /// Times `slab_get_item` returned `ENOMEM` (no free slot, no eviction).
    pub slab_oom: AtomicU64,
    /// Requests rejected as `OVERSIZED`.
    pub oversized: AtomicU64,
    /// `item_annex` calls that took the in-place fast path.
    pub annex_in_place: AtomicU64,
    /// `item_annex` calls that reallocated into a new class.
    pub annex_realloc: AtomicU64,
    /// Bytes parsed by the protocol codecs (requests only).
    pub bytes_parsed: AtomicU64,
    /// Bytes written by the protocol composers (responses only).
    pub bytes_composed: AtomicU64,
    /// Parser calls that returned `INVALID`.
    pub parse_invalid: AtomicU64,
}

impl Stats {
    pub const fn new() -> Self {
        Self {
            curr_items: AtomicU64::new(0),
            total_items: AtomicU64::new(0),
            get_hits: AtomicU64::new(0),
            get_misses: AtomicU64::new(0),
            expired_unlinks: AtomicU64::new(0),
            flushed_unlinks: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            slabs_carved: AtomicU64::new(0),
            slab_evictions: AtomicU64::new(0),
            slab_oom: AtomicU64::new(0),
            oversized: AtomicU64::new(0),
            annex_in_place: AtomicU64::new(0),
            annex_realloc: AtomicU64::new(0),
            bytes_parsed: AtomicU64::new(0),
            bytes_composed: AtomicU64::new(0),
            parse_invalid: AtomicU64::new(0),
        }
    }

    #[inline]
    pub(crate) fn inc(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn add(counter: &AtomicU64, val: u64) {
        counter.fetch_add(val, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn dec(counter: &AtomicU64) {
        counter.fetch_sub(1, Ordering::Relaxed);
    }

    /// Take a point-in-time snapshot. Individual fields are each atomically
    /// read, but the snapshot as a whole is not globally consistent with
    /// itself under concurrent admin reads — sufficient for monitoring.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            curr_items: self.curr_items.load(Ordering::Relaxed),
            total_items: self.total_items.load(Ordering::Relaxed),
            get_hits: self.get_hits.load(Ordering::Relaxed),
            get_misses: self.get_misses.load(Ordering::Relaxed),
            expired_unlinks: self.expired_unlinks.load(Ordering::Relaxed),
            flushed_unlinks: self.flushed_unlinks.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            slabs_carved: self.slabs_carved.load(Ordering::Relaxed),
            slab_evictions: self.slab_evictions.load(Ordering::Relaxed),
            slab_oom: self.slab_oom.load(Ordering::Relaxed),
            oversized: self.oversized.load(Ordering::Relaxed),
            annex_in_place: self.annex_in_place.load(Ordering::Relaxed),
            annex_realloc: self.annex_realloc.load(Ordering::Relaxed),
            bytes_parsed: self.bytes_parsed.load(Ordering::Relaxed),
            bytes_composed: self.bytes_composed.load(Ordering::Relaxed),
            parse_invalid: self.parse_invalid.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time copy of [`Stats`], safe to hand to an admin/stats plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub curr_items: u64,
    pub total_items: u64,
    pub get_hits: u64,
    pub get_misses: u64,
    pub expired_unlinks: u64,
    pub flushed_unlinks: u64,
    pub deletes: u64,
    pub slabs_carved: u64,
    pub slab_evictions: u64,
    pub slab_oom: u64,
    pub oversized: u64,
    pub annex_in_place: u64,
    pub annex_realloc: u64,
    pub bytes_parsed: u64,
    pub bytes_composed: u64,
    pub parse_invalid: u64,
}
