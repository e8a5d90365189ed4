//! The storage engine (spec.md §4.3, §5): owns the slab allocator, the hash
//! index, the clock, and the CAS/flush state, and implements the item
//! lifecycle operations. This is the single owned value spec.md §9 asks for
//! in place of the teacher's module-level statics — an embedder constructs
//! one `Cache` and holds it for the process lifetime.

use crate::config::Config;
use crate::error::CoreError;
use crate::hash::HashIndex;
use crate::item::{ItemData, ItemHandle};
use crate::slab::{Acquire, SlabAllocator};
use crate::stats::Stats;
use crate::time::Clock;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

/// Admin-plane state touched outside the worker's exclusive ownership of the
/// slab/hash structures (spec.md §5: "the admin thread only touches atomic
/// counters or coarse-mutex-gated state"). `flush_at` is read on every
/// lookup, so it is a plain mutex-guarded `u32` rather than something
/// requiring a full lock around every operation.
struct AdminState {
    flush_at: Mutex<u32>,
}

/// The storage engine: one instance per process, single-threaded access
/// from the worker (spec.md §5). `cas_counter` is the one field genuinely
/// shared with the admin plane in the original design and is kept atomic
/// accordingly, even though nothing here actually runs concurrently with
/// the worker yet.
pub struct Cache {
    slab: SlabAllocator,
    hash: HashIndex,
    clock: Clock,
    cas_counter: AtomicU64,
    admin: AdminState,
    use_cas: bool,
    stats: Stats,
}

/// What a successful [`Cache::item_get`] found.
pub struct GetResult {
    pub handle: ItemHandle,
    pub class_id: u32,
    pub data: ItemData,
}

impl Cache {
    /// Construct a cache per `config`, with the clock's epoch anchored at
    /// `epoch_at_start` (a Unix timestamp; pass 0 if the embedder has no
    /// wall clock available) — spec.md §4.3's `slab_setup`/engine `setup`.
    pub fn setup(config: &Config, epoch_at_start: u32) -> Self {
        Self {
            slab: SlabAllocator::new(config),
            hash: HashIndex::new(config.slab_hash_power),
            clock: Clock::new(epoch_at_start),
            cas_counter: AtomicU64::new(1),
            admin: AdminState { flush_at: Mutex::new(0) },
            use_cas: config.slab_use_cas,
            stats: Stats::new(),
        }
    }

    /// Advance the coarse clock. Call once per event-loop pass.
    pub fn tick(&self) {
        self.clock.tick();
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    fn flush_at(&self) -> u32 {
        *self.admin.flush_at.lock()
    }

    fn next_cas(&self) -> u64 {
        self.cas_counter.fetch_add(1, Ordering::Relaxed)
    }

    /// Resolve `key` to a live (non-expired) handle, or `None`. Lazily
    /// unlinks and recycles the slot if it's found but expired (spec.md
    /// §4.3's lazy-expiration rule).
    fn resolve_live(&mut self, key: &[u8]) -> Option<(ItemHandle, u32)> {
        let found = self.hash.get(key, &mut self.slab);
        let (handle, class_id) = found?;
        let now = self.clock.now();
        let flush_at = self.flush_at();
        let expired = self.slab.item_view(handle, class_id).is_expired(now, flush_at);
        if expired {
            self.unlink_and_release(key, handle, class_id, true);
            return None;
        }
        Some((handle, class_id))
    }

    fn unlink_and_release(&mut self, key: &[u8], handle: ItemHandle, class_id: u32, expired: bool) {
        self.hash.delete(key, handle, &mut self.slab);
        self.slab.release_slot(handle, class_id);
        Stats::dec(&self.stats.curr_items);
        if expired {
            Stats::inc(&self.stats.expired_unlinks);
        }
    }

    /// `item_get` (spec.md §4.3): look up `key`, returning an owned copy of
    /// its data. Updates the LRU position when the eviction policy is LRU.
    pub fn item_get(&mut self, key: &[u8]) -> Option<GetResult> {
        let Some((handle, class_id)) = self.resolve_live(key) else {
            Stats::inc(&self.stats.get_misses);
            return None;
        };
        self.slab.touch_lru(handle, class_id);
        let data = self.slab.item_view(handle, class_id).to_owned_data();
        Stats::inc(&self.stats.get_hits);
        Some(GetResult { handle, class_id, data })
    }

    /// Allocate (possibly evicting) a slot for `class_id`, driving the
    /// allocator's evict-and-retry handshake: on `Acquire::Evict`, unlink
    /// every handle the victim slab holds from the hash index, reclaim the
    /// slab for `class_id`, and retry (spec.md §4.1).
    fn acquire(&mut self, class_id: u32) -> Result<ItemHandle, CoreError> {
        loop {
            match self.slab.acquire_slot(class_id) {
                Acquire::Ready(h) => return Ok(h),
                Acquire::Oom => return Err(CoreError::Enomem),
                Acquire::Evict(slab_idx) => {
                    let unlinked = self.hash.unlink_slab(slab_idx, &mut self.slab);
                    for _ in 0..unlinked {
                        Stats::dec(&self.stats.curr_items);
                    }
                    self.slab.reclaim_slab(slab_idx, class_id);
                    Stats::inc(&self.stats.slab_evictions);
                }
            }
        }
    }

    /// Unconditional store (spec.md's `set`): insert or overwrite `key`. Takes
    /// the in-place `item_update` path when the new value still fits the
    /// live item's current class, falling back to unlink-and-reallocate
    /// otherwise (spec.md §4.3).
    pub fn item_set(&mut self, key: &[u8], value: &[u8], dataflag: u32, raw_expire: u32) -> Result<(), CoreError> {
        if let Some((old_handle, old_class)) = self.resolve_live(key) {
            if self.slab.class_for(key.len(), value.len()) == Ok(old_class) {
                return self.item_update(old_handle, old_class, value, dataflag, raw_expire);
            }
            self.unlink_and_release(key, old_handle, old_class, false);
        }
        self.store_new(key, value, dataflag, raw_expire, false)
    }

    /// `item_update` (spec.md §4.3): overwrite a live item's value in place
    /// without unlinking it, when `item_slabid(klen, value.len()) == it.id`
    /// still holds for the new value — avoids the free-queue round trip
    /// `item_set` otherwise pays on every overwrite. Bumps CAS like any other
    /// store.
    fn item_update(&mut self, handle: ItemHandle, class_id: u32, value: &[u8], dataflag: u32, raw_expire: u32) -> Result<(), CoreError> {
        let now = self.clock.now();
        let expire_at = self.clock.normalize_expiry(raw_expire);
        let cas = if self.use_cas { self.next_cas() } else { 0 };
        self.slab.item_view(handle, class_id).overwrite(value, dataflag, expire_at, now, cas)?;
        self.slab.touch_lru(handle, class_id);
        Stats::inc(&self.stats.total_items);
        Ok(())
    }

    /// `add` (spec.md's conditional insert): fails with `NotStored` if `key`
    /// already has a live value.
    pub fn item_add(&mut self, key: &[u8], value: &[u8], dataflag: u32, raw_expire: u32) -> Result<(), CoreError> {
        if self.resolve_live(key).is_some() {
            return Err(CoreError::NotStored);
        }
        self.store_new(key, value, dataflag, raw_expire, false)
    }

    /// `replace`: fails with `NotStored` if `key` has no live value.
    pub fn item_replace(&mut self, key: &[u8], value: &[u8], dataflag: u32, raw_expire: u32) -> Result<(), CoreError> {
        let (old_handle, old_class) = self.resolve_live(key).ok_or(CoreError::NotStored)?;
        self.unlink_and_release(key, old_handle, old_class, false);
        self.store_new(key, value, dataflag, raw_expire, false)
    }

    /// `cas`: like `item_set`, but fails with `CoreError::Exists` if the
    /// live item's CAS does not match `cas`, or `NotFound` if there is none.
    pub fn item_cas(&mut self, key: &[u8], value: &[u8], dataflag: u32, raw_expire: u32, cas: u64) -> Result<(), CoreError> {
        let (old_handle, old_class) = self.resolve_live(key).ok_or(CoreError::NotFound)?;
        let current = self.slab.item_view(old_handle, old_class).cas();
        if current != Some(cas) {
            return Err(CoreError::Exists);
        }
        self.unlink_and_release(key, old_handle, old_class, false);
        self.store_new(key, value, dataflag, raw_expire, false)
    }

    fn store_new(&mut self, key: &[u8], value: &[u8], dataflag: u32, raw_expire: u32, raligned: bool) -> Result<(), CoreError> {
        let class_id = self.slab.class_for(key.len(), value.len())?;
        let handle = self.acquire(class_id)?;
        let now = self.clock.now();
        let expire_at = self.clock.normalize_expiry(raw_expire);
        let cas = if self.use_cas { self.next_cas() } else { 0 };
        self.slab.item_view(handle, class_id).init(key, value, dataflag, expire_at, now, cas, raligned)?;
        self.hash.put(key, handle, &mut self.slab, class_id);
        self.slab.touch_lru(handle, class_id);
        Stats::inc(&self.stats.curr_items);
        Stats::inc(&self.stats.total_items);
        Ok(())
    }

    /// `item_annex` (spec.md §4.3): append (`prepend = false`) or prepend
    /// bytes to an existing item's value, in place when the slot has spare
    /// capacity, falling back to a full reallocation into a (possibly
    /// larger) class otherwise.
    pub fn item_annex(&mut self, key: &[u8], extra: &[u8], prepend: bool) -> Result<(), CoreError> {
        let (handle, class_id) = self.resolve_live(key).ok_or(CoreError::NotStored)?;
        {
            let mut view = self.slab.item_view(handle, class_id);
            let done = if prepend { view.try_prepend_in_place(extra) } else { view.try_append_in_place(extra) };
            if done {
                Stats::inc(&self.stats.annex_in_place);
                return Ok(());
            }
        }
        Stats::inc(&self.stats.annex_realloc);
        let existing = self.slab.item_view(handle, class_id).to_owned_data();
        let new_value: Vec<u8> = if prepend {
            extra.iter().chain(existing.value.iter()).copied().collect()
        } else {
            existing.value.iter().chain(extra.iter()).copied().collect()
        };
        self.unlink_and_release(key, handle, class_id, false);
        self.store_new(key, &new_value, existing.meta.dataflag, 0, prepend)
    }

    /// `incr`/`decr` (spec.md §6.1/§6.2): parse the existing value as a
    /// base-10 `u64`, apply the delta, and store the result as the new
    /// value's ASCII decimal representation. Fails with `NotFound` if `key`
    /// has no live value, or `CoreError::NotStored` if the existing value
    /// does not parse as a `u64`.
    pub fn item_incr(&mut self, key: &[u8], delta: u64, negative: bool) -> Result<u64, CoreError> {
        let (handle, class_id) = self.resolve_live(key).ok_or(CoreError::NotFound)?;
        let data = self.slab.item_view(handle, class_id).to_owned_data();
        let current: u64 = std::str::from_utf8(&data.value)
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or(CoreError::NotStored)?;
        let updated = if negative { current.saturating_sub(delta) } else { current.saturating_add(delta) };
        self.unlink_and_release(key, handle, class_id, false);
        self.store_new(key, updated.to_string().as_bytes(), data.meta.dataflag, 0, false)?;
        Ok(updated)
    }

    /// `item_delete` (spec.md §4.3). Returns `NotFound` if `key` has no live
    /// value.
    pub fn item_delete(&mut self, key: &[u8]) -> Result<(), CoreError> {
        let (handle, class_id) = self.resolve_live(key).ok_or(CoreError::NotFound)?;
        self.unlink_and_release(key, handle, class_id, false);
        Stats::inc(&self.stats.deletes);
        Ok(())
    }

    /// `item_flush` (spec.md §4.3): lazily invalidate every item created at
    /// or before now, by raising `flush_at`. No item is touched immediately
    /// — the lazy-expiration check in `resolve_live` does the rest.
    pub fn item_flush(&self) {
        let now = self.clock.now();
        let mut flush_at = self.admin.flush_at.lock();
        if now > *flush_at {
            *flush_at = now;
        }
    }
}
