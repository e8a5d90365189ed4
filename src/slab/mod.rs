//! Slab storage (spec.md §3.1, §4.1): fixed-size classes, each owning a set
//! of slabs carved into equal-size item slots, with an optional free queue
//! and a configurable eviction policy.
//!
//! Items are addressed by [`crate::item::ItemHandle`], never by pointer —
//! the "safer target" redesign in spec.md §9. The allocator does not touch
//! the hash index: when it needs to evict, it names the victim slab and
//! lets [`crate::engine::Cache`] — which owns both the allocator and the
//! index — unlink everything that slab held before it is repurposed.

pub mod size_class;

use crate::config::{Config, EvictOpt};
use crate::error::CoreError;
use crate::item::{hdr_size, item_size, ItemHandle, ItemView};
use size_class::{SlabClassTable, INVALID_ID};
use std::collections::VecDeque;

struct Slab {
    class_id: u32,
    data: Vec<u8>,
}

/// Per-class bookkeeping: the slabs this class owns, the free queue of
/// recycled slots, the partially-carved slab, and (when `slab_evict_opt =
/// lru`) an LRU ordering over live handles.
struct ClassState {
    slab_indices: Vec<u32>,
    free_queue: Vec<ItemHandle>,
    partial_slab: Option<u32>,
    next_slot: u32,
    lru: VecDeque<ItemHandle>,
}

impl ClassState {
    fn new() -> Self {
        Self { slab_indices: Vec::new(), free_queue: Vec::new(), partial_slab: None, next_slot: 0, lru: VecDeque::new() }
    }
}

/// Result of [`SlabAllocator::acquire_slot`]: either a ready slot, or a
/// request that the caller evict a specific slab and retry.
pub enum Acquire {
    Ready(ItemHandle),
    Evict(u32),
    Oom,
}

pub struct SlabAllocator {
    classes: SlabClassTable,
    states: Vec<ClassState>,
    slabs: Vec<Slab>,
    slab_bytes: usize,
    slab_hdr_size: usize,
    maxbytes: usize,
    bytes_used: usize,
    use_freeq: bool,
    use_cas: bool,
    evict_opt: EvictOpt,
}

/// Bytes reserved at the front of every slab for its own header (id is
/// implicit in the `Vec` index, so this only needs to keep classes from
/// sizing items into the last few bytes of a slab).
const SLAB_HDR_SIZE: usize = 16;

impl SlabAllocator {
    pub fn new(config: &Config) -> Self {
        let profile = config.default_profile();
        let classes = SlabClassTable::new(&profile, config.slab_size, SLAB_HDR_SIZE);
        let n = classes.last_id() as usize;
        let mut allocator = Self {
            states: (0..=n).map(|_| ClassState::new()).collect(),
            classes,
            slabs: Vec::new(),
            slab_bytes: config.slab_size,
            slab_hdr_size: SLAB_HDR_SIZE,
            maxbytes: config.slab_maxbytes,
            bytes_used: 0,
            use_freeq: config.slab_use_freeq,
            use_cas: config.slab_use_cas,
            evict_opt: config.slab_evict_opt,
        };
        if config.slab_prealloc {
            allocator.prealloc_all_classes();
        }
        allocator
    }

    /// Carve one slab per class up front, subject to `maxbytes` (spec.md
    /// §4.1 "Preallocation"). Stops silently once the budget runs out —
    /// prealloc is a best-effort warm start, not a hard requirement that
    /// every class gets a slab.
    fn prealloc_all_classes(&mut self) {
        for class_id in 0..self.states.len() as u32 {
            match self.carve_new_slab(class_id) {
                Some(slab_idx) => {
                    self.states[class_id as usize].partial_slab = Some(slab_idx);
                    self.states[class_id as usize].next_slot = 0;
                }
                None => break,
            }
        }
    }

    #[inline]
    pub fn hdr_size(&self) -> usize {
        hdr_size(self.use_cas)
    }

    /// Class id for an item with the given key/value lengths, or
    /// [`CoreError::Oversized`] if none fits (spec.md §4.1).
    pub fn class_for(&self, klen: usize, vlen: usize) -> Result<u32, CoreError> {
        let needed = item_size(self.hdr_size(), klen, vlen);
        let id = self.classes.class_for(needed);
        if id == INVALID_ID { Err(CoreError::Oversized) } else { Ok(id) }
    }

    fn carve_new_slab(&mut self, class_id: u32) -> Option<u32> {
        if self.bytes_used + self.slab_bytes > self.maxbytes {
            return None;
        }
        self.slabs.push(Slab { class_id, data: vec![0u8; self.slab_bytes] });
        self.bytes_used += self.slab_bytes;
        let idx = (self.slabs.len() - 1) as u32;
        self.states[class_id as usize].slab_indices.push(idx);
        tracing::trace!(class_id, slab_idx = idx, "carved new slab");
        Some(idx)
    }

    /// Acquire a slot for `class_id`, preferring (in order): the free queue,
    /// the current partial slab, a freshly carved slab, then eviction
    /// per the configured policy (spec.md §4.1).
    pub fn acquire_slot(&mut self, class_id: u32) -> Acquire {
        if self.use_freeq {
            if let Some(h) = self.states[class_id as usize].free_queue.pop() {
                return Acquire::Ready(h);
            }
        }

        let info = self.classes.info(class_id);
        if let Some(slab_idx) = self.states[class_id as usize].partial_slab {
            let next = self.states[class_id as usize].next_slot;
            if (next as usize) < info.items_per_slab {
                self.states[class_id as usize].next_slot += 1;
                return Acquire::Ready(ItemHandle { slab_idx, slot: next });
            }
            self.states[class_id as usize].partial_slab = None;
        }

        if let Some(slab_idx) = self.carve_new_slab(class_id) {
            self.states[class_id as usize].partial_slab = Some(slab_idx);
            self.states[class_id as usize].next_slot = 1;
            return Acquire::Ready(ItemHandle { slab_idx, slot: 0 });
        }

        let victim = match self.evict_opt {
            EvictOpt::None => None,
            EvictOpt::Random => self.pick_random_victim(class_id),
            EvictOpt::Lru => self.pick_lru_victim(class_id),
        };
        match victim {
            Some(slab_idx) => {
                tracing::debug!(class_id, slab_idx, policy = ?self.evict_opt, "evicting slab to satisfy acquire_slot");
                Acquire::Evict(slab_idx)
            }
            None => {
                tracing::warn!(class_id, "acquire_slot returning ENOMEM, no eviction candidate");
                Acquire::Oom
            }
        }
    }

    /// A uniformly random slab already owned by `class_id` (spec.md §4.1
    /// RANDOM policy: eviction is global to the class, not LRU-ordered).
    pub fn pick_random_victim(&self, class_id: u32) -> Option<u32> {
        let owned = &self.states[class_id as usize].slab_indices;
        if owned.is_empty() {
            return None;
        }
        Some(owned[fastrand::usize(..owned.len())])
    }

    /// The least-recently-touched live handle's slab, for `class_id`
    /// (spec.md §4.1 LRU policy). Returns `None` if the class has no
    /// tracked handles yet.
    pub fn pick_lru_victim(&self, class_id: u32) -> Option<u32> {
        self.states[class_id as usize].lru.front().map(|h| h.slab_idx)
    }

    /// Record that `handle` was just touched (inserted or read), moving it
    /// to the most-recently-used end of its class's LRU list. A no-op when
    /// the configured eviction policy is not LRU.
    pub fn touch_lru(&mut self, handle: ItemHandle, class_id: u32) {
        if self.evict_opt != EvictOpt::Lru {
            return;
        }
        let lru = &mut self.states[class_id as usize].lru;
        if let Some(pos) = lru.iter().position(|h| *h == handle) {
            lru.remove(pos);
        }
        lru.push_back(handle);
    }

    pub fn forget_lru(&mut self, handle: ItemHandle, class_id: u32) {
        let lru = &mut self.states[class_id as usize].lru;
        if let Some(pos) = lru.iter().position(|h| *h == handle) {
            lru.remove(pos);
        }
    }

    pub fn class_of_slab(&self, slab_idx: u32) -> u32 {
        self.slabs[slab_idx as usize].class_id
    }

    /// Recycle a slot back onto its class's free queue after the item it
    /// held has been unlinked from the hash index (spec.md §4.3 delete).
    pub fn release_slot(&mut self, handle: ItemHandle, class_id: u32) {
        self.forget_lru(handle, class_id);
        if self.use_freeq {
            self.states[class_id as usize].free_queue.push(handle);
        }
    }

    /// Repurpose an evicted slab wholesale for `new_class_id`: drop it from
    /// its old class's bookkeeping, clear its contents, and adopt it as the
    /// new class's partial slab (spec.md §4.1: "Eviction ... unlinks every
    /// live item it contains ... before repurposing the slab").
    pub fn reclaim_slab(&mut self, slab_idx: u32, new_class_id: u32) {
        let old_class = self.slabs[slab_idx as usize].class_id;
        if let Some(pos) = self.states[old_class as usize].slab_indices.iter().position(|&i| i == slab_idx) {
            self.states[old_class as usize].slab_indices.remove(pos);
        }
        if self.states[old_class as usize].partial_slab == Some(slab_idx) {
            self.states[old_class as usize].partial_slab = None;
        }
        self.states[old_class as usize].lru.retain(|h| h.slab_idx != slab_idx);
        self.states[old_class as usize].free_queue.retain(|h| h.slab_idx != slab_idx);

        self.slabs[slab_idx as usize].class_id = new_class_id;
        self.slabs[slab_idx as usize].data.fill(0);
        self.states[new_class_id as usize].slab_indices.push(slab_idx);
        self.states[new_class_id as usize].partial_slab = Some(slab_idx);
        self.states[new_class_id as usize].next_slot = 0;
        tracing::debug!(slab_idx, old_class, new_class_id, "reclaimed slab into new class");
    }

    fn slot_range(&self, class_id: u32, slot: u32) -> (usize, usize) {
        let size = self.classes.info(class_id).size;
        let off = self.slab_hdr_size + slot as usize * size;
        (off, off + size)
    }

    /// Resolve `handle` to a mutable header/payload view. Panics if the
    /// handle does not refer to a slot of `class_id` — callers must always
    /// pass back the class id an item was allocated with (spec.md invariant
    /// 3: class id never changes after allocation).
    pub fn item_view(&mut self, handle: ItemHandle, class_id: u32) -> ItemView<'_> {
        let (start, end) = self.slot_range(class_id, handle.slot);
        let hdr = self.hdr_size();
        ItemView::new(&mut self.slabs[handle.slab_idx as usize].data[start..end], hdr)
    }

    pub fn bytes_used(&self) -> usize {
        self.bytes_used
    }

    pub fn slab_count(&self) -> usize {
        self.slabs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> Config {
        let mut c = Config::default();
        c.slab_size = 4096;
        c.slab_maxbytes = 4096 * 4;
        c.slab_profile = vec![64, 128];
        c
    }

    #[test]
    fn acquire_carves_then_recycles_from_freeq() {
        let mut alloc = SlabAllocator::new(&cfg());
        let class = alloc.class_for(3, 3).unwrap();
        let h1 = match alloc.acquire_slot(class) {
            Acquire::Ready(h) => h,
            _ => panic!("expected Ready"),
        };
        alloc.release_slot(h1, class);
        let h2 = match alloc.acquire_slot(class) {
            Acquire::Ready(h) => h,
            _ => panic!("expected Ready"),
        };
        assert_eq!(h1, h2);
    }

    #[test]
    fn oom_without_eviction_policy() {
        let mut c = cfg();
        c.slab_maxbytes = 4096; // one slab total
        c.slab_evict_opt = EvictOpt::None;
        let mut alloc = SlabAllocator::new(&c);
        let class = alloc.class_for(3, 3).unwrap();
        let info = alloc.classes.info(class);
        for _ in 0..info.items_per_slab {
            assert!(matches!(alloc.acquire_slot(class), Acquire::Ready(_)));
        }
        assert!(matches!(alloc.acquire_slot(class), Acquire::Oom));
    }

    #[test]
    fn evict_random_when_configured() {
        let mut c = cfg();
        c.slab_maxbytes = 4096;
        c.slab_evict_opt = EvictOpt::Random;
        let mut alloc = SlabAllocator::new(&c);
        let class = alloc.class_for(3, 3).unwrap();
        let info = alloc.classes.info(class);
        for _ in 0..info.items_per_slab {
            alloc.acquire_slot(class);
        }
        assert!(matches!(alloc.acquire_slot(class), Acquire::Evict(_)));
    }

    #[test]
    fn reclaim_slab_moves_ownership_to_new_class() {
        let mut alloc = SlabAllocator::new(&cfg());
        let class_a = alloc.class_for(3, 3).unwrap();
        let class_b = alloc.class_for(100, 20).unwrap();
        let slab_idx = match alloc.acquire_slot(class_a) {
            Acquire::Ready(h) => h.slab_idx,
            _ => panic!(),
        };
        alloc.reclaim_slab(slab_idx, class_b);
        assert_eq!(alloc.class_of_slab(slab_idx), class_b);
        assert!(matches!(alloc.acquire_slot(class_b), Acquire::Ready(h) if h.slab_idx == slab_idx));
    }

    #[test]
    fn oversized_request_is_rejected() {
        let alloc = SlabAllocator::new(&cfg());
        assert_eq!(alloc.class_for(10, 100_000), Err(CoreError::Oversized));
    }

    #[test]
    fn prealloc_carves_one_slab_per_class_up_front() {
        let mut c = cfg();
        c.slab_prealloc = true;
        let alloc = SlabAllocator::new(&c);
        assert_eq!(alloc.slab_count(), alloc.states.len());
        for state in &alloc.states {
            assert_eq!(state.slab_indices.len(), 1);
            assert!(state.partial_slab.is_some());
        }
    }

    #[test]
    fn prealloc_stops_at_maxbytes_without_erroring() {
        let mut c = cfg();
        c.slab_prealloc = true;
        c.slab_maxbytes = c.slab_size; // room for exactly one slab total
        let alloc = SlabAllocator::new(&c);
        assert_eq!(alloc.slab_count(), 1);
    }

    #[test]
    fn no_prealloc_by_default() {
        let alloc = SlabAllocator::new(&cfg());
        assert_eq!(alloc.slab_count(), 0);
    }
}
