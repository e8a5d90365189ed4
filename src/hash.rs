//! Chained hash index over item handles (spec.md §4.2).
//!
//! The table is an array of `2^hash_power` chain heads; collisions are
//! resolved by a singly-linked chain stored inline in each item's
//! `next_in_chain` header field (see [`crate::item`]), so the index itself
//! holds no per-item allocation beyond the head array.

use crate::item::ItemHandle;
use crate::slab::SlabAllocator;
use xxhash_rust::xxh3::xxh3_64;

pub struct HashIndex {
    heads: Vec<Option<ItemHandle>>,
    mask: usize,
}

impl HashIndex {
    pub fn new(hash_power: u32) -> Self {
        let n = 1usize << hash_power;
        Self { heads: vec![None; n], mask: n - 1 }
    }

    #[inline]
    pub fn hash(key: &[u8]) -> u64 {
        xxh3_64(key)
    }

    #[inline]
    fn bucket(&self, key: &[u8]) -> usize {
        (Self::hash(key) as usize) & self.mask
    }

    /// Walk `key`'s chain, resolving each handle through `slab` to compare
    /// keys. Returns the matching handle and its class id, if any.
    pub fn get(&self, key: &[u8], slab: &mut SlabAllocator) -> Option<(ItemHandle, u32)> {
        let mut cur = self.heads[self.bucket(key)];
        while let Some(h) = cur {
            let class_id = slab.class_of_slab(h.slab_idx);
            let view = slab.item_view(h, class_id);
            if view.key() == key {
                return Some((h, class_id));
            }
            cur = view.next_in_chain();
        }
        None
    }

    /// Insert `handle` at the head of `key`'s chain. Callers must have
    /// already written the item's header (including its key) before
    /// calling this, so `next_in_chain` can be chained correctly.
    pub fn put(&mut self, key: &[u8], handle: ItemHandle, slab: &mut SlabAllocator, class_id: u32) {
        let idx = self.bucket(key);
        let old_head = self.heads[idx];
        let mut view = slab.item_view(handle, class_id);
        view.set_next_in_chain(old_head);
        view.set_linked(true);
        self.heads[idx] = Some(handle);
    }

    /// Unlink `handle` from `key`'s chain. Returns `true` if it was found
    /// and removed.
    pub fn delete(&mut self, key: &[u8], handle: ItemHandle, slab: &mut SlabAllocator) -> bool {
        let idx = self.bucket(key);
        let mut cur = self.heads[idx];
        let mut prev: Option<ItemHandle> = None;
        while let Some(h) = cur {
            let class_id = slab.class_of_slab(h.slab_idx);
            let next = slab.item_view(h, class_id).next_in_chain();
            if h == handle {
                match prev {
                    None => self.heads[idx] = next,
                    Some(p) => {
                        let prev_class = slab.class_of_slab(p.slab_idx);
                        slab.item_view(p, prev_class).set_next_in_chain(next);
                    }
                }
                slab.item_view(h, class_id).set_linked(false);
                return true;
            }
            prev = Some(h);
            cur = next;
        }
        false
    }

    /// Remove every chain entry whose handle is in `slab_idx`, without
    /// resolving keys — used when an entire slab is being reclaimed and its
    /// contents are known to be going away regardless of key (spec.md §4.1
    /// eviction: "unlinks every live item it contains"). Returns the number
    /// of entries removed.
    pub fn unlink_slab(&mut self, slab_idx: u32, slab: &mut SlabAllocator) -> u64 {
        let mut removed = 0u64;
        for idx in 0..self.heads.len() {
            let mut cur = self.heads[idx];
            let mut prev: Option<ItemHandle> = None;
            while let Some(h) = cur {
                let class_id = slab.class_of_slab(h.slab_idx);
                let next = slab.item_view(h, class_id).next_in_chain();
                if h.slab_idx == slab_idx {
                    match prev {
                        None => self.heads[idx] = next,
                        Some(p) => {
                            let prev_class = slab.class_of_slab(p.slab_idx);
                            slab.item_view(p, prev_class).set_next_in_chain(next);
                        }
                    }
                    removed += 1;
                } else {
                    prev = Some(h);
                }
                cur = next;
            }
        }
        removed
    }
}
