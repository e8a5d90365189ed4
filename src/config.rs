//! Storage-engine configuration (spec.md §6.3).
//!
//! Resolved at runtime by the embedder and handed to [`crate::engine::Cache::setup`]
//! — unlike the teacher, which bakes its size-class table in at build time
//! via `build.rs` + a `RTMALLOC_CLASSES` TOML file, this engine's profile is
//! part of the live config because spec.md §6.3 has the storage engine
//! receive these options "at setup time", not at compile time. `Config`
//! still derives `serde::Deserialize` so an embedder can load one from TOML
//! the same way the teacher's build script does.

use serde::Deserialize;

/// Eviction policy used when a size class is full and its free queue (if
/// enabled) is empty (spec.md §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvictOpt {
    /// Fail the allocation with `ENOMEM` rather than evict.
    None,
    /// Evict a uniformly random slab already owned by this class.
    Random,
    /// Evict the least-recently-used slab in this class's LRU list.
    Lru,
}

/// Explicit size-class profile, overriding `slab_chunk_size`-based growth.
/// Entries must be strictly increasing (spec.md invariant 5).
pub type SlabProfile = Vec<usize>;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Bytes per slab (spec.md §3.1 "typical 1 MiB").
    pub slab_size: usize,
    /// Cap on total slab memory across all classes.
    pub slab_maxbytes: usize,
    /// Carve one slab per class at setup, subject to `slab_maxbytes`.
    pub slab_prealloc: bool,
    /// Eviction policy used when a class is exhausted.
    pub slab_evict_opt: EvictOpt,
    /// Enable the per-class free queue (slot 1 in the acquisition order).
    pub slab_use_freeq: bool,
    /// Reserve 8 bytes per item for a CAS value.
    pub slab_use_cas: bool,
    /// Granularity of size-class growth when `slab_profile` is empty.
    pub slab_chunk_size: usize,
    /// Explicit size-class table; if non-empty, overrides `slab_chunk_size`.
    pub slab_profile: SlabProfile,
    /// log2 of the hash table's chain-head array length.
    pub slab_hash_power: u32,
    /// Initial per-connection buffer size.
    pub buf_init_size: usize,
    /// Cap on buffer doubling: `max_size = buf_init_size << dbuf_max_power`.
    pub dbuf_max_power: u32,
    /// Capacity of the `Request` object pool.
    pub request_poolsize: usize,
    /// Capacity of the buffered-socket object pool.
    pub buf_sock_poolsize: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slab_size: 1024 * 1024,
            slab_maxbytes: 1024 * 1024 * 1024,
            slab_prealloc: false,
            slab_evict_opt: EvictOpt::None,
            slab_use_freeq: true,
            slab_use_cas: true,
            slab_chunk_size: 48,
            slab_profile: Vec::new(),
            slab_hash_power: 16,
            buf_init_size: 4096,
            dbuf_max_power: 8,
            request_poolsize: 4096,
            buf_sock_poolsize: 4096,
        }
    }
}

impl Config {
    /// Growth-factor item-size profile, matching memcached's default
    /// `growth_factor = 1.25` chunking, anchored at `slab_chunk_size` and
    /// capped so the largest class still fits one slab.
    pub fn default_profile(&self) -> SlabProfile {
        if !self.slab_profile.is_empty() {
            return self.slab_profile.clone();
        }
        let mut sizes = Vec::new();
        let mut size = self.slab_chunk_size.max(48);
        let max_item = self.slab_size - 64; // leave room for a slab header
        while size < max_item {
            sizes.push(size);
            let next = (size as f64 * 1.25) as usize;
            size = next.max(size + 8);
        }
        sizes.push(max_item);
        sizes
    }
}
