//! Item header layout and accessors (spec.md §3, §4.3).
//!
//! Per the "safer target" redesign in spec.md §9, items are never referenced
//! through raw pointers. Every live item is addressed by a stable
//! [`ItemHandle`] (slab index + slot index) and its header fields are read
//! and written through byte-slice accessors over the slot's region of the
//! owning slab buffer — no accessor here can outlive the buffer it borrows
//! from, so a handle can never dangle across an eviction the way a raw
//! pointer could.

use crate::error::CoreError;

/// Sentinel `next_in_chain` value meaning "end of chain" (spec.md §4.2).
const NIL: u64 = u64::MAX;

const FLAG_LINKED: u8 = 1 << 0;
const FLAG_IN_FREEQ: u8 = 1 << 1;
const FLAG_RALIGNED: u8 = 1 << 2;

/// `ITEM_MAGIC`: a sentinel written at offset 0 of every slot, checked on
/// every access when the `debug-magic` feature is enabled (spec.md §3.1).
pub const ITEM_MAGIC: u32 = 0x4d43_4954; // "TICM" as bytes, matching the teacher's ASCII-tag convention

const OFF_MAGIC: usize = 0;
const OFF_NEXT: usize = 4;
const OFF_FLAGS: usize = 12;
const OFF_KLEN: usize = 13;
const OFF_VLEN: usize = 14;
const OFF_DATAFLAG: usize = 18;
const OFF_EXPIRE_AT: usize = 22;
const OFF_CREATE_AT: usize = 26;
const OFF_CAS: usize = 30;

/// Header size without a CAS field (spec.md §4.3: CAS is only reserved when
/// the engine-wide `slab_use_cas` option is on, fixed for the engine's
/// lifetime — so header size is a function of that one flag, not per-item).
pub const HDR_SIZE_NO_CAS: usize = OFF_CAS;
/// Header size with an 8-byte CAS field appended.
pub const HDR_SIZE_WITH_CAS: usize = OFF_CAS + 8;

#[inline]
pub const fn hdr_size(use_cas: bool) -> usize {
    if use_cas { HDR_SIZE_WITH_CAS } else { HDR_SIZE_NO_CAS }
}

/// A stable reference to a live item slot. Never dereferenced directly —
/// callers pass it back to [`crate::slab::SlabAllocator`] and
/// [`crate::engine::Cache`] methods, which resolve it to a byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ItemHandle {
    pub slab_idx: u32,
    pub slot: u32,
}

impl ItemHandle {
    #[inline]
    pub fn encode(opt: Option<ItemHandle>) -> u64 {
        match opt {
            None => NIL,
            Some(h) => ((h.slab_idx as u64) << 32) | h.slot as u64,
        }
    }

    #[inline]
    pub fn decode(raw: u64) -> Option<ItemHandle> {
        if raw == NIL {
            None
        } else {
            Some(ItemHandle { slab_idx: (raw >> 32) as u32, slot: raw as u32 })
        }
    }
}

/// A copy of an item's fixed-size fields, owned independently of the slab
/// buffer (spec.md §3.3: "No item reference outlives the unlink that
/// recycles it" — returning owned copies makes that invariant structural
/// rather than something every caller must remember).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemMeta {
    pub klen: u8,
    pub vlen: u32,
    pub dataflag: u32,
    pub expire_at: u32,
    pub create_at: u32,
    pub cas: Option<u64>,
    pub is_raligned: bool,
}

/// An owned snapshot of an item's key and value bytes, returned by
/// [`crate::engine::Cache::item_get`] so the caller holds no borrow into the
/// slab buffer past the call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemData {
    pub meta: ItemMeta,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

/// Total slot footprint required to store a `klen`-byte key and `vlen`-byte
/// value at the given header size (spec.md §4.1's `S_c >= item_size(...)`
/// sizing check).
#[inline]
pub const fn item_size(hdr: usize, klen: usize, vlen: usize) -> usize {
    hdr + klen + vlen
}

/// A mutable view over one item's slot bytes. Constructed by
/// [`crate::slab::SlabAllocator`] over a subslice of its owning slab; never
/// stored past the call that produced it.
pub struct ItemView<'a> {
    data: &'a mut [u8],
    hdr: usize,
}

impl<'a> ItemView<'a> {
    /// `data` must be exactly the item's slot (its class's `S_c` bytes).
    pub fn new(data: &'a mut [u8], hdr: usize) -> Self {
        Self { data, hdr }
    }

    #[inline]
    fn u32_at(&self, off: usize) -> u32 {
        u32::from_le_bytes(self.data[off..off + 4].try_into().unwrap())
    }

    #[inline]
    fn set_u32_at(&mut self, off: usize, v: u32) {
        self.data[off..off + 4].copy_from_slice(&v.to_le_bytes());
    }

    pub fn magic(&self) -> u32 {
        self.u32_at(OFF_MAGIC)
    }

    pub fn write_magic(&mut self) {
        self.set_u32_at(OFF_MAGIC, ITEM_MAGIC);
    }

    pub fn next_in_chain(&self) -> Option<ItemHandle> {
        let raw = u64::from_le_bytes(self.data[OFF_NEXT..OFF_NEXT + 8].try_into().unwrap());
        ItemHandle::decode(raw)
    }

    pub fn set_next_in_chain(&mut self, next: Option<ItemHandle>) {
        let raw = ItemHandle::encode(next);
        self.data[OFF_NEXT..OFF_NEXT + 8].copy_from_slice(&raw.to_le_bytes());
    }

    fn flags(&self) -> u8 {
        self.data[OFF_FLAGS]
    }

    fn set_flag(&mut self, bit: u8, on: bool) {
        let f = self.data[OFF_FLAGS];
        self.data[OFF_FLAGS] = if on { f | bit } else { f & !bit };
    }

    pub fn is_linked(&self) -> bool {
        self.flags() & FLAG_LINKED != 0
    }

    pub fn set_linked(&mut self, on: bool) {
        self.set_flag(FLAG_LINKED, on);
    }

    pub fn in_freeq(&self) -> bool {
        self.flags() & FLAG_IN_FREEQ != 0
    }

    pub fn set_in_freeq(&mut self, on: bool) {
        self.set_flag(FLAG_IN_FREEQ, on);
    }

    pub fn is_raligned(&self) -> bool {
        self.flags() & FLAG_RALIGNED != 0
    }

    pub fn set_raligned(&mut self, on: bool) {
        self.set_flag(FLAG_RALIGNED, on);
    }

    pub fn klen(&self) -> u8 {
        self.data[OFF_KLEN]
    }

    pub fn vlen(&self) -> u32 {
        self.u32_at(OFF_VLEN)
    }

    pub fn dataflag(&self) -> u32 {
        self.u32_at(OFF_DATAFLAG)
    }

    pub fn expire_at(&self) -> u32 {
        self.u32_at(OFF_EXPIRE_AT)
    }

    pub fn set_expire_at(&mut self, v: u32) {
        self.set_u32_at(OFF_EXPIRE_AT, v);
    }

    pub fn create_at(&self) -> u32 {
        self.u32_at(OFF_CREATE_AT)
    }

    pub fn cas(&self) -> Option<u64> {
        if self.hdr < HDR_SIZE_WITH_CAS {
            return None;
        }
        Some(u64::from_le_bytes(self.data[OFF_CAS..OFF_CAS + 8].try_into().unwrap()))
    }

    pub fn set_cas(&mut self, v: u64) {
        if self.hdr >= HDR_SIZE_WITH_CAS {
            self.data[OFF_CAS..OFF_CAS + 8].copy_from_slice(&v.to_le_bytes());
        }
    }

    /// Initialize every header field and copy in `key`/`value`, laid out
    /// left-aligned (value immediately follows key) unless `raligned` is
    /// set, in which case the value is right-justified against the end of
    /// the slot, leaving any unused bytes between key and value as slack a
    /// later `prepend` can claim without a realloc (spec.md §4.3's annex
    /// optimization).
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        key: &[u8],
        value: &[u8],
        dataflag: u32,
        expire_at: u32,
        create_at: u32,
        cas: u64,
        raligned: bool,
    ) -> Result<(), CoreError> {
        let klen = key.len();
        let vlen = value.len();
        if klen > u8::MAX as usize || self.hdr + klen + vlen > self.data.len() {
            return Err(CoreError::Oversized);
        }
        self.write_magic();
        self.set_next_in_chain(None);
        self.data[OFF_FLAGS] = 0;
        self.data[OFF_KLEN] = klen as u8;
        self.set_u32_at(OFF_VLEN, vlen as u32);
        self.set_u32_at(OFF_DATAFLAG, dataflag);
        self.set_expire_at(expire_at);
        self.set_u32_at(OFF_CREATE_AT, create_at);
        self.set_cas(cas);
        self.set_linked(false);
        self.set_in_freeq(false);
        self.set_raligned(raligned);

        let key_off = self.hdr;
        self.data[key_off..key_off + klen].copy_from_slice(key);
        let value_off = if raligned { self.data.len() - vlen } else { key_off + klen };
        self.data[value_off..value_off + vlen].copy_from_slice(value);
        Ok(())
    }

    /// Overwrite an already-linked item's value in place (spec.md §4.3
    /// `item_update`): the key is unchanged and must already occupy this
    /// slot, so unlike [`Self::init`] this never touches `next_in_chain` or
    /// the linked flag — the hash index's chain through this slot stays
    /// intact. Caller must have already checked the new value still fits
    /// the slot (same size class as before).
    pub fn overwrite(&mut self, value: &[u8], dataflag: u32, expire_at: u32, create_at: u32, cas: u64) -> Result<(), CoreError> {
        let klen = self.klen() as usize;
        let vlen = value.len();
        if self.hdr + klen + vlen > self.data.len() {
            return Err(CoreError::Oversized);
        }
        self.set_u32_at(OFF_VLEN, vlen as u32);
        self.set_u32_at(OFF_DATAFLAG, dataflag);
        self.set_expire_at(expire_at);
        self.set_u32_at(OFF_CREATE_AT, create_at);
        self.set_cas(cas);
        self.set_raligned(false);

        let key_off = self.hdr;
        let value_off = key_off + klen;
        self.data[value_off..value_off + vlen].copy_from_slice(value);
        Ok(())
    }

    pub fn key(&self) -> &[u8] {
        let off = self.hdr;
        &self.data[off..off + self.klen() as usize]
    }

    pub fn value(&self) -> &[u8] {
        let vlen = self.vlen() as usize;
        let off = if self.is_raligned() { self.data.len() - vlen } else { self.hdr + self.klen() as usize };
        &self.data[off..off + vlen]
    }

    pub fn meta(&self) -> ItemMeta {
        ItemMeta {
            klen: self.klen(),
            vlen: self.vlen(),
            dataflag: self.dataflag(),
            expire_at: self.expire_at(),
            create_at: self.create_at(),
            cas: self.cas(),
            is_raligned: self.is_raligned(),
        }
    }

    pub fn to_owned_data(&self) -> ItemData {
        ItemData { meta: self.meta(), key: self.key().to_vec(), value: self.value().to_vec() }
    }

    /// Append `extra` to the value in place, if the slot's spare capacity
    /// (beyond `klen + vlen`) is large enough; returns `false` if a realloc
    /// into a larger class is required instead (spec.md §4.3 `item_annex`).
    pub fn try_append_in_place(&mut self, extra: &[u8]) -> bool {
        let klen = self.klen() as usize;
        let vlen = self.vlen() as usize;
        let used = self.hdr + klen + vlen;
        if used + extra.len() > self.data.len() || self.is_raligned() {
            return false;
        }
        let off = self.hdr + klen + vlen;
        self.data[off..off + extra.len()].copy_from_slice(extra);
        self.set_u32_at(OFF_VLEN, (vlen + extra.len()) as u32);
        true
    }

    /// Prepend `extra` to the value in place — only possible when the item
    /// is right-aligned and has slack between the key and the value.
    pub fn try_prepend_in_place(&mut self, extra: &[u8]) -> bool {
        if !self.is_raligned() {
            return false;
        }
        let klen = self.klen() as usize;
        let vlen = self.vlen() as usize;
        let value_off = self.data.len() - vlen;
        let key_end = self.hdr + klen;
        if value_off < key_end + extra.len() {
            return false;
        }
        let new_off = value_off - extra.len();
        self.data[new_off..new_off + extra.len()].copy_from_slice(extra);
        self.set_u32_at(OFF_VLEN, (vlen + extra.len()) as u32);
        true
    }

    /// `true` when `(expire_at > 0 && expire_at < now) || (flush_at != 0 &&
    /// create_at <= flush_at)` (spec.md §4.3's lazy-expiration predicate).
    /// `flush_at == 0` means "never flushed" — without that guard every item
    /// created at relative-second 0 (before the first `tick()`) would read
    /// as flush-expired the instant it's inserted.
    pub fn is_expired(&self, now: u32, flush_at: u32) -> bool {
        let expire_at = self.expire_at();
        (expire_at > 0 && expire_at < now) || (flush_at != 0 && self.create_at() <= flush_at)
    }
}
