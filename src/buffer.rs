//! Linear read/write byte buffer with auto-grow (spec.md §4.5).
//!
//! A contiguous byte array with cursors `rpos <= wpos`. Parsers consume from
//! `rpos`; composers and socket reads append at `wpos`. Growth doubles the
//! backing allocation up to a configured cap; cursor values are preserved
//! across reallocation, matching the teacher's span/page-heap convention of
//! never invalidating a live handle across an internal resize.

use crate::error::CoreError;

/// A growable byte buffer with independent read/write cursors.
pub struct Buffer {
    data: Vec<u8>,
    rpos: usize,
    wpos: usize,
    init_size: usize,
    max_size: usize,
}

impl Buffer {
    /// `init_size` is the starting capacity; `max_power` bounds growth at
    /// `init_size << max_power` (spec.md §4.5's `dbuf_max_power`).
    pub fn new(init_size: usize, max_power: u32) -> Self {
        let max_size = init_size.checked_shl(max_power).unwrap_or(usize::MAX);
        Self {
            data: vec![0u8; init_size],
            rpos: 0,
            wpos: 0,
            init_size,
            max_size,
        }
    }

    #[inline]
    pub fn rpos(&self) -> usize {
        self.rpos
    }

    #[inline]
    pub fn wpos(&self) -> usize {
        self.wpos
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes available to read: `[rpos, wpos)`.
    #[inline]
    pub fn readable(&self) -> &[u8] {
        &self.data[self.rpos..self.wpos]
    }

    /// Number of unread bytes.
    #[inline]
    pub fn unread_len(&self) -> usize {
        self.wpos - self.rpos
    }

    /// Advance `rpos` by `n` bytes. Callers use this after a successful
    /// parse to commit the bytes consumed.
    ///
    /// # Panics
    /// Panics if `n` would advance `rpos` past `wpos` — this indicates a
    /// parser bug, not a runtime condition callers should recover from.
    pub fn advance_rpos(&mut self, n: usize) {
        assert!(self.rpos + n <= self.wpos, "advance_rpos past wpos");
        self.rpos += n;
    }

    /// Reset `rpos` to `to` — used by a parser that detects `INVALID` after
    /// having tentatively advanced past sub-tokens (spec.md §4.4.1: "On
    /// `INVALID`, the parser restores `rpos` to the start of the current
    /// request").
    pub fn reset_rpos(&mut self, to: usize) {
        assert!(to <= self.wpos);
        self.rpos = to;
    }

    /// Append `bytes` at `wpos`, growing the buffer first if needed.
    pub fn write(&mut self, bytes: &[u8]) -> Result<(), CoreError> {
        self.fit(self.wpos + bytes.len())?;
        self.data[self.wpos..self.wpos + bytes.len()].copy_from_slice(bytes);
        self.wpos += bytes.len();
        Ok(())
    }

    /// The writable region `[wpos, capacity)`, for a caller (e.g. a socket
    /// read) that wants to fill it directly and then call
    /// [`Buffer::commit_write`].
    pub fn writable_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.wpos..]
    }

    /// Record that `n` bytes were written into the slice returned by
    /// [`Buffer::writable_mut`].
    pub fn commit_write(&mut self, n: usize) {
        assert!(self.wpos + n <= self.data.len());
        self.wpos += n;
    }

    /// Double the backing allocation, up to `max_size`. Returns
    /// `ENOMEM`-shaped [`CoreError::Enomem`] if already at the cap.
    pub fn double(&mut self) -> Result<(), CoreError> {
        let new_cap = self.data.len().saturating_mul(2);
        if self.data.len() >= self.max_size {
            return Err(CoreError::Enomem);
        }
        self.data.resize(new_cap.min(self.max_size), 0);
        Ok(())
    }

    /// Grow (by repeated doubling) until capacity is at least `cap`, or
    /// return `ENOMEM` if `cap` exceeds `max_size`.
    pub fn fit(&mut self, cap: usize) -> Result<(), CoreError> {
        if cap > self.max_size {
            return Err(CoreError::Enomem);
        }
        while self.data.len() < cap {
            self.double()?;
        }
        Ok(())
    }

    /// Compact: drop already-read bytes and shrink back to `init_size` if
    /// the buffer had grown and is now empty of unread data.
    pub fn shrink(&mut self) {
        if self.rpos == self.wpos {
            self.rpos = 0;
            self.wpos = 0;
        } else if self.rpos > 0 {
            self.data.copy_within(self.rpos..self.wpos, 0);
            self.wpos -= self.rpos;
            self.rpos = 0;
        }
        if self.data.len() > self.init_size && self.wpos <= self.init_size {
            self.data.truncate(self.init_size);
            self.data.shrink_to_fit();
        }
    }
}
