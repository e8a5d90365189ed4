//! Fixed-capacity object pool (spec.md §5 "Pools"): recycles `Request`,
//! `Response`, and per-connection buffer objects instead of allocating one
//! per command, the way the teacher's `central_free_list`/`transfer_cache`
//! recycle allocator objects instead of going back to the page heap on
//! every free.

/// A bounded pool of reusable `T` values. `acquire` hands out a recycled
/// value if one is free, otherwise builds a fresh one via the factory;
/// `release` returns a value to the pool, dropping it instead if the pool
/// is already at capacity.
pub struct Pool<T> {
    free: Vec<T>,
    capacity: usize,
    factory: Box<dyn Fn() -> T>,
}

impl<T> Pool<T> {
    pub fn new(capacity: usize, factory: impl Fn() -> T + 'static) -> Self {
        Self { free: Vec::with_capacity(capacity), capacity, factory: Box::new(factory) }
    }

    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_else(|| (self.factory)())
    }

    pub fn release(&mut self, item: T) {
        if self.free.len() < self.capacity {
            self.free.push(item);
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
