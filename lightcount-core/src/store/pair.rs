use super::CounterStore;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Two identically-shaped counter stores, exactly one of which is "active"
/// (receiving writes) at any moment. The active index is a single atomic
/// flip, the same idiom as the teacher's `Rate::red_or_blue: AtomicBool`
/// (`security::rate_limit::rate::Rate`), generalized to an index so tests
/// can address "store 0" / "store 1" symmetrically.
pub struct StorePair {
    stores: [CounterStore; 2],
    active: AtomicUsize,
}

impl StorePair {
    pub fn new(hash_bits: u32, bucket_size: usize) -> Self {
        Self {
            stores: [CounterStore::new(hash_bits, bucket_size), CounterStore::new(hash_bits, bucket_size)],
            active: AtomicUsize::new(0),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(super::DEFAULT_HASH_BITS, super::DEFAULT_BUCKET_SIZE)
    }

    /// The store currently receiving writes.
    pub fn active(&self) -> &CounterStore {
        &self.stores[self.active.load(Ordering::Relaxed) & 1]
    }

    /// The store not currently receiving writes.
    pub fn retired(&self) -> &CounterStore {
        &self.stores[(self.active.load(Ordering::Relaxed) & 1) ^ 1]
    }

    /// Flip which store is active. After this returns, `active()` and
    /// `retired()` observe the swapped pair — though a writer mid-read of
    /// the old index may still land one more `add` on the now-retired
    /// store, which spec.md §5 explicitly allows.
    pub fn swap(&self) {
        self.active.fetch_xor(1, Ordering::Relaxed);
    }
}
