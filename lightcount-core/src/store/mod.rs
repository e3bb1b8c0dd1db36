mod cell;
mod pair;

pub use cell::{Cell, CellView};
pub(crate) use cell::{pack_key, unpack_key, Direction};
pub use pair::StorePair;

use ahash::AHashMap;
use std::net::Ipv4Addr;
use std::sync::RwLock;
use tracing::warn;

/// Default low-bit width used to pick a slot: `2^18` primary slots.
pub const DEFAULT_HASH_BITS: u32 = 18;
/// Default number of in-line cells per slot.
pub const DEFAULT_BUCKET_SIZE: usize = 7;

/// A fixed-size, allocation-free-on-the-hot-path counter table keyed by
/// `(ipv4, vlan)`. See `CounterStore::new` for the sizing parameters.
///
/// Slot selection uses the low `hash_bits` bits of the address; each slot
/// holds `bucket_size` in-line cells scanned linearly. A slot that fills up
/// spills into a lazily allocated per-slot overflow map (see module docs in
/// `store::mod` / DESIGN.md for why this replaces the original's
/// preallocated dense array).
pub struct CounterStore {
    hash_bits: u32,
    bucket_size: usize,
    slot_mask: u32,
    cells: Box<[Cell]>,
    overflow: RwLock<AHashMap<u32, AHashMap<u64, Cell>>>,
    overflow_capacity: usize,
}

impl CounterStore {
    /// Allocate a zeroed store. `hash_bits` selects the number of primary
    /// slots (`2^hash_bits`); `bucket_size` is the number of in-line cells
    /// per slot (`B`). Only fails by panicking on allocation failure
    /// (matches spec.md's "only fails on host OOM" contract — Rust's
    /// global allocator aborts rather than returning an error here).
    pub fn new(hash_bits: u32, bucket_size: usize) -> Self {
        assert!(hash_bits > 0 && hash_bits <= 32, "hash_bits must be in 1..=32");
        assert!(bucket_size > 0, "bucket_size must be positive");

        let slots = 1usize << hash_bits;
        let total_cells = slots
            .checked_mul(bucket_size)
            .expect("hash_bits/bucket_size combination overflows cell count");
        let cells = (0..total_cells).map(|_| Cell::empty()).collect::<Vec<_>>().into_boxed_slice();
        let slot_mask = if hash_bits == 32 { u32::MAX } else { (1u32 << hash_bits) - 1 };
        let overflow_capacity = 1usize
            .checked_shl(32 - hash_bits)
            .unwrap_or(usize::MAX);

        Self {
            hash_bits,
            bucket_size,
            slot_mask,
            cells,
            overflow: RwLock::new(AHashMap::new()),
            overflow_capacity,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_HASH_BITS, DEFAULT_BUCKET_SIZE)
    }

    /// Record one packet: `+1`/`+frame_len` out-direction at `(src, vlan)`
    /// and `+1`/`+frame_len` in-direction at `(dst, vlan)`. When
    /// `src == dst` both increments land on the same cell.
    pub fn add(&self, src: Ipv4Addr, dst: Ipv4Addr, vlan: u16, frame_len: u64) {
        self.accumulate(src, vlan, Direction::Out, frame_len);
        self.accumulate(dst, vlan, Direction::In, frame_len);
    }

    fn accumulate(&self, ip: Ipv4Addr, vlan: u16, dir: Direction, len: u64) {
        let ip_bits = u32::from(ip);
        let slot_idx = ip_bits & self.slot_mask;
        let ip_high = ip_bits >> self.hash_bits;
        let key = pack_key(ip_high, vlan);

        let base = slot_idx as usize * self.bucket_size;
        let slot = &self.cells[base..base + self.bucket_size];

        for cell in slot {
            let existing = cell.key.load(std::sync::atomic::Ordering::Relaxed);
            if existing == key {
                cell.apply(dir, len);
                return;
            }
            if existing == cell::EMPTY_KEY {
                match cell.key.compare_exchange(
                    cell::EMPTY_KEY,
                    key,
                    std::sync::atomic::Ordering::AcqRel,
                    std::sync::atomic::Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        cell.apply(dir, len);
                        return;
                    }
                    Err(actual) if actual == key => {
                        cell.apply(dir, len);
                        return;
                    }
                    Err(_) => continue,
                }
            }
        }

        self.accumulate_overflow(slot_idx, key, dir, len);
    }

    fn accumulate_overflow(&self, slot_idx: u32, key: u64, dir: Direction, len: u64) {
        {
            let map = self.overflow.read().unwrap_or_else(|e| e.into_inner());
            if let Some(cell) = map.get(&slot_idx).and_then(|slot_map| slot_map.get(&key)) {
                cell.apply(dir, len);
                return;
            }
        }

        let mut map = self.overflow.write().unwrap_or_else(|e| e.into_inner());
        let slot_map = map.entry(slot_idx).or_default();
        if let Some(cell) = slot_map.get(&key) {
            cell.apply(dir, len);
            return;
        }
        if slot_map.len() >= self.overflow_capacity {
            warn!(slot_idx, capacity = self.overflow_capacity, "overflow slot full, dropping packet");
            return;
        }
        let cell = Cell::for_key(key);
        cell.apply(dir, len);
        slot_map.insert(key, cell);
    }

    /// Invoke `visitor` for every occupied cell, in unspecified order.
    pub fn enumerate(&self, mut visitor: impl FnMut(CellView)) {
        for (slot_idx, chunk) in self.cells.chunks(self.bucket_size).enumerate() {
            for cell in chunk {
                let key = cell.key.load(std::sync::atomic::Ordering::Relaxed);
                if key == cell::EMPTY_KEY {
                    continue;
                }
                self.emit(slot_idx as u32, key, cell, &mut visitor);
            }
        }

        let map = self.overflow.read().unwrap_or_else(|e| e.into_inner());
        for (&slot_idx, slot_map) in map.iter() {
            for (&key, cell) in slot_map.iter() {
                self.emit(slot_idx, key, cell, &mut visitor);
            }
        }
    }

    fn emit(&self, slot_idx: u32, key: u64, cell: &Cell, visitor: &mut impl FnMut(CellView)) {
        let (ip_high, vlan) = unpack_key(key);
        let ip_bits = (ip_high << self.hash_bits) | slot_idx;
        visitor(CellView {
            ip: Ipv4Addr::from(ip_bits),
            vlan,
            packets_in: cell.packets_in(),
            packets_out: cell.packets_out(),
            bytes_in: cell.bytes_in(),
            bytes_out: cell.bytes_out(),
        });
    }

    /// Free overflow regions and zero all in-line cells. Post-condition:
    /// `enumerate` yields nothing.
    pub fn reset(&self) {
        for cell in self.cells.iter() {
            cell.clear();
        }
        self.overflow.write().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn hash_bits(&self) -> u32 {
        self.hash_bits
    }

    pub fn bucket_size(&self) -> usize {
        self.bucket_size
    }
}
