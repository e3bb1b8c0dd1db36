pub mod console;
pub mod filter;
pub mod node;
pub mod sql;

pub use filter::{IpRange, IpRangeFilter};

use crate::error::SinkResult;
use crate::store::{CellView, CounterStore};
use std::net::Ipv4Addr;

/// One durable sample: the averaged rates for a single `(ip, vlan)` over
/// one interval (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record {
    pub ip: Ipv4Addr,
    pub vlan: u16,
    pub in_pps: u32,
    pub in_bps: u64,
    pub out_pps: u32,
    pub out_bps: u64,
}

/// Round `n / interval` to the nearest integer, per spec.md §4.4:
/// `(n + interval/2) / interval`.
fn round_rate(n: u64, interval_seconds: u64) -> u64 {
    (n + interval_seconds / 2) / interval_seconds
}

fn record_from_cell(cell: &CellView, interval_seconds: u64) -> Record {
    Record {
        ip: cell.ip,
        vlan: cell.vlan,
        in_pps: round_rate(cell.packets_in as u64, interval_seconds) as u32,
        in_bps: round_rate(cell.bytes_in, interval_seconds),
        out_pps: round_rate(cell.packets_out as u64, interval_seconds) as u32,
        out_bps: round_rate(cell.bytes_out, interval_seconds),
    }
}

impl Record {
    fn is_zero(&self) -> bool {
        self.in_pps == 0 && self.in_bps == 0 && self.out_pps == 0 && self.out_bps == 0
    }
}

/// Enumerate `store`, convert each occupied cell into a `Record`, and
/// apply the `store_zero` / IP-range-filter policy common to every sink
/// backend (spec.md §4.4). `node_id` is used for range filters that are
/// scoped to a specific node.
pub fn collect_records(
    store: &CounterStore,
    interval_seconds: u64,
    store_zero: bool,
    filter: &IpRangeFilter,
    node_id: i64,
) -> Vec<Record> {
    let mut records = Vec::new();
    store.enumerate(|cell| {
        let record = record_from_cell(&cell, interval_seconds);
        if !store_zero && record.is_zero() {
            return;
        }
        if !filter.is_allowed(record.ip, node_id) {
            return;
        }
        records.push(record);
    });
    records
}

/// A durable sink for per-interval snapshots (spec.md §6). `open` is
/// modeled as each backend's own constructor rather than a trait method,
/// since different backends need different configuration types — the
/// trait only covers the two operations common to every backend's steady
/// state.
pub trait Sink: Send + Sync {
    /// Called once per interval with the already-retired store. Errors
    /// here are logged and the flush is abandoned; they must never
    /// propagate into the capture loop (spec.md §4.4, §7).
    fn write(&self, unixtime_begin: u64, interval_seconds: u64, store: &CounterStore) -> SinkResult<()>;

    /// Called once at shutdown.
    fn close(&self) -> SinkResult<()> {
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rounding_matches_spec_formula() {
        // round(118 / 10) with (n + interval/2) / interval
        assert_eq!(round_rate(118, 10), 12);
        assert_eq!(round_rate(0, 10), 0);
        assert_eq!(round_rate(5, 10), 1); // (5+5)/10 = 1
        assert_eq!(round_rate(4, 10), 0); // (4+5)/10 = 0
    }

    #[test]
    fn zero_records_are_detected() {
        let r = Record { ip: Ipv4Addr::UNSPECIFIED, vlan: 0, in_pps: 0, in_bps: 0, out_pps: 0, out_bps: 0 };
        assert!(r.is_zero());
    }
}
