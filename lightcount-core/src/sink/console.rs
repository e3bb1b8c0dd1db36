use super::{collect_records, IpRangeFilter, Sink};
use crate::error::SinkResult;
use crate::store::CounterStore;
use tracing::info;

/// Writes each interval's records as structured log lines instead of a
/// database. Grounded on the original's `storage_console.c`, which exists
/// in the source purely as a zero-dependency smoke-test backend; here it
/// doubles as a usable default for deployments without a database.
pub struct ConsoleSink {
    store_zero: bool,
    filter: IpRangeFilter,
    node_id: i64,
}

impl ConsoleSink {
    pub fn new(store_zero: bool, filter: IpRangeFilter, node_id: i64) -> Self {
        Self { store_zero, filter, node_id }
    }
}

impl Sink for ConsoleSink {
    fn write(&self, unixtime_begin: u64, interval_seconds: u64, store: &CounterStore) -> SinkResult<()> {
        let records = collect_records(store, interval_seconds, self.store_zero, &self.filter, self.node_id);
        for r in &records {
            info!(
                unixtime_begin,
                interval_seconds,
                vlan = r.vlan,
                ip = %r.ip,
                in_pps = r.in_pps,
                in_bps = r.in_bps,
                out_pps = r.out_pps,
                out_bps = r.out_bps,
                "traffic sample"
            );
        }
        info!(unixtime_begin, records = records.len(), "flush complete");
        Ok(())
    }
}
