//! End-to-end scenarios from spec.md §8, exercised against the public
//! `CounterStore`/`StorePair` API directly (no capture thread involved —
//! `capture::frame::parse_frame` is covered by its own unit tests).

use lightcount_core::store::{CounterStore, StorePair};
use std::net::Ipv4Addr;

fn round_rate(n: u64, interval: u64) -> u64 {
    (n + interval / 2) / interval
}

#[test]
fn single_packet() {
    let store = CounterStore::with_defaults();
    store.add(Ipv4Addr::new(10, 0, 0, 1), Ipv4Addr::new(10, 0, 0, 2), 0, 118);

    let mut cells = Vec::new();
    store.enumerate(|c| cells.push(c));
    assert_eq!(cells.len(), 2);

    let out = cells.iter().find(|c| c.ip == Ipv4Addr::new(10, 0, 0, 1)).expect("out cell");
    assert_eq!(out.packets_out, 1);
    assert_eq!(out.bytes_out, 118);
    assert_eq!(out.packets_in, 0);
    assert_eq!(round_rate(out.bytes_out, 10), 12);

    let incoming = cells.iter().find(|c| c.ip == Ipv4Addr::new(10, 0, 0, 2)).expect("in cell");
    assert_eq!(incoming.packets_in, 1);
    assert_eq!(incoming.bytes_in, 118);
}

#[test]
fn loopback_packet_hits_one_cell_both_directions() {
    let store = CounterStore::with_defaults();
    let loopback = Ipv4Addr::new(127, 0, 0, 1);
    store.add(loopback, loopback, 0, 82);

    let mut cells = Vec::new();
    store.enumerate(|c| cells.push(c));
    assert_eq!(cells.len(), 1);
    let cell = cells[0];
    assert_eq!(cell.packets_in, 1);
    assert_eq!(cell.packets_out, 1);
    assert_eq!(cell.bytes_in, 82);
    assert_eq!(cell.bytes_out, 82);
}

#[test]
fn vlan_tagged_packet_is_isolated_from_untagged() {
    let store = CounterStore::with_defaults();
    store.add(Ipv4Addr::new(10, 1, 1, 1), Ipv4Addr::new(10, 1, 1, 2), 42, 522);

    let mut cells = Vec::new();
    store.enumerate(|c| cells.push(c));
    assert_eq!(cells.len(), 2);

    let out = cells.iter().find(|c| c.ip == Ipv4Addr::new(10, 1, 1, 1)).expect("out cell");
    assert_eq!(out.vlan, 42);
    assert_eq!(out.packets_out, 1);
    assert_eq!(out.bytes_out, 522);

    assert!(!cells.iter().any(|c| c.ip == Ipv4Addr::new(10, 1, 1, 1) && c.vlan == 0));
}

#[test]
fn swap_isolates_successive_intervals() {
    let pair = StorePair::with_defaults();
    for i in 0..100u32 {
        let ip = Ipv4Addr::from(0x0A000000 + i);
        pair.active().add(ip, Ipv4Addr::new(10, 0, 0, 1), 0, 60);
    }
    pair.swap();
    let first_total: u32 = {
        let mut total = 0;
        pair.retired().enumerate(|c| total += c.packets_out);
        total
    };
    pair.retired().reset();

    for i in 0..50u32 {
        let ip = Ipv4Addr::from(0x0B000000 + i);
        pair.active().add(ip, Ipv4Addr::new(10, 0, 0, 1), 0, 60);
    }
    pair.swap();
    let second_total: u32 = {
        let mut total = 0;
        pair.retired().enumerate(|c| total += c.packets_out);
        total
    };

    assert_eq!(first_total, 100);
    assert_eq!(second_total, 50);
}

#[test]
fn bucket_overflow_preserves_all_distinct_keys() {
    // H=4 (16 slots), B=2: force three distinct (ip_high, vlan) keys that
    // hash to the same slot by keeping the low 4 bits identical.
    let store = CounterStore::new(4, 2);
    let base: u32 = 0x0A00_0000;
    let ips: Vec<Ipv4Addr> = (0..3).map(|i| Ipv4Addr::from(base | (i << 4))).collect();

    for ip in &ips {
        store.add(*ip, Ipv4Addr::new(10, 0, 0, 1), 0, 40);
    }

    let mut seen = Vec::new();
    store.enumerate(|c| {
        if ips.contains(&c.ip) {
            seen.push((c.ip, c.packets_out));
        }
    });

    assert_eq!(seen.len(), 3, "all three distinct keys must survive overflow");
    for (_, packets_out) in seen {
        assert_eq!(packets_out, 1);
    }
}

#[test]
fn reset_makes_enumerate_yield_nothing() {
    let store = CounterStore::with_defaults();
    store.add(Ipv4Addr::new(1, 2, 3, 4), Ipv4Addr::new(5, 6, 7, 8), 0, 10);
    store.reset();

    let mut count = 0;
    store.enumerate(|_| count += 1);
    assert_eq!(count, 0);
}

#[test]
fn disjoint_sequences_after_reset_observe_only_second() {
    let store = CounterStore::with_defaults();
    store.add(Ipv4Addr::new(1, 1, 1, 1), Ipv4Addr::new(2, 2, 2, 2), 0, 10);
    store.reset();
    store.add(Ipv4Addr::new(3, 3, 3, 3), Ipv4Addr::new(4, 4, 4, 4), 0, 20);

    let mut ips = Vec::new();
    store.enumerate(|c| ips.push(c.ip));
    assert!(!ips.contains(&Ipv4Addr::new(1, 1, 1, 1)));
    assert!(ips.contains(&Ipv4Addr::new(3, 3, 3, 3)));
}
