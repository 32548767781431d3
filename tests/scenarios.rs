//! End-to-end scenarios for the cache levels, the hierarchy and paging.

use memsim::{
    cache::{Cache, IsCache},
    hierarchy::{CacheHierarchy, Resolution},
    replace::{fifo::Fifo, lfu::Lfu, lru::Lru},
    vm::{
        replace::{Clock, Fifo as PageFifo, Lru as PageLru},
        PageReplace, Resident, VirtualMemory,
    },
    SimError,
};
use rstest::rstest;

const BLOCK: u64 = 64;
const PAGE: u64 = 4096;

fn level(name: &str, sets: u64, ways: usize, latency: u64) -> Box<dyn IsCache> {
    Box::new(Cache::new(name.into(), BLOCK * sets * ways as u64, BLOCK, ways, latency, Lru).unwrap())
}

#[test]
fn fifo_single_set_evicts_first_arrival() {
    let mut cache = Cache::new("L1".into(), 2 * BLOCK, BLOCK, 2, 1, Fifo).unwrap();
    let (a, b, c) = (0, BLOCK, 2 * BLOCK);
    assert!(!cache.access(a));
    assert!(!cache.access(b));
    assert!(!cache.access(c));
    assert!(!cache.access(a), "C should have evicted A");
    // A's refill evicted B (the oldest remaining), so probe B without touching it.
    assert!(!cache.contains(b));

    let mut cache = Cache::new("L1".into(), 2 * BLOCK, BLOCK, 2, 1, Fifo).unwrap();
    cache.access(a);
    cache.access(b);
    cache.access(c);
    assert!(cache.access(b), "B survives C's insertion");
}

#[rstest]
#[case::fifo(Box::new(Cache::new("c".into(), 4 * BLOCK, BLOCK, 4, 1, Fifo).unwrap()) as Box<dyn IsCache>)]
#[case::lru(Box::new(Cache::new("c".into(), 4 * BLOCK, BLOCK, 4, 1, Lru).unwrap()) as Box<dyn IsCache>)]
#[case::lfu(Box::new(Cache::new("c".into(), 4 * BLOCK, BLOCK, 4, 1, Lfu).unwrap()) as Box<dyn IsCache>)]
fn vacant_ways_fill_before_any_eviction(#[case] mut cache: Box<dyn IsCache>) {
    for block in 0..4 {
        assert!(!cache.access(block * BLOCK));
    }
    for block in 0..4 {
        assert!(cache.access(block * BLOCK + 3));
    }
    assert_eq!((cache.hits(), cache.misses()), (4, 4));
}

#[test]
fn lru_never_evicts_the_block_just_touched() {
    let mut cache = Cache::new("c".into(), 4 * BLOCK, BLOCK, 4, 1, Lru).unwrap();
    for block in 0..4 {
        cache.access(block * BLOCK);
    }
    for next in 4..20 {
        let x = (next % 4) * BLOCK;
        cache.access(x);
        cache.access(next * BLOCK * 7);
        assert!(cache.contains(x));
    }
}

#[test]
fn cold_access_fills_every_level() {
    let mut h = CacheHierarchy::new(
        vec![level("L1", 4, 2, 1), level("L2", 8, 4, 5), level("L3", 16, 8, 20)],
        100,
    );
    assert_eq!(h.access(0x1234), (Resolution::Memory, 126));
    assert!(h.levels().iter().all(|c| c.contains(0x1234)));

    let before: Vec<_> = h.levels().iter().map(|c| (c.hits(), c.misses())).collect();
    assert_eq!(h.access(0x1234), (Resolution::Hit(0), 1));
    let after: Vec<_> = h.levels().iter().map(|c| (c.hits(), c.misses())).collect();
    // Only L1 was touched by the second access.
    assert_eq!(after[0], (before[0].0 + 1, before[0].1));
    assert_eq!(after[1..], before[1..]);
}

/// Refill is a plain second `access` on each level in front of the one that
/// supplied the block. The probe that missed already installed the block, so
/// every refill call shows up as an extra hit in that level's counters. This is
/// intended: `resolved()` is the count of accesses each level really served.
#[test]
fn refill_traffic_is_counted_per_level() {
    let mut h = CacheHierarchy::new(
        vec![level("L1", 1, 1, 1), level("L2", 4, 2, 5), level("L3", 16, 4, 20)],
        100,
    );
    h.access(0);
    let counters: Vec<_> = h.levels().iter().map(|c| (c.hits(), c.misses())).collect();
    assert_eq!(counters, vec![(1, 1), (1, 1), (1, 1)]);

    h.access(BLOCK);
    assert_eq!(h.access(0), (Resolution::Hit(1), 6));
    let l1 = &h.levels()[0];
    // Probe miss, then refill hit, on top of the two earlier accesses.
    assert_eq!((l1.hits(), l1.misses()), (3, 3));
    assert_eq!(h.resolved(), &[0, 1, 0]);
    assert_eq!(h.memory_accesses(), 2);
}

#[test]
fn fifo_paging_refaults_after_eviction() {
    let mut vm = VirtualMemory::new(4, 2, PAGE as usize, Box::new(PageFifo)).unwrap();
    vm.create_process(0, 4).unwrap();

    assert_eq!(vm.translate(0, 0).unwrap(), 0);
    assert_eq!(vm.page_faults(), 1);
    assert_eq!(vm.translate(0, PAGE).unwrap(), PAGE);
    assert_eq!(vm.page_faults(), 2);
    assert_eq!(vm.translate(0, 2 * PAGE).unwrap(), 0);
    assert_eq!(vm.page_faults(), 3);
    assert_eq!(vm.frame_table()[0], Some(Resident { pid: 0, vpn: 2 }));
    vm.translate(0, 0).unwrap();
    assert_eq!(vm.page_faults(), 4);
    assert_eq!(vm.page_hits(), 0);
}

#[rstest]
#[case::fifo(Box::new(PageFifo))]
#[case::lru(Box::new(PageLru))]
#[case::clock(Box::new(Clock::new()))]
fn paged_out_bytes_survive(#[case] repl: Box<dyn PageReplace>) {
    let mut vm = VirtualMemory::new(8, 2, 256, repl).unwrap();
    vm.create_processes(2).unwrap();
    for pid in 0..2 {
        for vpn in 0..8u64 {
            vm.write(pid, vpn * 256 + vpn, (pid as u8) << 4 | vpn as u8).unwrap();
        }
    }
    for pid in 0..2 {
        for vpn in 0..8u64 {
            assert_eq!(vm.read(pid, vpn * 256 + vpn).unwrap(), (pid as u8) << 4 | vpn as u8);
        }
    }
}

#[test]
fn failed_translation_leaves_tables_untouched() {
    let mut vm = VirtualMemory::new(2, 1, 64, Box::new(PageLru)).unwrap();
    vm.create_process(3, 2).unwrap();
    assert!(matches!(vm.translate(4, 0), Err(SimError::UnknownProcess(4))));
    assert!(matches!(vm.translate(3, 128), Err(SimError::InvalidAddress { .. })));
    assert_eq!(vm.frame_table(), &[None]);
    assert!(vm.page_table(3).unwrap().iter().all(|pte| !pte.valid()));
}
