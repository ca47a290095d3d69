use std::ops::Range;
use crate::cache::{Cache, CacheLevel, EvictedBlock, LookupOutcome};
use crate::config::{CacheConfig, ReplacementKind, WriteKind};
use crate::error::PolicyError;
use crate::geometry::Associativity;
use crate::replacement_policies::{FirstInFirstOut, LeastRecentlyUsed, NoPolicy, ReplacementPolicy};
use super::cache_config;

/// Counts how often a victim was asked for
#[derive(Default)]
struct CountingPolicy {
    calls: usize,
}

impl ReplacementPolicy for CountingPolicy {
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError> {
        self.calls += 1;
        NoPolicy.choose_victim(candidates)
    }
}

/// Looks the address up, installing it on a miss. Returns whether it hit
fn touch(cache: &mut impl CacheLevel, address: u64) -> bool {
    if cache.lookup(address).hit {
        return true;
    }
    cache.install(address).unwrap();
    false
}

fn two_way(kind: ReplacementKind) -> CacheConfig {
    // 2 sets of 2 ways, 16 byte blocks. Set 0 holds 0x1000, 0x1020, 0x1040, ...
    cache_config(64, 16, Associativity::SetAssociative { ways: 2 }, kind)
}

#[test]
fn direct_mapped_scenario() {
    let mut cache = Cache::from_config(cache_config(64, 16, Associativity::DirectMapped, ReplacementKind::None), 1);
    let hits: Vec<bool> = [0x00, 0x10, 0x20, 0x00].into_iter().map(|a| touch(&mut cache, a)).collect();
    assert_eq!(hits, vec![false, false, false, true]);
    assert_eq!(cache.valid_block_count(), 3);
}

#[test]
fn direct_mapped_never_asks_the_policy() {
    let config = cache_config(64, 16, Associativity::DirectMapped, ReplacementKind::None);
    let mut cache = Cache::new(config, CountingPolicy::default());
    for address in [0x00, 0x40, 0x80, 0x10, 0x50, 0x00] {
        assert!(!cache.lookup(address).hit);
        cache.install(address).unwrap();
    }
    assert_eq!(cache.policy().calls, 0);
}

#[test]
fn install_then_lookup_always_hits() {
    let associativities = [
        Associativity::DirectMapped,
        Associativity::SetAssociative { ways: 2 },
        Associativity::SetAssociative { ways: 8 },
        Associativity::FullyAssociative,
    ];
    let kinds = [ReplacementKind::Random, ReplacementKind::Fifo, ReplacementKind::Lru];
    for associativity in associativities {
        for kind in kinds {
            let mut cache = Cache::from_config(cache_config(256, 16, associativity, kind), 7);
            for step in 0..200u64 {
                let address = step.wrapping_mul(0x9E37_79B9) & 0xFFFF;
                if !cache.lookup(address).hit {
                    cache.install(address).unwrap();
                }
                let outcome = cache.lookup(address);
                assert!(outcome.hit, "{associativity} {kind} {address:#x}");
                assert_eq!(outcome.resident_block_index, cache.find(address));
            }
        }
    }
}

#[test]
fn lru_evicts_the_first_inserted_and_rebuilds_its_address() {
    let mut cache = Cache::new(two_way(ReplacementKind::Lru), LeastRecentlyUsed::new(4));
    assert_eq!(cache.install(0x1000), Ok(EvictedBlock::none()));
    assert_eq!(cache.install(0x1020), Ok(EvictedBlock::none()));
    let evicted = cache.install(0x1040).unwrap();
    assert_eq!(
        evicted,
        EvictedBlock { had_valid_data: true, was_dirty: false, reconstructed_address: Some(0x1000) }
    );
}

#[test]
fn lru_keeps_the_recently_used_block() {
    let mut cache = Cache::new(two_way(ReplacementKind::Lru), LeastRecentlyUsed::new(4));
    assert!(!touch(&mut cache, 0x1000));
    assert!(!touch(&mut cache, 0x1020));
    assert!(touch(&mut cache, 0x1000));
    let evicted = cache.install(0x1040).unwrap();
    assert_eq!(evicted.reconstructed_address, Some(0x1020));
    assert!(cache.contains(0x1000));
    assert!(!cache.contains(0x1020));
}

#[test]
fn fifo_evicts_in_insertion_order_despite_hits() {
    let mut cache = Cache::new(two_way(ReplacementKind::Fifo), FirstInFirstOut::new(4));
    assert!(!touch(&mut cache, 0x1000));
    assert!(!touch(&mut cache, 0x1020));
    assert!(touch(&mut cache, 0x1000));
    assert_eq!(cache.install(0x1040).unwrap().reconstructed_address, Some(0x1000));
    assert_eq!(cache.install(0x1060).unwrap().reconstructed_address, Some(0x1020));
}

#[test]
fn other_sets_are_untouched() {
    let mut cache = Cache::from_config(two_way(ReplacementKind::Lru), 1);
    cache.install(0x1010).unwrap();
    for address in [0x1000, 0x1020, 0x1040, 0x1060] {
        cache.install(address).unwrap();
    }
    assert!(cache.contains(0x1010));
}

#[test]
fn contains_does_not_count_as_a_use() {
    let mut cache = Cache::new(two_way(ReplacementKind::Lru), LeastRecentlyUsed::new(4));
    cache.install(0x1000).unwrap();
    cache.install(0x1020).unwrap();
    assert!(cache.contains(0x1000));
    assert_eq!(cache.install(0x1040).unwrap().reconstructed_address, Some(0x1000));
}

#[test]
fn fills_the_first_invalid_block() {
    let mut cache = Cache::from_config(cache_config(64, 16, Associativity::FullyAssociative, ReplacementKind::Random), 3);
    cache.install(0x100).unwrap();
    cache.install(0x200).unwrap();
    assert_eq!(cache.find(0x100), Some(0));
    let dropped = cache.evict(0x100);
    assert_eq!(dropped.reconstructed_address, Some(0x100));
    assert_eq!(cache.install(0x300), Ok(EvictedBlock::none()));
    assert_eq!(cache.find(0x300), Some(0));
    assert_eq!(cache.evict(0x999), EvictedBlock::none());
}

#[test]
fn dirty_bits_follow_the_write_policy() {
    let mut cache = Cache::from_config(cache_config(64, 16, Associativity::DirectMapped, ReplacementKind::None), 1);
    assert!(!cache.mark_dirty_if_write_back(0x1234));
    cache.install(0x1234).unwrap();
    assert!(cache.mark_dirty_if_write_back(0x1234));
    let evicted = cache.install(0x2234).unwrap();
    assert!(evicted.needs_write_back());
    assert_eq!(evicted.reconstructed_address, Some(0x1230));
    // The new block starts clean
    assert!(!cache.block(cache.find(0x2234).unwrap()).dirty);

    let write_through = CacheConfig::builder("wt")
        .capacity_bytes(64)
        .block_size(16)
        .unwrap()
        .write_policy(WriteKind::WriteThrough)
        .build()
        .unwrap();
    let mut cache = Cache::from_config(write_through, 1);
    cache.install(0x40).unwrap();
    assert!(!cache.mark_dirty_if_write_back(0x40));
    assert!(!cache.install(0x80).unwrap().was_dirty);
}

#[test]
fn lookup_reports_the_resident_block() {
    let mut cache = Cache::from_config(two_way(ReplacementKind::Fifo), 1);
    assert_eq!(cache.lookup(0x1010), LookupOutcome::miss());
    cache.install(0x1010).unwrap();
    cache.install(0x1030).unwrap();
    assert_eq!(cache.lookup(0x1030), LookupOutcome::hit(3));
    assert_eq!(cache.index_and_tag(0x1030), (1, 0x81));
}
