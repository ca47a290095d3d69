use crate::cache::{CacheLevel, EvictedBlock};
use crate::config::{ReplacementKind, VictimConfig};
use crate::victim::VictimCache;

fn victim(blocks: u64) -> VictimCache {
    VictimCache::new(&VictimConfig::new(blocks, ReplacementKind::Fifo, 16).unwrap(), 1)
}

fn evicted(address: u64, dirty: bool) -> EvictedBlock {
    EvictedBlock { had_valid_data: true, was_dirty: dirty, reconstructed_address: Some(address) }
}

#[test]
fn is_fully_associative() {
    let cache = victim(4);
    assert_eq!(cache.geometry().num_sets(), 1);
    assert_eq!(cache.geometry().ways(), 4);
    assert_eq!(cache.config().replacement(), ReplacementKind::Fifo);
}

#[test]
fn absorb_ignores_empty_evictions() {
    let mut cache = victim(2);
    assert_eq!(cache.absorb(EvictedBlock::none()), Ok(EvictedBlock::none()));
    assert_eq!(cache.valid_block_count(), 0);
}

#[test]
fn absorb_keeps_the_dirty_bit() {
    let mut cache = victim(2);
    cache.absorb(evicted(0x100, true)).unwrap();
    cache.absorb(evicted(0x200, false)).unwrap();
    let inner = cache.inner();
    assert!(inner.block(inner.find(0x100).unwrap()).dirty);
    assert!(!inner.block(inner.find(0x200).unwrap()).dirty);
}

#[test]
fn absorb_returns_its_own_eviction() {
    let mut cache = victim(1);
    cache.absorb(evicted(0x100, true)).unwrap();
    let displaced = cache.absorb(evicted(0x200, false)).unwrap();
    assert_eq!(displaced, evicted(0x100, true));
    assert!(cache.try_promote(0x200));
    assert!(!cache.try_promote(0x100));
}

#[test]
fn swap_exchanges_blocks_in_place() {
    let mut cache = victim(2);
    cache.absorb(evicted(0x100, true)).unwrap();
    cache.absorb(evicted(0x200, false)).unwrap();
    let slot = cache.inner().find(0x100);
    assert!(cache.try_promote(0x100));
    assert!(cache.swap(0x100, evicted(0x300, false)));
    assert_eq!(cache.inner().find(0x300), slot);
    assert!(!cache.inner().contains(0x100));
    assert!(cache.inner().contains(0x200));
    assert!(!cache.inner().block(slot.unwrap()).dirty);
}

#[test]
fn swap_with_nothing_frees_the_slot() {
    let mut cache = victim(2);
    cache.absorb(evicted(0x100, false)).unwrap();
    assert!(!cache.swap(0x100, EvictedBlock::none()));
    assert_eq!(cache.valid_block_count(), 0);
    // Unknown address, nothing happens
    assert!(!cache.swap(0x500, evicted(0x600, true)));
    assert_eq!(cache.valid_block_count(), 0);
}

#[test]
fn absorb_merges_a_block_it_already_holds() {
    let mut cache = victim(2);
    cache.absorb(evicted(0x100, false)).unwrap();
    assert_eq!(cache.absorb(evicted(0x100, true)), Ok(EvictedBlock::none()));
    assert_eq!(cache.valid_block_count(), 1);
    let inner = cache.inner();
    assert!(inner.block(inner.find(0x100).unwrap()).dirty);
}

#[test]
fn take_removes_the_block() {
    let mut cache = victim(2);
    cache.absorb(evicted(0x100, true)).unwrap();
    assert_eq!(cache.take(0x100), evicted(0x100, true));
    assert_eq!(cache.valid_block_count(), 0);
    assert_eq!(cache.take(0x100), EvictedBlock::none());
}
