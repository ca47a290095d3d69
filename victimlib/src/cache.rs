use std::ops::Range;
use tracing::trace;
use crate::block::{BlockRecord, BlockTable};
use crate::config::{CacheConfig, WriteKind};
use crate::error::PolicyError;
use crate::geometry::CacheGeometry;
use crate::replacement_policies::{GenericPolicy, ReplacementPolicy};

/// Result of looking an address up in one cache
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LookupOutcome {
    pub hit: bool,
    /// The block holding the address, on a hit
    pub resident_block_index: Option<usize>,
}

impl LookupOutcome {
    pub fn miss() -> Self {
        Self { hit: false, resident_block_index: None }
    }

    pub fn hit(index: usize) -> Self {
        Self { hit: true, resident_block_index: Some(index) }
    }
}

/// What an install pushed out of the cache, so the caller can write it back or hand it to a victim
/// cache
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct EvictedBlock {
    pub had_valid_data: bool,
    pub was_dirty: bool,
    /// Block aligned address of the evicted data
    pub reconstructed_address: Option<u64>,
}

impl EvictedBlock {
    /// Nothing was displaced
    pub fn none() -> Self {
        Self::default()
    }

    /// Whether the evicted data has to reach the next level or memory
    pub fn needs_write_back(&self) -> bool {
        self.had_valid_data && self.was_dirty
    }
}

/// The contract shared by every cache level, including the victim cache
///
/// Each access is a single pass: `lookup`, and on a miss `install`, which may evict. The trait
/// assumes the caller has already aligned or split accesses, a single address stands for its block
pub trait CacheLevel {
    fn config(&self) -> &CacheConfig;

    fn geometry(&self) -> &CacheGeometry {
        self.config().geometry()
    }

    /// Splits an address into (set index, tag) for this level's geometry
    fn index_and_tag(&self, address: u64) -> (u64, u64) {
        self.geometry().split(address)
    }

    /// Block indices the set may use. The whole table for a fully associative cache
    fn candidates(&self, set_index: u64) -> Range<usize> {
        self.geometry().candidates(set_index)
    }

    /// Searches the candidates for the address. A hit updates the replacement policy
    fn lookup(&mut self, address: u64) -> LookupOutcome;

    /// Brings the address into the cache after a miss, evicting a block if the set is full
    ///
    /// Invalid blocks are filled first, in ascending order. The evicted block keeps its dirty bit in
    /// the returned [`EvictedBlock`], the slot itself starts clean
    fn install(&mut self, address: u64) -> Result<EvictedBlock, PolicyError>;

    /// Marks the block holding the address dirty, under a write back policy. Returns whether a
    /// block was marked
    fn mark_dirty_if_write_back(&mut self, address: u64) -> bool;

    /// Number of blocks holding data. Useful for analysing cache performance or debugging
    fn valid_block_count(&self) -> usize;
}

/// A generic cache implementation, parameterised by a replacement policy
///
/// The policy is a type parameter so that the compiler can inline its calls; the simulator uses
/// [`GenericPolicy`], which branches over the provided policies, while tests can plug in any
/// policy directly
pub struct Cache<R: ReplacementPolicy = GenericPolicy> {
    config: CacheConfig,
    blocks: BlockTable,
    policy: R,
}

impl<R: ReplacementPolicy> Cache<R> {
    pub fn new(config: CacheConfig, policy: R) -> Self {
        let blocks = BlockTable::new(config.geometry().num_blocks() as usize);
        Self { config, blocks, policy }
    }

    pub fn block(&self, index: usize) -> BlockRecord {
        self.blocks.get(index)
    }

    pub fn policy(&self) -> &R {
        &self.policy
    }

    /// Block index holding the address, without touching the replacement policy
    pub fn find(&self, address: u64) -> Option<usize> {
        let (set_index, tag) = self.index_and_tag(address);
        self.candidates(set_index).find(|&index| self.blocks.identity_matches(index, tag))
    }

    /// Side effect free hit check
    pub fn contains(&self, address: u64) -> bool {
        self.find(address).is_some()
    }

    /// Drops the block holding the address, if any, returning what was dropped
    pub fn evict(&mut self, address: u64) -> EvictedBlock {
        match self.find(address) {
            Some(index) => {
                let evicted = self.describe(index);
                self.blocks.invalidate(index);
                evicted
            }
            None => EvictedBlock::none(),
        }
    }

    /// Drops a block by index, returning what was dropped
    pub fn evict_index(&mut self, index: usize) -> EvictedBlock {
        let evicted = self.describe(index);
        self.blocks.invalidate(index);
        evicted
    }

    /// Places the address in a specific block, replacing whatever was there
    ///
    /// Used when the caller has already decided where the block goes, like a victim cache swap
    pub fn install_at(&mut self, index: usize, address: u64) -> EvictedBlock {
        let evicted = self.describe(index);
        let (_, tag) = self.index_and_tag(address);
        self.blocks.clear_dirty(index);
        self.blocks.set_tag_and_valid(index, tag);
        self.policy.on_install(index);
        evicted
    }

    /// Sets the dirty bit of a block directly, regardless of the write policy
    pub fn mark_dirty(&mut self, index: usize) {
        self.blocks.mark_dirty(index);
    }

    fn describe(&self, index: usize) -> EvictedBlock {
        let block = self.blocks.get(index);
        if !block.valid {
            return EvictedBlock::none();
        }
        let geometry = self.geometry();
        EvictedBlock {
            had_valid_data: true,
            was_dirty: block.dirty,
            reconstructed_address: Some(geometry.rebuild(geometry.set_of(index), block.tag)),
        }
    }
}

impl<R: ReplacementPolicy> CacheLevel for Cache<R> {
    fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn lookup(&mut self, address: u64) -> LookupOutcome {
        match self.find(address) {
            Some(index) => {
                self.policy.on_access(index);
                LookupOutcome::hit(index)
            }
            None => LookupOutcome::miss(),
        }
    }

    fn install(&mut self, address: u64) -> Result<EvictedBlock, PolicyError> {
        let (set_index, _) = self.index_and_tag(address);
        let candidates = self.candidates(set_index);
        let free = candidates.clone().find(|&index| !self.blocks.get(index).valid);
        let index = match free {
            Some(index) => index,
            // Only one place the block can go, nothing to choose
            None if candidates.len() == 1 => candidates.start,
            None => self.policy.choose_victim(candidates)?,
        };
        let evicted = self.install_at(index, address);
        if let Some(victim_address) = evicted.reconstructed_address {
            trace!(
                "{}: block {index} evicted {victim_address:#x} (dirty: {}) for {address:#x}",
                self.config.name(),
                evicted.was_dirty
            );
        }
        Ok(evicted)
    }

    fn mark_dirty_if_write_back(&mut self, address: u64) -> bool {
        if self.config.write() != WriteKind::WriteBack {
            return false;
        }
        match self.find(address) {
            Some(index) => {
                self.blocks.mark_dirty(index);
                true
            }
            None => false,
        }
    }

    fn valid_block_count(&self) -> usize {
        self.blocks.valid_count()
    }
}

impl Cache<GenericPolicy> {
    /// Creates a cache with the policy its configuration names
    pub fn from_config(config: CacheConfig, seed: u64) -> Self {
        let policy = GenericPolicy::new(config.replacement(), config.geometry().num_blocks() as usize, seed);
        Self::new(config, policy)
    }
}
