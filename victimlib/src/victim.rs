use crate::cache::{Cache, CacheLevel, EvictedBlock, LookupOutcome};
use crate::config::{CacheConfig, VictimConfig};
use crate::error::PolicyError;
use crate::replacement_policies::GenericPolicy;

/// A small fully associative buffer catching the blocks evicted from the level above it
///
/// This is a thin wrapper around a [`Cache`], only [`VictimCache::absorb`], [`VictimCache::try_promote`]
/// and [`VictimCache::swap`] are specific to it
pub struct VictimCache {
    cache: Cache<GenericPolicy>,
}

impl VictimCache {
    pub fn new(config: &VictimConfig, seed: u64) -> Self {
        Self {
            cache: Cache::from_config(config.cache().clone(), seed),
        }
    }

    /// Wraps an existing cache, which must be fully associative
    pub fn from_cache(cache: Cache<GenericPolicy>) -> Self {
        debug_assert_eq!(cache.geometry().num_sets(), 1);
        Self { cache }
    }

    pub fn inner(&self) -> &Cache<GenericPolicy> {
        &self.cache
    }

    /// Takes in a block evicted from the main level, keeping its dirty bit
    ///
    /// Returns whatever this cache had to evict to make room. A block already held is not
    /// duplicated, only its dirty bit is merged
    pub fn absorb(&mut self, evicted: EvictedBlock) -> Result<EvictedBlock, PolicyError> {
        let Some(address) = evicted.reconstructed_address.filter(|_| evicted.had_valid_data) else {
            return Ok(EvictedBlock::none());
        };
        let (index, displaced) = match self.cache.find(address) {
            Some(index) => (index, EvictedBlock::none()),
            None => {
                let displaced = self.cache.install(address)?;
                match self.cache.find(address) {
                    Some(index) => (index, displaced),
                    None => return Ok(displaced),
                }
            }
        };
        if evicted.was_dirty {
            self.cache.mark_dirty(index);
        }
        Ok(displaced)
    }

    /// Removes the block holding the address, if any, returning it
    ///
    /// Used when a lower level serves an address this cache still holds
    pub fn take(&mut self, address: u64) -> EvictedBlock {
        self.cache.evict(address)
    }

    /// Looks the address up. On a hit the caller is expected to [`VictimCache::swap`] it with the
    /// block the main level evicts to make room for it
    pub fn try_promote(&mut self, address: u64) -> bool {
        self.cache.lookup(address).hit
    }

    /// Completes a promotion: the block holding `address` leaves this cache and the block evicted
    /// from the main level takes its slot
    ///
    /// If the main level evicted nothing valid the slot is simply freed. Returns the dirty bit of the
    /// promoted block, which the main level has to keep
    pub fn swap(&mut self, address: u64, evicted: EvictedBlock) -> bool {
        let Some(index) = self.cache.find(address) else {
            return false;
        };
        let promoted = self.cache.block(index);
        match evicted.reconstructed_address.filter(|_| evicted.had_valid_data) {
            Some(evicted_address) => {
                self.cache.install_at(index, evicted_address);
                if evicted.was_dirty {
                    self.cache.mark_dirty(index);
                }
            }
            None => {
                self.cache.evict_index(index);
            }
        }
        promoted.dirty
    }
}

impl CacheLevel for VictimCache {
    fn config(&self) -> &CacheConfig {
        self.cache.config()
    }

    fn lookup(&mut self, address: u64) -> LookupOutcome {
        self.cache.lookup(address)
    }

    fn install(&mut self, address: u64) -> Result<EvictedBlock, PolicyError> {
        self.cache.install(address)
    }

    fn mark_dirty_if_write_back(&mut self, address: u64) -> bool {
        self.cache.mark_dirty_if_write_back(address)
    }

    fn valid_block_count(&self) -> usize {
        self.cache.valid_block_count()
    }
}
