use std::time::{Duration, Instant};
use tracing::{debug, info};
use crate::cache::{Cache, CacheLevel, EvictedBlock};
use crate::config::{HierarchyConfig, WriteKind};
use crate::error::{PolicyError, SimError, StatisticsError};
use crate::replacement_policies::GenericPolicy;
use crate::stats::{Counters, Latencies, Operation, ServedBy, Summary};
use crate::trace::{AccessRequest, Records};
use crate::victim::VictimCache;

/// What happened to a single access
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum AccessOutcome {
    Idle,
    Hit(ServedBy),
    Miss,
}

/// The simulator routes each access through the cache levels and the optional victim cache, and
/// collects the counters.
///
/// It supports calling simulate multiple times, and will update the time taken to simulate and the
/// counters accordingly
pub struct Simulator {
    levels: Vec<Cache<GenericPolicy>>,
    victim: Option<VictimCache>,
    counters: Counters,
    latencies: Option<Latencies>,
    verbose: bool,
    simulation_time: Duration,
}

impl Simulator {
    /// Creates a new simulator for a given configuration
    ///
    /// # Arguments
    ///
    /// * `config`: A validated hierarchy, usually from a configuration file
    /// * `verbose`: Log the outcome of every access at info level
    ///
    /// returns: Simulator
    pub fn new(config: &HierarchyConfig, verbose: bool) -> Self {
        let levels: Vec<_> = config
            .levels()
            .iter()
            .enumerate()
            .map(|(position, level)| Cache::from_config(level.clone(), config.seed().wrapping_add(position as u64)))
            .collect();
        let victim = config.victim().map(|v| VictimCache::new(v, config.seed().wrapping_add(levels.len() as u64)));
        for level in &levels {
            let geometry = level.geometry();
            debug!(
                "{}: {} bytes, {} byte blocks, {}, {} replacement, {} (offset {} / index {} / tag {} bits)",
                level.config().name(),
                geometry.capacity(),
                geometry.block_size(),
                geometry.associativity(),
                level.config().replacement(),
                level.config().write(),
                geometry.offset_bits(),
                geometry.index_bits(),
                geometry.tag_bits()
            );
        }
        if let Some(v) = config.victim() {
            debug!("victim cache: {} blocks, {} replacement", v.blocks(), v.cache().replacement());
        }
        let counters = Counters::new(
            config.levels().iter().map(|l| l.name().to_string()),
            config.victim().map(|v| v.cache().name().to_string()),
        );
        Self {
            levels,
            victim,
            counters,
            latencies: Latencies::from_config(config),
            verbose,
            simulation_time: Duration::new(0, 0),
        }
    }

    /// Runs one access through the hierarchy
    ///
    /// Levels are looked up in order until one hits. If none does, the victim cache gets a chance to
    /// promote the block. Every level which missed above the hit then installs the block (only the
    /// first level on a promotion), with the first level's eviction going to the victim cache. Dirty
    /// evictions are written to the next level holding the block, and count as write backs once
    /// they reach memory
    pub fn access(&mut self, request: AccessRequest) -> Result<AccessOutcome, PolicyError> {
        let AccessRequest { operation, address } = request;
        self.counters.record_access(operation);
        if operation == Operation::Idle {
            return Ok(AccessOutcome::Idle);
        }

        let mut served_by = None;
        for (position, level) in self.levels.iter_mut().enumerate() {
            if level.lookup(address).hit {
                served_by = Some(ServedBy::Level(position));
                break;
            }
            self.counters.record_miss(position);
        }

        let mut promoted = false;
        if served_by.is_none() {
            if let Some(victim) = self.victim.as_mut() {
                if victim.try_promote(address) {
                    promoted = true;
                    served_by = Some(ServedBy::Victim);
                } else {
                    self.counters.record_victim_miss();
                }
            }
        }

        // A lower level hit skips the victim cache, which may still hold a stale copy
        let mut stale_dirty = false;
        if let (Some(ServedBy::Level(position)), Some(victim)) = (served_by, self.victim.as_mut()) {
            if position > 0 {
                stale_dirty = victim.take(address).was_dirty;
            }
        }

        let missed_levels = match served_by {
            Some(ServedBy::Level(position)) => position,
            Some(ServedBy::Victim) => 1,
            None => self.levels.len(),
        };
        for position in 0..missed_levels {
            let evicted = self.levels[position].install(address)?;
            if position == 0 {
                self.settle_first_level_eviction(address, evicted, promoted)?;
            } else {
                self.write_down(position + 1, evicted);
            }
        }
        if stale_dirty {
            if let Some(index) = self.levels[0].find(address) {
                self.levels[0].mark_dirty(index);
            }
        }

        if let Some(served_by) = served_by {
            self.counters.record_hit(served_by, operation);
        }
        if operation == Operation::Store {
            match self.levels[0].config().write() {
                WriteKind::WriteBack => {
                    self.levels[0].mark_dirty_if_write_back(address);
                }
                WriteKind::WriteThrough => self.counters.write_throughs += 1,
            }
        }

        let outcome = served_by.map_or(AccessOutcome::Miss, AccessOutcome::Hit);
        if self.verbose {
            info!("{operation:?} {address:#x}: {outcome:?}");
        }
        Ok(outcome)
    }

    /// Hands the block the first level evicted to the victim cache, or writes it down
    fn settle_first_level_eviction(&mut self, address: u64, evicted: EvictedBlock, promoted: bool) -> Result<(), PolicyError> {
        if self.victim.is_none() {
            self.write_down(1, evicted);
            return Ok(());
        }
        if promoted {
            // Both halves of the swap happen before the next access
            let promoted_dirty = self.victim.as_mut().is_some_and(|victim| victim.swap(address, evicted));
            if promoted_dirty {
                if let Some(index) = self.levels[0].find(address) {
                    self.levels[0].mark_dirty(index);
                }
            }
        } else if let Some(victim) = self.victim.as_mut() {
            let displaced = victim.absorb(evicted)?;
            self.write_down(1, displaced);
        }
        Ok(())
    }

    /// Writes a dirty evicted block to the first level from `first_level` down which holds it, or
    /// to memory when none does
    fn write_down(&mut self, first_level: usize, evicted: EvictedBlock) {
        let Some(address) = evicted.reconstructed_address.filter(|_| evicted.needs_write_back()) else {
            return;
        };
        for level in self.levels.iter_mut().skip(first_level) {
            if let Some(index) = level.find(address) {
                level.mark_dirty(index);
                return;
            }
        }
        self.counters.write_backs += 1;
    }

    /// Replays a sequence of accesses
    pub fn replay(&mut self, requests: impl IntoIterator<Item = AccessRequest>) -> Result<&Counters, PolicyError> {
        let start = Instant::now();
        for request in requests {
            self.access(request)?;
        }
        self.simulation_time += start.elapsed();
        Ok(&self.counters)
    }

    /// Simulates the caches on a whole trace held in memory
    ///
    /// The trace is parsed as it is replayed, so the first bad line aborts the run with whatever
    /// was counted up to it discarded by the caller
    ///
    /// Note that reads from the byte array are *guaranteed to be sequential*. This means that when
    /// using something like mmap, one can advise the operating system that sequential reads will be
    /// used, which can increase read performance
    ///
    /// # Arguments
    ///
    /// * `bytes`: The input byte array
    ///
    /// returns: Result<&Counters, SimError>
    pub fn simulate(&mut self, bytes: &[u8]) -> Result<&Counters, SimError> {
        let start = Instant::now();
        for record in Records::new(bytes) {
            self.access(record?)?;
        }
        self.simulation_time += start.elapsed();
        Ok(&self.counters)
    }

    /// Finalizes the counters into hit rates, plus AMAT when latencies are configured
    pub fn summary(&self) -> Result<Summary, StatisticsError> {
        self.counters.finalize(self.latencies.as_ref())
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    pub fn levels(&self) -> &[Cache<GenericPolicy>] {
        &self.levels
    }

    pub fn victim(&self) -> Option<&VictimCache> {
        self.victim.as_ref()
    }

    /// Gets the wall-clock execution time for processing
    pub fn get_execution_time(&self) -> &Duration {
        &self.simulation_time
    }

    /// Gets the number of blocks holding data in each level, the victim cache last
    pub fn get_valid_block_counts(&self) -> Vec<u64> {
        self.levels
            .iter()
            .map(|l| l.valid_block_count() as u64)
            .chain(self.victim.iter().map(|v| v.valid_block_count() as u64))
            .collect()
    }
}
