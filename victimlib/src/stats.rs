use serde::{Deserialize, Serialize};
use crate::config::HierarchyConfig;
use crate::error::StatisticsError;

/// Kind of a trace record
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Load,
    Store,
    Idle,
}

/// Hits and misses seen by one cache
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCounters {
    pub name: String,
    pub hits: u64,
    pub load_hits: u64,
    pub store_hits: u64,
    pub misses: u64,
}

impl LevelCounters {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    /// Accesses which reached this cache
    pub fn lookups(&self) -> u64 {
        self.hits + self.misses
    }

    fn record_hit(&mut self, operation: Operation) {
        self.hits += 1;
        match operation {
            Operation::Load => self.load_hits += 1,
            Operation::Store => self.store_hits += 1,
            Operation::Idle => {}
        }
    }
}

/// Run counters. Zeroed when the simulator is created, only ever incremented during a replay
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    pub access: u64,
    pub load: u64,
    pub store: u64,
    pub idle: u64,
    /// Accesses served by any cache, the victim cache included
    pub hit: u64,
    pub load_hit: u64,
    pub store_hit: u64,
    pub levels: Vec<LevelCounters>,
    pub victim: Option<LevelCounters>,
    /// Dirty blocks which left the hierarchy
    pub write_backs: u64,
    /// Stores forwarded to memory by a write through first level
    pub write_throughs: u64,
}

/// Which cache served an access
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ServedBy {
    Level(usize),
    Victim,
}

impl Counters {
    pub fn new(level_names: impl IntoIterator<Item = String>, victim_name: Option<String>) -> Self {
        Self {
            levels: level_names.into_iter().map(LevelCounters::new).collect(),
            victim: victim_name.map(LevelCounters::new),
            ..Self::default()
        }
    }

    /// Counts an access of the given kind. Idle records only count as idle
    pub fn record_access(&mut self, operation: Operation) {
        match operation {
            Operation::Load => {
                self.access += 1;
                self.load += 1;
            }
            Operation::Store => {
                self.access += 1;
                self.store += 1;
            }
            Operation::Idle => self.idle += 1,
        }
    }

    pub fn record_miss(&mut self, level: usize) {
        self.levels[level].misses += 1;
    }

    pub fn record_victim_miss(&mut self) {
        if let Some(victim) = self.victim.as_mut() {
            victim.misses += 1;
        }
    }

    pub fn record_hit(&mut self, served_by: ServedBy, operation: Operation) {
        self.hit += 1;
        match operation {
            Operation::Load => self.load_hit += 1,
            Operation::Store => self.store_hit += 1,
            Operation::Idle => {}
        }
        match served_by {
            ServedBy::Level(level) => self.levels[level].record_hit(operation),
            ServedBy::Victim => {
                if let Some(victim) = self.victim.as_mut() {
                    victim.record_hit(operation);
                }
            }
        }
    }

    /// Computes the hit rates. Fails if there were no accesses, loads or stores, since the rates
    /// would be undefined
    ///
    /// # Arguments
    ///
    /// * `latencies`: Per level and memory latencies, AMAT is only computed when given
    ///
    /// returns: Result<Summary, StatisticsError>
    pub fn finalize(&self, latencies: Option<&Latencies>) -> Result<Summary, StatisticsError> {
        if self.access == 0 {
            return Err(StatisticsError::ZeroCount("accesses"));
        }
        if self.load == 0 {
            return Err(StatisticsError::ZeroCount("loads"));
        }
        if self.store == 0 {
            return Err(StatisticsError::ZeroCount("stores"));
        }
        let level_hit_rates = self.levels.iter().map(|l| ratio(l.hits, l.lookups())).collect();
        Ok(Summary {
            avg_hit_rate: ratio(self.hit, self.access),
            load_hit_rate: ratio(self.load_hit, self.load),
            store_hit_rate: ratio(self.store_hit, self.store),
            level_hit_rates,
            amat: latencies.map(|l| self.amat(l)),
            counters: self.clone(),
        })
    }

    /// Average memory access time, from the local miss rate of each level
    ///
    /// The victim cache is treated as part of the first level
    fn amat(&self, latencies: &Latencies) -> f64 {
        let victim_hits = self.victim.as_ref().map_or(0, |v| v.hits);
        self.levels
            .iter()
            .zip(&latencies.levels)
            .enumerate()
            .rev()
            .fold(latencies.memory, |below, (position, (level, hit_latency))| {
                let hits = if position == 0 { level.hits + victim_hits } else { level.hits };
                let lookups = level.lookups();
                let miss_rate = if lookups == 0 { 0.0 } else { 1.0 - hits as f64 / lookups as f64 };
                hit_latency + miss_rate * below
            })
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Latencies used for AMAT, in whatever unit the configuration uses
#[derive(Debug, Clone, PartialEq)]
pub struct Latencies {
    pub levels: Vec<f64>,
    pub memory: f64,
}

impl Latencies {
    /// Present only if every level and memory have a latency configured
    pub fn from_config(config: &HierarchyConfig) -> Option<Self> {
        let levels = config.levels().iter().map(|l| l.hit_latency()).collect::<Option<Vec<_>>>()?;
        Some(Self {
            levels,
            memory: config.memory_latency()?,
        })
    }
}

/// Finalized statistics of a run. Serialisable, the binary prints it as JSON on request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(flatten)]
    pub counters: Counters,
    pub avg_hit_rate: f64,
    pub load_hit_rate: f64,
    pub store_hit_rate: f64,
    /// Hits over lookups for each level
    pub level_hit_rates: Vec<f64>,
    #[serde(default)]
    pub amat: Option<f64>,
}
