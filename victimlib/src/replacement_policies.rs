use std::ops::Range;
use crate::config::ReplacementKind;
use crate::error::PolicyError;

/// Seed used by [`XorShift64::default`], so runs with a random policy are reproducible unless a
/// seed is configured
pub const DEFAULT_SEED: u64 = 0x2545_F491_4F6C_DD1D;

/// A generic trait for implementing replacement policies. Can be used to parameterise a Cache.
///
/// All indices are absolute block indices into the cache's block table
pub trait ReplacementPolicy {
    /// Picks the block to evict among the candidates
    ///
    /// Only called when every candidate holds valid data, the cache itself fills invalid blocks
    /// first
    ///
    /// # Arguments
    ///
    /// * `candidates`: The block indices of the set, or of the whole cache when fully associative
    ///
    /// returns: Result<usize, PolicyError>
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError>;

    /// Updates the policy when a block is hit
    ///
    /// Not applicable for some policies, a default which does nothing is provided
    fn on_access(&mut self, _index: usize) {}

    /// Updates the policy when a block is newly occupied
    fn on_install(&mut self, _index: usize) {}
}

/// Source of randomness for [`RandomPolicy`]. Tests inject scripted sources to force a victim
pub trait RandomSource {
    fn next_u64(&mut self) -> u64;

    /// Uniformly draws a value in `[0, bound)`. Rejection sampling avoids the modulo bias
    ///
    /// # Examples
    ///
    /// ```
    /// use victimlib::replacement_policies::{RandomSource, XorShift64};
    /// let mut source = XorShift64::new(7);
    /// assert!((0..1000).all(|_| source.next_below(6) < 6));
    /// ```
    fn next_below(&mut self, bound: u64) -> u64 {
        debug_assert!(bound > 0);
        let threshold = bound.wrapping_neg() % bound;
        loop {
            let value = self.next_u64();
            if value >= threshold {
                return value % bound;
            }
        }
    }
}

/// xorshift64 generator. Tiny state, plenty good enough for picking victims
#[derive(Debug, Clone)]
pub struct XorShift64 {
    state: u64,
}

impl XorShift64 {
    /// A zero seed would lock the generator at zero, so it is replaced by [`DEFAULT_SEED`]
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { DEFAULT_SEED } else { seed },
        }
    }
}

impl Default for XorShift64 {
    fn default() -> Self {
        Self::new(DEFAULT_SEED)
    }
}

impl RandomSource for XorShift64 {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }
}

#[derive(Default)]
/// NoPolicy is used for direct mapped caches, where every address has exactly one home
///
/// It only accepts single block candidate ranges, anything wider means the cache was built with the
/// wrong policy
pub struct NoPolicy;

impl ReplacementPolicy for NoPolicy {
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError> {
        match candidates.len() {
            0 => Err(PolicyError::EmptyCandidates),
            1 => Ok(candidates.start),
            n => Err(PolicyError::MultipleCandidates(n)),
        }
    }
}

/// Evicts a uniformly random candidate. Ignores accesses and installs
pub struct RandomPolicy {
    source: Box<dyn RandomSource>,
}

impl RandomPolicy {
    pub fn new(source: Box<dyn RandomSource>) -> Self {
        Self { source }
    }

    pub fn seeded(seed: u64) -> Self {
        Self::new(Box::new(XorShift64::new(seed)))
    }
}

impl ReplacementPolicy for RandomPolicy {
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError> {
        if candidates.is_empty() {
            return Err(PolicyError::EmptyCandidates);
        }
        let offset = self.source.next_below(candidates.len() as u64) as usize;
        Ok(candidates.start + offset)
    }
}

/// First in, first out replacement policy
///
/// Every block gets a stamp from a logical clock when it is installed. The victim is the candidate
/// with the oldest stamp; hits don't touch the stamps. Blocks never installed keep stamp 0 and so
/// are always chosen before anything is evicted
pub struct FirstInFirstOut {
    install_times: Vec<u64>,
    time: u64,
}

impl FirstInFirstOut {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            install_times: vec![0; num_blocks],
            time: 1,
        }
    }
}

impl ReplacementPolicy for FirstInFirstOut {
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError> {
        oldest(&self.install_times, candidates)
    }

    fn on_install(&mut self, index: usize) {
        self.install_times[index] = self.time;
        self.time += 1;
    }
}

/// Least Recently Used replacement policy
///
/// This implementation keeps track of when each block was last used, and also keeps track of a
/// logical clock, which is updated each time a block is used. Both hits and installs count as a
/// use. On equal stamps the lowest block index is chosen
pub struct LeastRecentlyUsed {
    last_used_times: Vec<u64>,
    // Starts at 1, so unused blocks sort first
    time: u64,
}

impl LeastRecentlyUsed {
    pub fn new(num_blocks: usize) -> Self {
        Self {
            last_used_times: vec![0; num_blocks],
            time: 1,
        }
    }
}

impl ReplacementPolicy for LeastRecentlyUsed {
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError> {
        oldest(&self.last_used_times, candidates)
    }

    fn on_access(&mut self, index: usize) {
        self.last_used_times[index] = self.time;
        self.time += 1;
    }

    fn on_install(&mut self, index: usize) {
        self.on_access(index);
    }
}

/// Index of the smallest stamp in the range, the first one wins ties
fn oldest(stamps: &[u64], candidates: Range<usize>) -> Result<usize, PolicyError> {
    let mut min_value = u64::MAX;
    let mut min_index = None;
    for index in candidates {
        if stamps[index] < min_value {
            min_value = stamps[index];
            min_index = Some(index);
        }
    }
    min_index.ok_or(PolicyError::EmptyCandidates)
}

/// Enum for all 4 policies provided by the library
///
/// Trait objects would do, but every access of every level goes through the policy. Branching
/// explicitly lets the compiler see the concrete types and inline the policy calls
pub enum GenericPolicy {
    NoPolicy(NoPolicy),
    Random(RandomPolicy),
    FirstInFirstOut(FirstInFirstOut),
    LeastRecentlyUsed(LeastRecentlyUsed),
}

impl GenericPolicy {
    /// Creates the policy for a kind, sized for a cache of `num_blocks` blocks
    ///
    /// `seed` only matters for [`ReplacementKind::Random`]
    pub fn new(kind: ReplacementKind, num_blocks: usize, seed: u64) -> Self {
        match kind {
            ReplacementKind::None => NoPolicy.into(),
            ReplacementKind::Random => RandomPolicy::seeded(seed).into(),
            ReplacementKind::Fifo => FirstInFirstOut::new(num_blocks).into(),
            ReplacementKind::Lru => LeastRecentlyUsed::new(num_blocks).into(),
        }
    }

    pub fn kind(&self) -> ReplacementKind {
        match self {
            GenericPolicy::NoPolicy(_) => ReplacementKind::None,
            GenericPolicy::Random(_) => ReplacementKind::Random,
            GenericPolicy::FirstInFirstOut(_) => ReplacementKind::Fifo,
            GenericPolicy::LeastRecentlyUsed(_) => ReplacementKind::Lru,
        }
    }
}

impl From<NoPolicy> for GenericPolicy {
    fn from(value: NoPolicy) -> Self {
        Self::NoPolicy(value)
    }
}

impl From<RandomPolicy> for GenericPolicy {
    fn from(value: RandomPolicy) -> Self {
        Self::Random(value)
    }
}

impl From<FirstInFirstOut> for GenericPolicy {
    fn from(value: FirstInFirstOut) -> Self {
        Self::FirstInFirstOut(value)
    }
}

impl From<LeastRecentlyUsed> for GenericPolicy {
    fn from(value: LeastRecentlyUsed) -> Self {
        Self::LeastRecentlyUsed(value)
    }
}

impl ReplacementPolicy for GenericPolicy {
    fn choose_victim(&mut self, candidates: Range<usize>) -> Result<usize, PolicyError> {
        match self {
            GenericPolicy::NoPolicy(p) => p.choose_victim(candidates),
            GenericPolicy::Random(p) => p.choose_victim(candidates),
            GenericPolicy::FirstInFirstOut(p) => p.choose_victim(candidates),
            GenericPolicy::LeastRecentlyUsed(p) => p.choose_victim(candidates),
        }
    }

    fn on_access(&mut self, index: usize) {
        match self {
            GenericPolicy::NoPolicy(p) => p.on_access(index),
            GenericPolicy::Random(p) => p.on_access(index),
            GenericPolicy::FirstInFirstOut(p) => p.on_access(index),
            GenericPolicy::LeastRecentlyUsed(p) => p.on_access(index),
        }
    }

    fn on_install(&mut self, index: usize) {
        match self {
            GenericPolicy::NoPolicy(p) => p.on_install(index),
            GenericPolicy::Random(p) => p.on_install(index),
            GenericPolicy::FirstInFirstOut(p) => p.on_install(index),
            GenericPolicy::LeastRecentlyUsed(p) => p.on_install(index),
        }
    }
}
