use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Deserialize;
use tracing::{debug, warn};
use crate::error::{ConfigError, SimError};
use crate::geometry::{Associativity, CacheGeometry};
use crate::replacement_policies::DEFAULT_SEED;

/// Exclusive upper bound of every size in a configuration file (cache size in KiB, block size in
/// bytes, way count)
pub const MAX_CONFIG_SIZE: u64 = 262_144;

/// The replacement policy of a cache. `None` is only legal for direct mapped caches
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReplacementKind {
    #[serde(alias = "NONE")]
    None,
    #[serde(alias = "RANDOM")]
    Random,
    #[serde(alias = "FIFO")]
    Fifo,
    #[serde(alias = "LRU")]
    Lru,
}

impl fmt::Display for ReplacementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReplacementKind::None => "None",
            ReplacementKind::Random => "Random",
            ReplacementKind::Fifo => "FIFO",
            ReplacementKind::Lru => "LRU",
        };
        f.write_str(name)
    }
}

/// When stores reach memory. Defaults to write back
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WriteKind {
    WriteThrough,
    #[default]
    WriteBack,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteKind::WriteThrough => f.write_str("write through"),
            WriteKind::WriteBack => f.write_str("write back"),
        }
    }
}

/// A validated configuration for a single cache. Immutable, build it with [`CacheConfigBuilder`]
#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    name: String,
    geometry: CacheGeometry,
    replacement: ReplacementKind,
    write: WriteKind,
    hit_latency: Option<f64>,
}

impl CacheConfig {
    pub fn builder(name: impl Into<String>) -> CacheConfigBuilder {
        CacheConfigBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &CacheGeometry {
        &self.geometry
    }

    pub fn replacement(&self) -> ReplacementKind {
        self.replacement
    }

    pub fn write(&self) -> WriteKind {
        self.write
    }

    /// Latency of a hit in this cache, only used for AMAT
    pub fn hit_latency(&self) -> Option<f64> {
        self.hit_latency
    }
}

/// Builds a [`CacheConfig`] one validated step at a time
///
/// Steps which can fail return the builder in a `Result`, so a description can be assembled with
/// `?` and stops at the first invalid value
#[derive(Debug, Clone)]
pub struct CacheConfigBuilder {
    name: String,
    capacity: Option<u64>,
    block_size: Option<u64>,
    associativity: Associativity,
    replacement: Option<ReplacementKind>,
    write: WriteKind,
    hit_latency: Option<f64>,
}

impl CacheConfigBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capacity: None,
            block_size: None,
            associativity: Associativity::DirectMapped,
            replacement: None,
            write: WriteKind::default(),
            hit_latency: None,
        }
    }

    /// Sets the capacity in KiB, as configuration files give it
    pub fn capacity_kib(self, kib: u64) -> Result<Self, ConfigError> {
        check_config_size("cache size", kib)?;
        Ok(self.capacity_bytes(kib << 10))
    }

    /// Sets the capacity in bytes. Validated as part of the geometry in [`CacheConfigBuilder::build`]
    pub fn capacity_bytes(mut self, bytes: u64) -> Self {
        self.capacity = Some(bytes);
        self
    }

    pub fn block_size(mut self, bytes: u64) -> Result<Self, ConfigError> {
        check_config_size("block size", bytes)?;
        self.block_size = Some(bytes);
        Ok(self)
    }

    pub fn direct_mapped(mut self) -> Self {
        self.associativity = Associativity::DirectMapped;
        self
    }

    pub fn set_associative(mut self, ways: u64) -> Result<Self, ConfigError> {
        check_config_size("number of ways", ways)?;
        self.associativity = Associativity::SetAssociative { ways };
        Ok(self)
    }

    pub fn fully_associative(mut self) -> Self {
        self.associativity = Associativity::FullyAssociative;
        self
    }

    pub fn associativity(mut self, associativity: Associativity) -> Self {
        self.associativity = associativity;
        self
    }

    pub fn replacement(mut self, kind: ReplacementKind) -> Self {
        self.replacement = Some(kind);
        self
    }

    pub fn write_policy(mut self, kind: WriteKind) -> Self {
        self.write = kind;
        self
    }

    pub fn hit_latency(mut self, latency: f64) -> Self {
        self.hit_latency = Some(latency);
        self
    }

    /// Derives the geometry and checks the policy fits it
    ///
    /// A direct mapped cache has no choice to make, so any policy given for one is replaced by
    /// [`ReplacementKind::None`]
    pub fn build(self) -> Result<CacheConfig, ConfigError> {
        let capacity = self.capacity.ok_or(ConfigError::Missing("cache size"))?;
        let block_size = self.block_size.ok_or(ConfigError::Missing("block size"))?;
        let geometry = CacheGeometry::new(capacity, block_size, self.associativity)?;
        let replacement = match (self.associativity, self.replacement) {
            (Associativity::DirectMapped, Some(kind)) if kind != ReplacementKind::None => {
                debug!("{}: replacement policy {kind} ignored, the cache is direct mapped", self.name);
                ReplacementKind::None
            }
            (Associativity::DirectMapped, _) => ReplacementKind::None,
            (_, Some(ReplacementKind::None)) => return Err(ConfigError::PolicyRequiresDirectMapped),
            (_, Some(kind)) => kind,
            (_, None) => return Err(ConfigError::Missing("replacement policy")),
        };
        Ok(CacheConfig {
            name: self.name,
            geometry,
            replacement,
            write: self.write,
            hit_latency: self.hit_latency,
        })
    }
}

/// A victim cache: fully associative, sized in blocks, with the block size of the first level
#[derive(Debug, Clone, PartialEq)]
pub struct VictimConfig {
    cache: CacheConfig,
}

impl VictimConfig {
    pub fn new(blocks: u64, replacement: ReplacementKind, block_size: u64) -> Result<Self, ConfigError> {
        check_config_size("victim cache blocks", blocks)?;
        let capacity = blocks.checked_mul(block_size).ok_or(ConfigError::OutOfRange {
            field: "victim cache size",
            value: blocks,
            max: MAX_CONFIG_SIZE,
        })?;
        let cache = CacheConfig::builder("Victim")
            .capacity_bytes(capacity)
            .block_size(block_size)?
            .fully_associative()
            .replacement(replacement)
            .build()?;
        Ok(Self { cache })
    }

    pub fn blocks(&self) -> u64 {
        self.cache.geometry.num_blocks()
    }

    pub fn cache(&self) -> &CacheConfig {
        &self.cache
    }
}

/// Everything the simulator needs: the ordered levels, an optional victim cache behind the first
/// level, and the figures used for AMAT
#[derive(Debug, Clone, PartialEq)]
pub struct HierarchyConfig {
    levels: Vec<CacheConfig>,
    victim: Option<VictimConfig>,
    memory_latency: Option<f64>,
    seed: u64,
}

impl HierarchyConfig {
    pub fn new(levels: Vec<CacheConfig>, victim: Option<VictimConfig>) -> Result<Self, ConfigError> {
        if levels.is_empty() {
            return Err(ConfigError::NoLevels);
        }
        Ok(Self {
            levels,
            victim,
            memory_latency: None,
            seed: DEFAULT_SEED,
        })
    }

    /// A hierarchy of one cache with no victim cache
    pub fn single(level: CacheConfig) -> Self {
        Self {
            levels: vec![level],
            victim: None,
            memory_latency: None,
            seed: DEFAULT_SEED,
        }
    }

    pub fn with_memory_latency(mut self, latency: f64) -> Self {
        self.memory_latency = Some(latency);
        self
    }

    /// Seed for random replacement policies
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    pub fn levels(&self) -> &[CacheConfig] {
        &self.levels
    }

    pub fn victim(&self) -> Option<&VictimConfig> {
        self.victim.as_ref()
    }

    pub fn memory_latency(&self) -> Option<f64> {
        self.memory_latency
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Loads a configuration file. `.json` files are read as JSON, anything else as the line based
    /// text format
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SimError> {
        let path = path.as_ref();
        let file = File::open(path)?;
        if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("json")) {
            Self::from_json_reader(BufReader::new(file))
        } else {
            let mut text = String::new();
            BufReader::new(file).read_to_string(&mut text)?;
            Ok(Self::from_legacy_text(&text)?)
        }
    }

    pub fn from_json_reader(reader: impl Read) -> Result<Self, SimError> {
        let descriptor: HierarchyDescriptor = serde_json::from_reader(reader)?;
        Ok(descriptor.into_config()?)
    }

    pub fn from_json_str(json: &str) -> Result<Self, SimError> {
        let descriptor: HierarchyDescriptor = serde_json::from_str(json)?;
        Ok(descriptor.into_config()?)
    }

    /// Parses the line based text format
    ///
    /// After comments (`//` and `/* */`) and blank lines are removed, the lines are: cache size in
    /// KiB, block size, mapping (`1` direct mapped, `2` set associative, `3` fully associative),
    /// the way count for set associative caches, then the replacement policy (`1` random, `2` LRU,
    /// `3` FIFO) for anything but direct mapped caches
    ///
    /// # Examples
    ///
    /// ```
    /// use victimlib::config::HierarchyConfig;
    /// let config = HierarchyConfig::from_legacy_text("32 // KiB\n64\n2\n4\n2\n").unwrap();
    /// assert_eq!(config.levels()[0].geometry().ways(), 4);
    /// ```
    pub fn from_legacy_text(text: &str) -> Result<Self, ConfigError> {
        let stripped = strip_comments(text);
        let lines: Vec<&str> = stripped.lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if !(3..=5).contains(&lines.len()) {
            return Err(ConfigError::LineCount { expected: "3 to 5", found: lines.len() });
        }
        let mut lines = lines.into_iter();
        let mut builder = CacheConfig::builder("L1")
            .capacity_kib(next_number(&mut lines, "cache size")?)?
            .block_size(next_number(&mut lines, "block size")?)?;
        let mapping = next_number(&mut lines, "mapping")?;
        builder = match mapping {
            1 => builder.direct_mapped(),
            2 => builder.set_associative(next_number(&mut lines, "number of ways")?)?,
            3 => builder.fully_associative(),
            other => return Err(ConfigError::UnknownSelector { field: "mapping", value: other.to_string() }),
        };
        if mapping != 1 {
            let kind = match next_number(&mut lines, "replacement policy")? {
                1 => ReplacementKind::Random,
                2 => ReplacementKind::Lru,
                3 => ReplacementKind::Fifo,
                other => {
                    return Err(ConfigError::UnknownSelector { field: "replacement policy", value: other.to_string() })
                }
            };
            builder = builder.replacement(kind);
        }
        let leftover = lines.count();
        if leftover > 0 {
            return Err(ConfigError::LineCount { expected: "no more", found: leftover });
        }
        Ok(Self::single(builder.build()?))
    }
}

/// The JSON configuration file
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HierarchyDescriptor {
    pub content: Vec<LevelDescriptor>,
    #[serde(default)]
    pub victim_cache: Option<VictimDescriptor>,
    #[serde(default)]
    pub multi_level: bool,
    #[serde(default)]
    pub memory_latency: Option<f64>,
    #[serde(default)]
    pub seed: Option<u64>,
}

/// One entry of `content`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LevelDescriptor {
    #[serde(default)]
    pub name: Option<String>,
    pub cache_size: u64,
    pub block_size: u64,
    pub associativity: AssociativityDescriptor,
    #[serde(default)]
    pub number_of_way: Option<u64>,
    #[serde(default)]
    pub replacement_policy: Option<ReplacementKind>,
    #[serde(default)]
    pub write_policy: WriteKind,
    #[serde(default)]
    pub hit_latency: Option<f64>,
}

/// The mapping of a level - direct-mapped, set-associative (needs `number-of-way`), or
/// full-associative
#[derive(Debug, Copy, Clone, Deserialize)]
pub enum AssociativityDescriptor {
    #[serde(rename = "direct-mapped", alias = "direct")]
    DirectMapped,
    #[serde(rename = "set-associative")]
    SetAssociative,
    #[serde(rename = "full-associative", alias = "fully-associative", alias = "full")]
    FullAssociative,
}

/// The optional `victim-cache` entry. The replacement policy defaults to FIFO
#[derive(Debug, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VictimDescriptor {
    pub blocks: u64,
    #[serde(default = "VictimDescriptor::default_replacement")]
    pub replacement_policy: ReplacementKind,
}

impl VictimDescriptor {
    fn default_replacement() -> ReplacementKind {
        ReplacementKind::Fifo
    }
}

impl HierarchyDescriptor {
    /// Validates the descriptor. Without `multi-level`, only the first level is simulated
    pub fn into_config(self) -> Result<HierarchyConfig, ConfigError> {
        let mut content = self.content;
        if !self.multi_level && content.len() > 1 {
            warn!("multi-level is off, ignoring {} extra cache levels", content.len() - 1);
            content.truncate(1);
        }
        let levels = content
            .into_iter()
            .enumerate()
            .map(|(position, level)| level.into_config(position))
            .collect::<Result<Vec<_>, _>>()?;
        let victim = match (self.victim_cache, levels.first()) {
            (Some(victim), Some(first)) => Some(VictimConfig::new(
                victim.blocks,
                victim.replacement_policy,
                first.geometry().block_size(),
            )?),
            _ => None,
        };
        let mut config = HierarchyConfig::new(levels, victim)?;
        config.memory_latency = self.memory_latency;
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        Ok(config)
    }
}

impl LevelDescriptor {
    fn into_config(self, position: usize) -> Result<CacheConfig, ConfigError> {
        let name = self.name.unwrap_or_else(|| format!("L{}", position + 1));
        let mut builder = CacheConfig::builder(name)
            .capacity_kib(self.cache_size)?
            .block_size(self.block_size)?
            .write_policy(self.write_policy);
        builder = match self.associativity {
            AssociativityDescriptor::DirectMapped => builder.direct_mapped(),
            AssociativityDescriptor::SetAssociative => {
                builder.set_associative(self.number_of_way.ok_or(ConfigError::Missing("number-of-way"))?)?
            }
            AssociativityDescriptor::FullAssociative => builder.fully_associative(),
        };
        if let Some(kind) = self.replacement_policy {
            builder = builder.replacement(kind);
        }
        if let Some(latency) = self.hit_latency {
            builder = builder.hit_latency(latency);
        }
        builder.build()
    }
}

/// Sizes in configuration files must be powers of two in `1..MAX_CONFIG_SIZE`
fn check_config_size(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 || value >= MAX_CONFIG_SIZE {
        return Err(ConfigError::OutOfRange { field, value, max: MAX_CONFIG_SIZE });
    }
    if !value.is_power_of_two() {
        return Err(ConfigError::NotPowerOfTwo { field, value });
    }
    Ok(())
}

lazy_static! {
    // Block comments may span lines; the replacement keeps the line structure of what follows
    static ref COMMENTS: Regex = Regex::new(r"(?s)/\*.*?\*/|//[^\n]*").unwrap();
}

fn strip_comments(text: &str) -> String {
    COMMENTS.replace_all(text, "\n").into_owned()
}

fn next_number<'a>(lines: &mut impl Iterator<Item = &'a str>, field: &'static str) -> Result<u64, ConfigError> {
    let line = lines.next().ok_or(ConfigError::Missing(field))?;
    line.parse::<u64>().map_err(|_| ConfigError::NotANumber { field, value: line.to_string() })
}
