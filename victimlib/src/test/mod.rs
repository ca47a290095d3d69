use crate::config::{CacheConfig, ReplacementKind, WriteKind};
use crate::geometry::Associativity;

mod cache;
mod tests;
mod victim;

/// A write back cache sized in bytes, for tests which don't go through a configuration file
fn cache_config(capacity: u64, block_size: u64, associativity: Associativity, kind: ReplacementKind) -> CacheConfig {
    CacheConfig::builder("test")
        .capacity_bytes(capacity)
        .block_size(block_size)
        .unwrap()
        .associativity(associativity)
        .replacement(kind)
        .write_policy(WriteKind::WriteBack)
        .build()
        .unwrap()
}
