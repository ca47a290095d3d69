//! # VictimLib
//!
//! VictimLib replays memory access traces against a configurable cache hierarchy and reports
//! hit/miss statistics
//!
//! It provides a generic cache level which can be parameterised by a replacement policy, a victim
//! cache built on top of it, and a simulator which chains levels into a single access pipeline
//!
//! Everything runs on a single thread, one access at a time. The only randomness is the random
//! replacement policy, whose source can be seeded or replaced

/// Contains the block storage used by every cache level
pub mod block;

/// Contains the cache level contract and the generic cache implementing it
pub mod cache;

/// Contains the validated cache descriptions and the JSON and text configuration formats
pub mod config;

/// Contains the error types. Every error is fatal for the run
pub mod error;

/// Contains the address layout of a cache: tag, index and offset widths
pub mod geometry;

/// Contains the trace file reader
pub mod io;

/// Contains the provided replacement policies, with a trait for implementing custom replacement
/// policies
pub mod replacement_policies;

/// Contains the simulator used to replay a trace against a cache hierarchy
pub mod simulator;

/// Contains the run counters and the finalized statistics
pub mod stats;

/// Contains the trace record format and its parser
pub mod trace;

/// Contains the victim cache
pub mod victim;

#[cfg(test)]
mod test;
