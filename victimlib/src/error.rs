use thiserror::Error;

/// An invalid cache description. Raised while building a configuration, before any cache exists
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{field} must be a non-zero power of two, got {value}")]
    NotPowerOfTwo { field: &'static str, value: u64 },

    #[error("capacity of {capacity} bytes cannot hold a single {block_size} byte block")]
    CapacityBelowBlockSize { capacity: u64, block_size: u64 },

    #[error("{ways} ways do not fit in a cache of {num_blocks} blocks")]
    WaysExceedBlocks { ways: u64, num_blocks: u64 },

    #[error("{offset_bits} offset bits and {index_bits} index bits overflow a {address_width} bit address")]
    BitWidthOverflow { offset_bits: u32, index_bits: u32, address_width: u32 },

    #[error("{field} must be in 1..{max}, got {value}")]
    OutOfRange { field: &'static str, value: u64, max: u64 },

    #[error("replacement policy 'none' requires a direct mapped cache")]
    PolicyRequiresDirectMapped,

    #[error("unknown {field} '{value}'")]
    UnknownSelector { field: &'static str, value: String },

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("expected {expected} configuration lines, found {found}")]
    LineCount { expected: &'static str, found: usize },

    #[error("couldn't parse '{value}' as {field}")]
    NotANumber { field: &'static str, value: String },

    #[error("the hierarchy needs at least one cache level")]
    NoLevels,
}

/// A trace line the instruction source can't make sense of
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TraceParseError {
    #[error("line {line}: undefined instruction type '{op}'")]
    UnknownOperation { line: usize, op: char },

    #[error("line {line}: invalid address '{text}'")]
    InvalidAddress { line: usize, text: String },

    #[error("line {line}: {length} bytes exceeds the maximum line width of {max}")]
    LineTooLong { line: usize, length: usize, max: usize },
}

/// Broken caller contract on a replacement policy
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("no candidate blocks to choose a victim from")]
    EmptyCandidates,

    #[error("policy 'none' asked to choose among {0} candidates")]
    MultipleCandidates(usize),
}

/// Hit rates are undefined without accesses of every kind
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatisticsError {
    #[error("no {0} were recorded, hit rates are undefined")]
    ZeroCount(&'static str),
}

/// Any error which aborts a simulation run
#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("invalid trace: {0}")]
    Trace(#[from] TraceParseError),

    #[error("replacement policy misuse: {0}")]
    Policy(#[from] PolicyError),

    #[error("statistics: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("couldn't parse the JSON configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
