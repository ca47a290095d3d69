use std::fmt;
use std::ops::Range;
use crate::error::ConfigError;

/// Width of the simulated address space, in bits
pub const ADDRESS_WIDTH: u32 = 48;

/// How many blocks an address may live in
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Associativity {
    DirectMapped,
    SetAssociative { ways: u64 },
    FullyAssociative,
}

impl fmt::Display for Associativity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Associativity::DirectMapped => write!(f, "direct mapped"),
            Associativity::SetAssociative { ways } => write!(f, "{ways}-way set associative"),
            Associativity::FullyAssociative => write!(f, "fully associative"),
        }
    }
}

/// The shape of a cache, and how addresses are split into tag, index and offset
///
/// Only constructed through [`CacheGeometry::new`] or [`CacheGeometry::with_address_width`], so
/// every instance satisfies `offset_bits + index_bits + tag_bits == address_width`, all sizes are
/// powers of two, and `ways` evenly divides `num_blocks`
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheGeometry {
    capacity: u64,
    block_size: u64,
    associativity: Associativity,
    num_blocks: u64,
    num_sets: u64,
    ways: u64,
    offset_bits: u32,
    index_bits: u32,
    tag_bits: u32,
    address_width: u32,
}

impl CacheGeometry {
    /// Derives a geometry for the default [`ADDRESS_WIDTH`]
    ///
    /// # Arguments
    ///
    /// * `capacity`: Total size of the cache in bytes
    /// * `block_size`: Size of a single block in bytes
    /// * `associativity`: Placement rule for blocks
    ///
    /// returns: Result<CacheGeometry, ConfigError>
    ///
    /// # Examples
    ///
    /// ```
    /// use victimlib::geometry::{Associativity, CacheGeometry};
    /// let geometry = CacheGeometry::new(64, 16, Associativity::DirectMapped).unwrap();
    /// assert_eq!(geometry.num_blocks(), 4);
    /// assert_eq!((geometry.offset_bits(), geometry.index_bits(), geometry.tag_bits()), (4, 2, 42));
    /// ```
    pub fn new(capacity: u64, block_size: u64, associativity: Associativity) -> Result<Self, ConfigError> {
        Self::with_address_width(capacity, block_size, associativity, ADDRESS_WIDTH)
    }

    /// Same as [`CacheGeometry::new`], for an explicit address width of at most 64 bits
    pub fn with_address_width(
        capacity: u64,
        block_size: u64,
        associativity: Associativity,
        address_width: u32,
    ) -> Result<Self, ConfigError> {
        require_power_of_two("block size", block_size)?;
        require_power_of_two("capacity", capacity)?;
        if capacity < block_size {
            return Err(ConfigError::CapacityBelowBlockSize { capacity, block_size });
        }
        let address_width = address_width.min(u64::BITS);
        let num_blocks = capacity / block_size;
        let offset_bits = block_size.trailing_zeros();
        let (num_sets, ways) = match associativity {
            Associativity::DirectMapped => (num_blocks, 1),
            Associativity::SetAssociative { ways } => {
                require_power_of_two("ways", ways)?;
                if ways > num_blocks {
                    return Err(ConfigError::WaysExceedBlocks { ways, num_blocks });
                }
                (num_blocks / ways, ways)
            }
            Associativity::FullyAssociative => (1, num_blocks),
        };
        // log2 of a power of two
        let index_bits = num_sets.trailing_zeros();
        if offset_bits + index_bits > address_width {
            return Err(ConfigError::BitWidthOverflow { offset_bits, index_bits, address_width });
        }
        Ok(Self {
            capacity,
            block_size,
            associativity,
            num_blocks,
            num_sets,
            ways,
            offset_bits,
            index_bits,
            tag_bits: address_width - offset_bits - index_bits,
            address_width,
        })
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn block_size(&self) -> u64 {
        self.block_size
    }

    pub fn associativity(&self) -> Associativity {
        self.associativity
    }

    pub fn num_blocks(&self) -> u64 {
        self.num_blocks
    }

    pub fn num_sets(&self) -> u64 {
        self.num_sets
    }

    /// Blocks per set. 1 for direct mapped, every block for fully associative
    pub fn ways(&self) -> u64 {
        self.ways
    }

    pub fn offset_bits(&self) -> u32 {
        self.offset_bits
    }

    pub fn index_bits(&self) -> u32 {
        self.index_bits
    }

    pub fn tag_bits(&self) -> u32 {
        self.tag_bits
    }

    pub fn address_width(&self) -> u32 {
        self.address_width
    }

    pub fn is_direct_mapped(&self) -> bool {
        self.associativity == Associativity::DirectMapped
    }

    /// Splits an address into its set index and tag. Bits above the address width are ignored
    ///
    /// For a direct mapped cache the set index is the absolute index of the only eligible block
    pub fn split(&self, address: u64) -> (u64, u64) {
        let address = address & low_mask(self.address_width);
        let set_index = shift_right(address, self.offset_bits) & low_mask(self.index_bits);
        let tag = shift_right(address, self.offset_bits + self.index_bits) & low_mask(self.tag_bits);
        (set_index, tag)
    }

    /// Reverses [`CacheGeometry::split`], giving the block aligned address
    pub fn rebuild(&self, set_index: u64, tag: u64) -> u64 {
        shift_left(tag, self.offset_bits + self.index_bits) | shift_left(set_index, self.offset_bits)
    }

    /// Block indices an address with the given set index may occupy
    pub fn candidates(&self, set_index: u64) -> Range<usize> {
        let lower = (set_index * self.ways) as usize;
        lower..lower + self.ways as usize
    }

    /// The set a block index belongs to
    pub fn set_of(&self, block_index: usize) -> u64 {
        block_index as u64 / self.ways
    }
}

fn require_power_of_two(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value.is_power_of_two() {
        Ok(())
    } else {
        Err(ConfigError::NotPowerOfTwo { field, value })
    }
}

fn low_mask(bits: u32) -> u64 {
    if bits >= u64::BITS {
        u64::MAX
    } else {
        (1 << bits) - 1
    }
}

fn shift_right(value: u64, bits: u32) -> u64 {
    value.checked_shr(bits).unwrap_or(0)
}

fn shift_left(value: u64, bits: u32) -> u64 {
    value.checked_shl(bits).unwrap_or(0)
}
