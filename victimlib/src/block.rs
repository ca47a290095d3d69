/// State of a single block slot
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct BlockRecord {
    pub valid: bool,
    pub dirty: bool,
    pub tag: u64,
}

/// Fixed size storage for the blocks of one cache. Holds no policy, only state and tag comparison
///
/// Indices are absolute block indices; callers are expected to stay within `0..len()`
#[derive(Debug, Clone)]
pub struct BlockTable {
    blocks: Vec<BlockRecord>,
}

impl BlockTable {
    /// Creates a table of `num_blocks` invalid blocks
    pub fn new(num_blocks: usize) -> Self {
        Self {
            blocks: vec![BlockRecord::default(); num_blocks],
        }
    }

    pub fn get(&self, index: usize) -> BlockRecord {
        self.blocks[index]
    }

    /// Stores a new tag in a slot and marks it valid. The dirty bit is left alone
    pub fn set_tag_and_valid(&mut self, index: usize, tag: u64) {
        let block = &mut self.blocks[index];
        block.tag = tag;
        block.valid = true;
    }

    pub fn clear_dirty(&mut self, index: usize) {
        self.blocks[index].dirty = false;
    }

    pub fn mark_dirty(&mut self, index: usize) {
        self.blocks[index].dirty = true;
    }

    pub fn invalidate(&mut self, index: usize) {
        self.blocks[index] = BlockRecord::default();
    }

    /// The hit predicate: the slot holds valid data with this tag
    pub fn identity_matches(&self, index: usize, tag: u64) -> bool {
        let block = &self.blocks[index];
        block.valid && block.tag == tag
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Number of slots currently holding data. Useful when analysing or debugging a run
    pub fn valid_count(&self) -> usize {
        self.blocks.iter().filter(|b| b.valid).count()
    }
}
