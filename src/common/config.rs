use crate::buffer::ReplacementStrategy;

/// Size of a page in bytes (4 KB)
pub const PAGE_SIZE: usize = 4096;

/// K used by `ReplacementStrategy::LruK(0)`
pub const DEFAULT_LRUK_K: usize = 2;

/// Default buffer pool size (number of frames) for an opened index
pub const DEFAULT_BUFFER_POOL_SIZE: usize = 10;

/// Size of an encoded 32-bit integer on a page
pub const INT_SIZE: usize = 4;

/// Bytes taken by `[is_leaf][fill]` at the start of every node page
pub const NODE_HEADER_SIZE: usize = 2 * INT_SIZE;

/// Largest order whose full node still fits in one page.
/// A full leaf holds `n` record ids (two ints each) and `n` keys.
pub const MAX_BTREE_ORDER: usize = (PAGE_SIZE - NODE_HEADER_SIZE) / (3 * INT_SIZE);

/// Page holding the index header
pub const HEADER_PAGE_NUM: u32 = 0;

/// Marks page 0 of an index file ("SPRU")
pub const INDEX_MAGIC: u32 = 0x5350_5255;

/// Version of the on-disk index layout
pub const INDEX_FORMAT_VERSION: u32 = 1;

/// Options used when opening an existing index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexOptions {
    /// Number of frames in the index's private buffer pool
    pub pool_size: usize,
    /// Replacement strategy of that pool
    pub strategy: ReplacementStrategy,
}

impl Default for IndexOptions {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_BUFFER_POOL_SIZE,
            strategy: ReplacementStrategy::Lru,
        }
    }
}

impl IndexOptions {
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub fn with_strategy(mut self, strategy: ReplacementStrategy) -> Self {
        self.strategy = strategy;
        self
    }
}
