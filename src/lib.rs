//! Spruce - a buffer-managed, disk-backed B-tree index engine in Rust
//!
//! Indexes live in a single file of fixed-size pages. All page traffic goes
//! through a buffer pool that caches pages in a fixed number of frames and
//! writes modified pages back when their frames are reused.
//!
//! # Architecture
//!
//! - **Storage Layer** (`storage`): block-level file I/O
//!   - `DiskManager`: creates, opens and destroys page files; reads, writes and appends blocks
//!
//! - **Buffer Pool** (`buffer`): memory management for pages
//!   - `BufferPoolManager`: pins pages into frames, tracks dirty pages and I/O counts
//!   - `Replacer`: victim selection, with FIFO, LRU, CLOCK, LFU and LRU-K policies
//!   - `Frame`: per-frame metadata and page bytes
//!
//! - **Index** (`index`): B+ tree over 32-bit integer keys
//!   - `BTreeIndex`: create/open/close/delete, find, insert with node splits, delete
//!   - `TreeScan`: ordered scan along the leaf chain
//!   - `NodePage`/`IndexHeader`: on-page formats
//!
//! # Example
//!
//! ```rust,no_run
//! use spruce::common::{KeyType, PageId, RecordId, SlotId};
//! use spruce::index::BTreeIndex;
//!
//! BTreeIndex::create("test.idx", KeyType::Int, 4).unwrap();
//! let mut index = BTreeIndex::open("test.idx").unwrap();
//!
//! index
//!     .insert_key(42, RecordId::new(PageId::new(1), SlotId::new(0)))
//!     .unwrap();
//! assert_eq!(index.find_key(42).unwrap().page_id, PageId::new(1));
//!
//! index.close().unwrap();
//! BTreeIndex::delete("test.idx").unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used types at the crate root
pub use common::{ErrorKind, KeyType, PageId, RecordId, Result, SlotId, SpruceError};
