use thiserror::Error;

use super::types::{KeyType, PageId};

/// Coarse classification of a [`SpruceError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A file, page or key that was asked for does not exist.
    NotFound,
    /// A fixed capacity was exceeded (pool frames, node order).
    Capacity,
    /// The call is not legal in the current state of the object.
    State,
    /// The key is already present.
    Duplicate,
    /// A scan has no further entries.
    Exhausted,
    /// Bytes on disk do not describe a valid index.
    Corrupted,
    /// Argument rejected before any work was done.
    Invalid,
    Io,
}

/// Storage and index error types
#[derive(Error, Debug)]
pub enum SpruceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Block file is not open")]
    FileNotOpen,

    #[error("Cannot read {0}: beyond the end of the file")]
    ReadNonExistingPage(PageId),

    #[error("Cannot write {page_id}: file has only {num_pages} pages")]
    WriteNonExistingPage { page_id: PageId, num_pages: u32 },

    #[error("Buffer pool is full, no evictable frames available")]
    BufferPoolFull,

    #[error("Buffer pool size must be at least one frame")]
    InvalidPoolSize,

    #[error("Buffer pool is not open")]
    PoolNotOpen,

    #[error("{0} pages are still pinned in the buffer pool")]
    PinnedPagesInBuffer(usize),

    #[error("Page {0} is not pinned")]
    PageNotPinned(PageId),

    #[error("Page {0} is not resident in the buffer pool")]
    PageNotResident(PageId),

    #[error("B-tree order {order} exceeds the page capacity of {max}")]
    OrderTooLarge { order: usize, max: usize },

    #[error("B-tree order must be at least 1")]
    InvalidOrder,

    #[error("Unsupported key type: {0}")]
    UnsupportedKeyType(KeyType),

    #[error("Key {0} not found")]
    KeyNotFound(i32),

    #[error("Key {0} already exists")]
    KeyAlreadyExists(i32),

    #[error("No more entries in the scan")]
    NoMoreEntries,

    #[error("Invalid index file: {0}")]
    InvalidIndexFile(String),

    #[error("Index corrupted: {0}")]
    IndexCorrupted(String),
}

impl SpruceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SpruceError::Io(_) => ErrorKind::Io,
            SpruceError::FileNotFound(_)
            | SpruceError::ReadNonExistingPage(_)
            | SpruceError::WriteNonExistingPage { .. }
            | SpruceError::KeyNotFound(_) => ErrorKind::NotFound,
            SpruceError::BufferPoolFull | SpruceError::OrderTooLarge { .. } => {
                ErrorKind::Capacity
            }
            SpruceError::FileNotOpen
            | SpruceError::PoolNotOpen
            | SpruceError::PinnedPagesInBuffer(_)
            | SpruceError::PageNotPinned(_)
            | SpruceError::PageNotResident(_) => ErrorKind::State,
            SpruceError::KeyAlreadyExists(_) => ErrorKind::Duplicate,
            SpruceError::NoMoreEntries => ErrorKind::Exhausted,
            SpruceError::InvalidIndexFile(_) | SpruceError::IndexCorrupted(_) => {
                ErrorKind::Corrupted
            }
            SpruceError::InvalidPoolSize
            | SpruceError::InvalidOrder
            | SpruceError::UnsupportedKeyType(_) => ErrorKind::Invalid,
        }
    }
}

pub type Result<T> = std::result::Result<T, SpruceError>;
