//! Page replacement policies (replacers).
//!
//! Every policy tracks the frames the buffer pool has told it about and picks
//! a victim only among frames marked evictable (pin count 0). A frame returned
//! by [`Replacer::evict`] is forgotten, so the next `record_access` for it
//! starts a fresh residency.

mod clock;
mod fifo;
mod lfu;
mod lru;
mod lru_k;

use std::fmt;

pub use clock::ClockReplacer;
pub use fifo::FifoReplacer;
pub use lfu::LfuReplacer;
pub use lru::LruReplacer;
pub use lru_k::LruKReplacer;

use crate::common::{FrameId, DEFAULT_LRUK_K};

/// Victim selection interface used by the buffer pool.
pub trait Replacer: Send {
    /// Records that the page in `frame_id` was pinned.
    fn record_access(&mut self, frame_id: FrameId);

    /// Marks a tracked frame as (not) eligible for eviction.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);

    /// Picks and forgets a victim, or `None` when every tracked frame is pinned.
    fn evict(&mut self) -> Option<FrameId>;

    /// Forgets a frame entirely.
    fn remove(&mut self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

/// Replacement strategy selected when a buffer pool is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplacementStrategy {
    Fifo,
    Lru,
    Clock,
    Lfu,
    /// LRU-K with the given K; 0 selects `DEFAULT_LRUK_K`
    LruK(usize),
}

impl ReplacementStrategy {
    /// Builds a replacer able to track `pool_size` frames.
    pub fn build(&self, pool_size: usize) -> Box<dyn Replacer> {
        match *self {
            ReplacementStrategy::Fifo => Box::new(FifoReplacer::new()),
            ReplacementStrategy::Lru => Box::new(LruReplacer::new()),
            ReplacementStrategy::Clock => Box::new(ClockReplacer::new(pool_size)),
            ReplacementStrategy::Lfu => Box::new(LfuReplacer::new()),
            ReplacementStrategy::LruK(k) => {
                let k = if k == 0 { DEFAULT_LRUK_K } else { k };
                Box::new(LruKReplacer::new(k, pool_size))
            }
        }
    }
}

impl fmt::Display for ReplacementStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReplacementStrategy::Fifo => f.write_str("FIFO"),
            ReplacementStrategy::Lru => f.write_str("LRU"),
            ReplacementStrategy::Clock => f.write_str("CLOCK"),
            ReplacementStrategy::Lfu => f.write_str("LFU"),
            ReplacementStrategy::LruK(k) => write!(f, "LRU-{}", k),
        }
    }
}
