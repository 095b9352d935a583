//! Buffer pool statistics tracking.

use std::fmt;

/// Counters kept by the buffer pool.
#[derive(Debug, Default)]
pub struct BufferPoolStats {
    /// Pins served by a resident page
    pub cache_hits: u64,
    /// Pins that had to load the page into a frame
    pub cache_misses: u64,
    /// Frames reclaimed from a resident page
    pub evictions: u64,
    /// Pages read from disk
    pub pages_read: u64,
    /// Pages written to disk
    pub pages_written: u64,
}

impl BufferPoolStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a point-in-time copy for display/logging.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            cache_hits: self.cache_hits,
            cache_misses: self.cache_misses,
            evictions: self.evictions,
            pages_read: self.pages_read,
            pages_written: self.pages_written,
        }
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A point-in-time snapshot of buffer pool statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub evictions: u64,
    pub pages_read: u64,
    pub pages_written: u64,
}

impl StatsSnapshot {
    /// Calculate cache hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.cache_hits + self.cache_misses;
        if total == 0 {
            0.0
        } else {
            self.cache_hits as f64 / total as f64
        }
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Stats {{ hits: {}, misses: {}, evictions: {}, reads: {}, writes: {}, hit_rate: {:.2}% }}",
            self.cache_hits,
            self.cache_misses,
            self.evictions,
            self.pages_read,
            self.pages_written,
            self.hit_rate() * 100.0
        )
    }
}
