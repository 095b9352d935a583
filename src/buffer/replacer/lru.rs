//! LRU (Least Recently Used) replacement policy.

use std::collections::HashMap;

use crate::common::{FrameId, Timestamp};

use super::Replacer;

#[derive(Debug)]
struct LruEntry {
    /// Logical time of the latest pin
    last_access: Timestamp,
    is_evictable: bool,
}

/// Evicts the evictable frame whose page was pinned least recently.
#[derive(Debug, Default)]
pub struct LruReplacer {
    /// Logical clock, advanced on every access
    current_timestamp: Timestamp,
    entries: HashMap<FrameId, LruEntry>,
    num_evictable: usize,
}

impl LruReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Replacer for LruReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;

        self.entries
            .entry(frame_id)
            .and_modify(|entry| entry.last_access = timestamp)
            .or_insert(LruEntry {
                last_access: timestamp,
                is_evictable: false,
            });
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if let Some(entry) = self.entries.get_mut(&frame_id) {
            if entry.is_evictable != evictable {
                entry.is_evictable = evictable;
                if evictable {
                    self.num_evictable += 1;
                } else {
                    self.num_evictable -= 1;
                }
            }
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let victim = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.is_evictable)
            .min_by_key(|(_, entry)| entry.last_access)
            .map(|(&frame_id, _)| frame_id)?;

        self.entries.remove(&victim);
        self.num_evictable -= 1;
        Some(victim)
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(entry) = self.entries.remove(&frame_id) {
            if entry.is_evictable {
                self.num_evictable -= 1;
            }
        }
    }

    fn size(&self) -> usize {
        self.num_evictable
    }
}
