//! LFU (Least Frequently Used) replacement policy.

use std::collections::HashMap;

use crate::common::FrameId;

use super::Replacer;

#[derive(Debug)]
struct LfuEntry {
    /// Pins since the page was loaded
    access_count: u64,
    /// Load order, breaks ties between equal counts
    load_seq: u64,
    is_evictable: bool,
}

/// Evicts the evictable frame with the fewest pins since it was loaded.
/// Ties go to the page that was loaded first.
#[derive(Debug, Default)]
pub struct LfuReplacer {
    next_seq: u64,
    entries: HashMap<FrameId, LfuEntry>,
    num_evictable: usize,
}

impl LfuReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Replacer for LfuReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if let Some(entry) = self.entries.get_mut(&frame_id) {
            entry.access_count += 1;
            return;
        }

        let load_seq = self.next_seq;
        self.next_seq += 1;
        self.entries.insert(
            frame_id,
            LfuEntry {
                access_count: 1,
                load_seq,
                is_evictable: false,
            },
        );
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
            .min_by_key(|(_, entry)| (entry.access_count, entry.load_seq))
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
