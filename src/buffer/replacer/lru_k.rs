//! LRU-K replacement policy.

use std::collections::{HashMap, VecDeque};

use crate::common::{FrameId, Timestamp};

use super::Replacer;

/// Access history of one tracked frame
#[derive(Debug, Default)]
struct AccessHistory {
    /// Last k access timestamps (most recent at back)
    history: VecDeque<Timestamp>,
    is_evictable: bool,
}

impl AccessHistory {
    fn push(&mut self, timestamp: Timestamp, k: usize) {
        self.history.push_back(timestamp);
        while self.history.len() > k {
            self.history.pop_front();
        }
    }

    /// Backward k-distance, or None (+inf) with fewer than k accesses.
    fn k_distance(&self, now: Timestamp, k: usize) -> Option<Timestamp> {
        if self.history.len() < k {
            None
        } else {
            Some(now - self.history[self.history.len() - k])
        }
    }

    fn earliest(&self) -> Option<Timestamp> {
        self.history.front().copied()
    }
}

/// Evicts the frame whose backward k-distance is the largest.
///
/// Backward k-distance is the time elapsed since the k-th most recent access.
/// A frame with fewer than k recorded accesses has +inf distance; among
/// several such frames the one with the earliest recorded access goes first.
#[derive(Debug)]
pub struct LruKReplacer {
    k: usize,
    /// Frames with an id at or above this are ignored
    max_frames: usize,
    current_timestamp: Timestamp,
    frames: HashMap<FrameId, AccessHistory>,
    num_evictable: usize,
}

impl LruKReplacer {
    pub fn new(k: usize, max_frames: usize) -> Self {
        Self {
            k,
            max_frames,
            current_timestamp: 0,
            frames: HashMap::new(),
            num_evictable: 0,
        }
    }

    /// True when `candidate` should be evicted before `current`.
    fn precedes(
        candidate: (Option<Timestamp>, Option<Timestamp>),
        current: (Option<Timestamp>, Option<Timestamp>),
    ) -> bool {
        match (candidate.0, current.0) {
            (None, Some(_)) => true,
            (Some(_), None) => false,
            (None, None) => match (candidate.1, current.1) {
                (Some(c), Some(v)) => c < v,
                (Some(_), None) => true,
                _ => false,
            },
            (Some(c), Some(v)) => c > v,
        }
    }
}

impl Replacer for LruKReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if frame_id.as_usize() >= self.max_frames {
            return;
        }

        let timestamp = self.current_timestamp;
        self.current_timestamp += 1;
        self.frames
            .entry(frame_id)
            .or_default()
            .push(timestamp, self.k);
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if let Some(info) = self.frames.get_mut(&frame_id) {
            if info.is_evictable != evictable {
                info.is_evictable = evictable;
                if evictable {
                    self.num_evictable += 1;
                } else {
                    self.num_evictable -= 1;
                }
            }
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        if self.num_evictable == 0 {
            return None;
        }

        let now = self.current_timestamp;
        let mut victim: Option<(FrameId, (Option<Timestamp>, Option<Timestamp>))> = None;

        for (&frame_id, info) in self.frames.iter().filter(|(_, info)| info.is_evictable) {
            let rank = (info.k_distance(now, self.k), info.earliest());
            let replace = match victim {
                None => true,
                Some((_, current)) => Self::precedes(rank, current),
            };
            if replace {
                victim = Some((frame_id, rank));
            }
        }

        let (frame_id, _) = victim?;
        self.frames.remove(&frame_id);
        self.num_evictable -= 1;
        Some(frame_id)
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(info) = self.frames.remove(&frame_id) {
            if info.is_evictable {
                self.num_evictable -= 1;
            }
        }
    }

    fn size(&self) -> usize {
        self.num_evictable
    }
}
