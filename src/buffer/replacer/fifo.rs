//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use crate::common::FrameId;

use super::Replacer;

/// Evicts pages in the order they were loaded into the pool.
///
/// Re-pinning a resident page does not move it; a pinned page keeps its
/// place in the queue and is passed over until it becomes evictable.
#[derive(Debug, Default)]
pub struct FifoReplacer {
    /// Frames in load order (front = oldest)
    queue: VecDeque<FrameId>,
    /// Frames that are currently evictable (pin_count == 0)
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self::default()
    }

    fn position(&self, frame_id: FrameId) -> Option<usize> {
        self.queue.iter().position(|&f| f == frame_id)
    }
}

impl Replacer for FifoReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if self.position(frame_id).is_none() {
            self.queue.push_back(frame_id);
        }
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            if self.position(frame_id).is_some() {
                self.evictable.insert(frame_id);
            }
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let pos = self
            .queue
            .iter()
            .position(|frame_id| self.evictable.contains(frame_id))?;
        let frame_id = self.queue.remove(pos)?;
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(pos) = self.position(frame_id) {
            self.queue.remove(pos);
        }
        self.evictable.remove(&frame_id);
    }

    fn size(&self) -> usize {
        self.evictable.len()
    }
}
