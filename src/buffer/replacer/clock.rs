//! CLOCK (second chance) replacement policy.

use crate::common::FrameId;

use super::Replacer;

#[derive(Debug, Clone, Copy)]
struct ClockEntry {
    /// Set on every pin, cleared when the hand passes over it
    referenced: bool,
    is_evictable: bool,
}

/// Approximates LRU with one reference bit per frame and a circular hand.
///
/// Slots are indexed by frame id. The hand passes over pinned frames without
/// touching them; an evictable frame with its bit set loses the bit and
/// survives one more sweep.
#[derive(Debug)]
pub struct ClockReplacer {
    slots: Vec<Option<ClockEntry>>,
    clock_hand: usize,
    num_evictable: usize,
}

impl ClockReplacer {
    pub fn new(capacity: usize) -> Self {
        Self {
            slots: vec![None; capacity],
            clock_hand: 0,
            num_evictable: 0,
        }
    }

    fn advance(&mut self) {
        self.clock_hand = (self.clock_hand + 1) % self.slots.len();
    }
}

impl Replacer for ClockReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        let Some(slot) = self.slots.get_mut(frame_id.as_usize()) else {
            return;
        };
        match slot {
            Some(entry) => entry.referenced = true,
            None => {
                *slot = Some(ClockEntry {
                    referenced: true,
                    is_evictable: false,
                })
            }
        }
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if let Some(Some(entry)) = self.slots.get_mut(frame_id.as_usize()) {
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
        if self.num_evictable == 0 {
            return None;
        }

        // After one full sweep every evictable bit is clear, so two sweeps suffice.
        for _ in 0..2 * self.slots.len() {
            let index = self.clock_hand;
            if let Some(entry) = self.slots[index].as_mut() {
                if entry.is_evictable {
                    if entry.referenced {
                        entry.referenced = false;
                    } else {
                        self.slots[index] = None;
                        self.num_evictable -= 1;
                        self.advance();
                        return Some(FrameId::new(index as u32));
                    }
                }
            }
            self.advance();
        }

        None
    }

    fn remove(&mut self, frame_id: FrameId) {
        if let Some(slot) = self.slots.get_mut(frame_id.as_usize()) {
            if let Some(entry) = slot.take() {
                if entry.is_evictable {
                    self.num_evictable -= 1;
                }
            }
        }
    }

    fn size(&self) -> usize {
        self.num_evictable
    }
}
