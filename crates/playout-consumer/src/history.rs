//! Recent frames retained for consumers that lag behind.

use playout_core::Frame;
use std::collections::VecDeque;

/// Frames in arrival order, oldest first. Grows at the tail, shrinks at the head.
#[derive(Debug, Default)]
pub struct FrameHistory {
    frames: VecDeque<Frame>,
}

impl FrameHistory {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            frames: VecDeque::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, frame: Frame) {
        self.frames.push_back(frame);
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Frame at `index`, counted from the oldest.
    pub fn get(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// Frame `age` positions before the newest (0 = newest).
    pub fn back(&self, age: usize) -> Option<&Frame> {
        self.frames
            .len()
            .checked_sub(age + 1)
            .and_then(|index| self.frames.get(index))
    }

    pub fn newest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    /// Drop the oldest frames until at most `max_len` remain.
    /// Returns how many were dropped.
    pub fn evict_to(&mut self, max_len: usize) -> usize {
        let excess = self.frames.len().saturating_sub(max_len);
        self.frames.drain(..excess);
        excess
    }

    /// Sequence numbers, oldest first.
    pub fn numbers(&self) -> Vec<u64> {
        self.frames.iter().map(Frame::number).collect()
    }
}
