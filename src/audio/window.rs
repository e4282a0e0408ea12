use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};

use super::transport::SpeakerId;

/// Per-speaker raw frame bytes captured during exactly one chunk interval.
/// Speakers silent during the interval are simply absent from the map; a
/// chunk nobody spoke in is an empty map, not a missing entry.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    /// Monotonic chunk number since capture started
    pub index: u64,
    /// Wall-clock start of the chunk interval
    pub start: DateTime<Utc>,
    pub frames: HashMap<SpeakerId, Vec<u8>>,
}

/// Bounded FIFO of the most recent chunks, sized to the maximum clip
/// duration. Pushing past capacity evicts the oldest chunk first.
#[derive(Debug)]
pub struct ClipWindow {
    chunks: VecDeque<AudioChunk>,
    capacity: usize,
}

impl ClipWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            chunks: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn push(&mut self, chunk: AudioChunk) {
        while !self.chunks.is_empty() && self.chunks.len() >= self.capacity {
            self.chunks.pop_front();
        }
        self.chunks.push_back(chunk);
    }

    /// Copy of the window in chronological order, for assembly.
    pub fn snapshot(&self) -> Vec<AudioChunk> {
        self.chunks.iter().cloned().collect()
    }
}
