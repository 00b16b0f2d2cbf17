// Bounded per-channel reading history
use super::telemetry::Reading;
use std::collections::VecDeque;

/// Number of readings retained per channel.
pub const HISTORY_CAPACITY: usize = 200;

/// Insertion-ordered history of one channel. Once full, every push evicts
/// exactly the oldest reading.
#[derive(Debug, Clone)]
pub struct ChannelBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
}

impl ChannelBuffer {
    pub fn new() -> Self {
        Self::with_capacity(HISTORY_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends a reading and returns the evicted one, if any.
    pub fn push(&mut self, reading: Reading) -> Option<Reading> {
        let evicted = if self.readings.len() == self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(reading);
        evicted
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.back()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    #[cfg(test)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Oldest-first copy of the history.
    pub fn to_vec(&self) -> Vec<Reading> {
        self.readings.iter().copied().collect()
    }
}

impl Default for ChannelBuffer {
    fn default() -> Self {
        Self::new()
    }
}
