//! Bounded top-K retention
//!
//! Keeps the K largest samples of an unbounded stream in O(K) memory using
//! a fixed-capacity, array-backed binary min-heap keyed by size. The root
//! is always the smallest retained sample, so a full heap rejects anything
//! not strictly larger than it in O(1) and replaces it in O(log K).

use super::sample::{Sample, TopKSet};

/// Retains the K largest samples offered to it.
#[derive(Debug, Clone)]
pub struct TopKSelector {
    k: usize,
    heap: Vec<Sample>,
    offered: u64,
}

impl TopKSelector {
    /// Create a selector retaining at most `k` samples.
    pub fn new(k: usize) -> Self {
        Self {
            k,
            // the arena never grows past k
            heap: Vec::with_capacity(k.min(1 << 16)),
            offered: 0,
        }
    }

    /// Capacity of the selector.
    pub fn capacity(&self) -> usize {
        self.k
    }

    /// Samples currently retained.
    pub fn len(&self) -> usize {
        self.heap.len()
    }

    /// True when nothing is retained.
    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Total samples offered so far, retained or not.
    pub fn offered(&self) -> u64 {
        self.offered
    }

    /// Smallest retained size, the bar a new sample must clear once full.
    pub fn threshold(&self) -> Option<u64> {
        self.heap.first().map(|s| s.size_bytes)
    }

    /// Offer a sample. Returns true if it was retained.
    pub fn offer(&mut self, sample: Sample) -> bool {
        self.offered += 1;
        if self.k == 0 {
            return false;
        }

        if self.heap.len() < self.k {
            self.heap.push(sample);
            self.sift_up(self.heap.len() - 1);
            return true;
        }

        if sample.size_bytes > self.heap[0].size_bytes {
            self.heap[0] = sample;
            self.sift_down(0);
            true
        } else {
            false
        }
    }

    /// Retained samples sorted descending by size.
    pub fn result(&self) -> TopKSet {
        let mut sorted = self.heap.clone();
        sorted.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        TopKSet::from_sorted(sorted)
    }

    /// Consume the selector, returning the sorted result without cloning.
    pub fn into_result(mut self) -> TopKSet {
        self.heap.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
        TopKSet::from_sorted(self.heap)
    }

    fn sift_up(&mut self, mut pos: usize) {
        while pos > 0 {
            let parent = (pos - 1) / 2;
            if self.heap[pos].size_bytes >= self.heap[parent].size_bytes {
                break;
            }
            self.heap.swap(pos, parent);
            pos = parent;
        }
    }

    fn sift_down(&mut self, mut pos: usize) {
        let len = self.heap.len();
        loop {
            let left = 2 * pos + 1;
            let right = left + 1;
            let mut smallest = pos;

            if left < len && self.heap[left].size_bytes < self.heap[smallest].size_bytes {
                smallest = left;
            }
            if right < len && self.heap[right].size_bytes < self.heap[smallest].size_bytes {
                smallest = right;
            }
            if smallest == pos {
                break;
            }
            self.heap.swap(pos, smallest);
            pos = smallest;
        }
    }
}
