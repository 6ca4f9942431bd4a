//! Bounded archive of terminal transfers.

use std::collections::VecDeque;

use super::types::{TransferId, TransferSnapshot};

/// FIFO of terminal transfer records; the oldest entry drops when full.
#[derive(Debug)]
pub struct TransferArchive {
    capacity: usize,
    entries: VecDeque<TransferSnapshot>,
    evicted: u64,
}

impl TransferArchive {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: VecDeque::with_capacity(capacity.min(1024)),
            evicted: 0,
        }
    }

    pub fn push(&mut self, snapshot: TransferSnapshot) {
        if self.capacity == 0 {
            self.evicted += 1;
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
            self.evicted += 1;
        }
        self.entries.push_back(snapshot);
    }

    pub fn get(&self, id: TransferId) -> Option<&TransferSnapshot> {
        self.entries.iter().rev().find(|s| s.id == id)
    }

    /// Newest first, at most `limit`
    pub fn recent(&self, limit: usize) -> Vec<TransferSnapshot> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Records dropped to honour the capacity
    pub fn evicted(&self) -> u64 {
        self.evicted
    }
}
