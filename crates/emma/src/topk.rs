use crate::description::Description;
use crate::error::{EmmError, Result};
use crate::quality::QualityScore;
use core::fmt;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// A scored subgroup.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultEntry {
    pub description: Description,
    pub score: QualityScore,
}

impl ResultEntry {
    pub fn new(description: Description, score: QualityScore) -> Self {
        Self { description, score }
    }
}

impl fmt::Display for ResultEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.score, self.description)
    }
}

// Heap slot ordered by (score, arrival); the max-heap top is the worst entry,
// and among equally bad entries the most recent one.
#[derive(Clone, Debug)]
struct Slot {
    seq: u64,
    entry: ResultEntry,
}

impl PartialEq for Slot {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}
impl Eq for Slot {}
impl PartialOrd for Slot {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for Slot {
    fn cmp(&self, other: &Self) -> Ordering {
        self.entry
            .score
            .cmp(&other.entry.score)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Bounded best-of-k collector.
///
/// At capacity a new entry evicts the worst one only if it is strictly
/// better; ties keep the entry seen first.
#[derive(Clone, Debug)]
pub struct TopK {
    capacity: usize,
    next_seq: u64,
    heap: BinaryHeap<Slot>,
}

impl TopK {
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(EmmError::InvalidConfig(
                "top_q must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            capacity,
            next_seq: 0,
            heap: BinaryHeap::with_capacity(capacity + 1),
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    pub fn worst_score(&self) -> Option<&QualityScore> {
        self.heap.peek().map(|slot| &slot.entry.score)
    }

    /// Offer an entry; returns whether it was kept.
    pub fn offer(&mut self, entry: ResultEntry) -> bool {
        if self.is_full() {
            let improves = self
                .worst_score()
                .is_some_and(|worst| entry.score < *worst);
            if !improves {
                return false;
            }
            self.heap.pop();
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(Slot { seq, entry });
        true
    }

    /// Held entries, best first; equal scores in arrival order.
    pub fn snapshot(&self) -> Vec<ResultEntry> {
        let mut slots: Vec<&Slot> = self.heap.iter().collect();
        slots.sort();
        slots.into_iter().map(|slot| slot.entry.clone()).collect()
    }

    pub fn into_sorted_vec(self) -> Vec<ResultEntry> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|slot| slot.entry)
            .collect()
    }
}
