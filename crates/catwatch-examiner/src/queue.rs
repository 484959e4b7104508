//! Deduplicating confirmation queue.
//!
//! Holds candidates between detection and the next drain. A candidate seen
//! several times before a drain is stored once. Each entry carries the number
//! of failed confirmation attempts so retries stay bounded.

use std::collections::{BTreeMap, HashMap};

use catwatch_core::ConfirmationCandidate;
use parking_lot::Mutex;
use tracing::warn;

/// A drained candidate with its failed attempt count.
pub type Pending = (ConfirmationCandidate, u32);

/// Queue of candidates awaiting confirmation.
#[derive(Debug)]
pub struct ConfirmQueue {
    pending: Mutex<HashMap<ConfirmationCandidate, u32>>,
    max_attempts: u32,
}

impl ConfirmQueue {
    /// Creates a queue dropping candidates after `max_attempts` failures.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Adds a fresh candidate. Returns false if it was already queued.
    pub fn enqueue(&self, candidate: ConfirmationCandidate) -> bool {
        let mut pending = self.pending.lock();
        if pending.contains_key(&candidate) {
            return false;
        }
        pending.insert(candidate, 0);
        true
    }

    /// Puts back a candidate whose confirmation failed.
    ///
    /// `attempts` is the count before this failure. Returns false when the
    /// candidate exhausted its attempts and was dropped.
    pub fn requeue(&self, candidate: ConfirmationCandidate, attempts: u32) -> bool {
        let attempts = attempts + 1;
        if attempts >= self.max_attempts {
            warn!(
                "Dropping candidate {} after {} failed confirmation attempts",
                candidate, attempts
            );
            return false;
        }

        let mut pending = self.pending.lock();
        let entry = pending.entry(candidate).or_insert(attempts);
        *entry = (*entry).max(attempts);
        true
    }

    /// Atomically takes everything queued so far.
    pub fn drain(&self) -> Vec<Pending> {
        let taken = std::mem::take(&mut *self.pending.lock());
        taken.into_iter().collect()
    }

    /// Number of queued candidates.
    pub fn len(&self) -> usize {
        self.pending.lock().len()
    }

    /// Returns true if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.pending.lock().is_empty()
    }

    /// Returns true if `candidate` is queued.
    pub fn contains(&self, candidate: &ConfirmationCandidate) -> bool {
        self.pending.lock().contains_key(candidate)
    }
}

/// Groups drained candidates by category, each group in key order.
pub fn group_by_category(batch: Vec<Pending>) -> BTreeMap<String, Vec<Pending>> {
    let mut groups: BTreeMap<String, Vec<Pending>> = BTreeMap::new();
    for item in batch {
        groups.entry(item.0.category.clone()).or_default().push(item);
    }
    for items in groups.values_mut() {
        items.sort_by(|a, b| a.0.cmp(&b.0));
    }
    groups
}
