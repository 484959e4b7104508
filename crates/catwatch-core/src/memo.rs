//! Short-lived detection memo.
//!
//! Suppresses bursts of detections for the same domain. Entries expire a fixed
//! time after insertion (reads do not extend them) and the oldest entry is
//! evicted once capacity is reached.

use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Default number of remembered domains.
pub const DEFAULT_MEMO_CAPACITY: usize = 1000;

/// Default time a detection is remembered.
pub const DEFAULT_MEMO_TTL: Duration = Duration::from_secs(10);

/// Bounded, time-expiring set of recently seen keys.
#[derive(Debug)]
pub struct DetectionMemo {
    capacity: usize,
    ttl: Duration,
    entries: HashMap<String, Instant>,
    order: VecDeque<String>,
}

impl Default for DetectionMemo {
    fn default() -> Self {
        Self::new(DEFAULT_MEMO_CAPACITY, DEFAULT_MEMO_TTL)
    }
}

impl DetectionMemo {
    /// Creates a memo with the given capacity and time-to-live.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            ttl,
            entries: HashMap::with_capacity(capacity),
            order: VecDeque::with_capacity(capacity),
        }
    }

    /// Records `key` and returns true if it was already remembered.
    pub fn seen(&mut self, key: &str) -> bool {
        self.seen_at(key, Instant::now())
    }

    /// Same as [`seen`](Self::seen) with an explicit clock reading.
    pub fn seen_at(&mut self, key: &str, now: Instant) -> bool {
        if let Some(inserted) = self.entries.get(key) {
            if now.saturating_duration_since(*inserted) < self.ttl {
                return true;
            }
            self.remove(key);
        }

        if self.entries.len() >= self.capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.entries.remove(&oldest);
            }
        }
        self.entries.insert(key.to_string(), now);
        self.order.push_back(key.to_string());
        false
    }

    /// Number of remembered keys, expired ones included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forgets everything.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.order.clear();
    }

    fn remove(&mut self, key: &str) {
        self.entries.remove(key);
        if let Some(pos) = self.order.iter().position(|k| k == key) {
            self.order.remove(pos);
        }
    }
}
