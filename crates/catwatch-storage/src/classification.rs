//! Per-category hit and passthrough sets.
//!
//! Every write keeps a `(category, domain)` pair in at most one of the two
//! sets: adding to one removes the member from the other. The store offers no
//! transaction across the pair; the two single-key writes are ordered so that
//! a crash in between leaves the member in neither set, which the next
//! detection re-evaluates.

use chrono::Utc;
use tracing::debug;

use catwatch_core::category::{hit_set_key, passthrough_set_key};

use crate::database::Database;
use crate::error::Result;
use crate::models::SetEntry;

/// Current time as a set score (milliseconds since the Unix epoch).
pub fn now_score() -> i64 {
    Utc::now().timestamp_millis()
}

/// Store keys of one category's set pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetKeys {
    /// Hit set key.
    pub hit: String,
    /// Passthrough set key.
    pub passthrough: String,
}

impl SetKeys {
    /// Creates a key pair.
    pub fn new(hit: impl Into<String>, passthrough: impl Into<String>) -> Self {
        Self {
            hit: hit.into(),
            passthrough: passthrough.into(),
        }
    }

    /// Default key pair for a category.
    pub fn for_category(category: &str) -> Self {
        Self::new(hit_set_key(category), passthrough_set_key(category))
    }
}

/// Durable classification state.
#[derive(Clone)]
pub struct ClassificationStore {
    db: Database,
}

impl ClassificationStore {
    /// Creates a store on top of the given database.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Underlying database.
    pub fn database(&self) -> &Database {
        &self.db
    }

    /// Returns true if `domain` is in the hit set.
    pub fn in_hit_set(&self, keys: &SetKeys, domain: &str) -> Result<bool> {
        Ok(self.db.zscore(&keys.hit, domain)?.is_some())
    }

    /// Returns true if `domain` is in the passthrough set.
    pub fn in_passthrough_set(&self, keys: &SetKeys, domain: &str) -> Result<bool> {
        Ok(self.db.zscore(&keys.passthrough, domain)?.is_some())
    }

    /// Adds `domain` to the hit set (or refreshes its score) and removes it
    /// from the passthrough set. Returns true if membership changed.
    pub fn add_hit(&self, keys: &SetKeys, domain: &str, score: i64) -> Result<bool> {
        let removed = self.db.zrem(&keys.passthrough, domain)?;
        let added = self.db.zadd(&keys.hit, score, domain)?;
        if added || removed {
            debug!(domain, key = %keys.hit, "hit set membership changed");
        }
        Ok(added || removed)
    }

    /// Adds `domain` to the passthrough set (or refreshes its score) and
    /// removes it from the hit set. Returns true if membership changed.
    pub fn add_passthrough(&self, keys: &SetKeys, domain: &str, score: i64) -> Result<bool> {
        let removed = self.db.zrem(&keys.hit, domain)?;
        let added = self.db.zadd(&keys.passthrough, score, domain)?;
        if added || removed {
            debug!(domain, key = %keys.passthrough, "passthrough set membership changed");
        }
        Ok(added || removed)
    }

    /// Removes `domain` from the hit set.
    pub fn remove_hit(&self, keys: &SetKeys, domain: &str) -> Result<bool> {
        self.db.zrem(&keys.hit, domain)
    }

    /// Removes `domain` from the passthrough set.
    pub fn remove_passthrough(&self, keys: &SetKeys, domain: &str) -> Result<bool> {
        self.db.zrem(&keys.passthrough, domain)
    }

    /// Hit set members, oldest first.
    pub fn hit_members(&self, keys: &SetKeys) -> Result<Vec<String>> {
        self.db.zrange_all(&keys.hit)
    }

    /// Passthrough set members, oldest first.
    pub fn passthrough_members(&self, keys: &SetKeys) -> Result<Vec<String>> {
        self.db.zrange_all(&keys.passthrough)
    }

    /// Hit set entries inserted at or after `since`.
    pub fn hits_since(&self, keys: &SetKeys, since: i64) -> Result<Vec<SetEntry>> {
        self.db.zrange_by_score(&keys.hit, since, i64::MAX)
    }

    /// Trims both sets to at most `max` members, evicting the lowest scores.
    /// Returns the number of evicted members.
    pub fn trim(&self, keys: &SetKeys, max: usize) -> Result<usize> {
        Ok(self.trim_set(&keys.hit, max)? + self.trim_set(&keys.passthrough, max)?)
    }

    /// Deletes both sets. Returns true if either had members.
    pub fn clear(&self, keys: &SetKeys) -> Result<bool> {
        let hit = self.db.del(&keys.hit)?;
        let passthrough = self.db.del(&keys.passthrough)?;
        Ok(hit || passthrough)
    }

    fn trim_set(&self, key: &str, max: usize) -> Result<usize> {
        let count = self.db.zcard(key)?;
        if count <= max {
            return Ok(0);
        }

        let to_remove = (count - max) as i64;
        let removed = self.db.zremrangebyrank(key, 0, to_remove - 1)?;
        debug!("Limit confirm set size: deleted {} members from {}", removed, key);
        Ok(removed)
    }
}
