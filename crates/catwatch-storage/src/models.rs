//! Data models for storage.

use serde::{Deserialize, Serialize};

/// A scored member of a sorted set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetEntry {
    /// Domain or pattern.
    pub member: String,
    /// Insertion time in milliseconds since the Unix epoch.
    pub score: i64,
}

/// A persisted runtime setting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    /// Setting key.
    pub key: String,
    /// Setting value (JSON).
    pub value: serde_json::Value,
}
