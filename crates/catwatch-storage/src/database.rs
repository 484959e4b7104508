//! High-level database interface.

use std::path::PathBuf;

use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, StorageError};
use crate::models::SetEntry;
use crate::pool::ConnectionPool;
use crate::repository::{SettingsRepo, SortedSetRepo};

/// High-level database interface for Catwatch.
#[derive(Clone)]
pub struct Database {
    pool: ConnectionPool,
}

impl Database {
    /// Create a new database in the default app data directory.
    pub fn new() -> Result<Self> {
        Self::with_path(Self::default_db_path()?)
    }

    /// Create a new database at a specific path.
    pub fn with_path(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        info!("Opening database at: {:?}", path);
        let pool = ConnectionPool::new(&path)?;

        Ok(Self { pool })
    }

    /// Create an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let pool = ConnectionPool::in_memory()?;
        Ok(Self { pool })
    }

    /// Get the default database path.
    pub fn default_db_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "catwatch", "catwatch")
            .ok_or_else(|| StorageError::Config("Could not determine app data directory".into()))?;

        Ok(proj_dirs.data_dir().join("catwatch.db"))
    }

    // === Sorted sets ===

    /// Add a member or refresh its score. Returns true if the member is new.
    pub fn zadd(&self, key: &str, score: i64, member: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        SortedSetRepo::add(&conn, key, score, member)
    }

    /// Remove a member. Returns true if it was present.
    pub fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        SortedSetRepo::remove(&conn, key, member)
    }

    /// Score of a member.
    pub fn zscore(&self, key: &str, member: &str) -> Result<Option<i64>> {
        let conn = self.pool.get()?;
        SortedSetRepo::score(&conn, key, member)
    }

    /// Number of members in a set.
    pub fn zcard(&self, key: &str) -> Result<usize> {
        let conn = self.pool.get()?;
        SortedSetRepo::card(&conn, key)
    }

    /// All members, lowest score first.
    pub fn zrange_all(&self, key: &str) -> Result<Vec<String>> {
        let conn = self.pool.get()?;
        SortedSetRepo::range_all(&conn, key)
    }

    /// Members within a score range, lowest score first.
    pub fn zrange_by_score(&self, key: &str, min: i64, max: i64) -> Result<Vec<SetEntry>> {
        let conn = self.pool.get()?;
        SortedSetRepo::range_by_score(&conn, key, min, max)
    }

    /// Remove members by rank (inclusive, negative indices from the top).
    pub fn zremrangebyrank(&self, key: &str, start: i64, stop: i64) -> Result<usize> {
        let conn = self.pool.get()?;
        SortedSetRepo::remove_range_by_rank(&conn, key, start, stop)
    }

    /// Delete a whole set.
    pub fn del(&self, key: &str) -> Result<bool> {
        let conn = self.pool.get()?;
        SortedSetRepo::delete_key(&conn, key)
    }

    // === Settings ===

    /// Get a typed setting with a default.
    pub fn get_setting<T: DeserializeOwned>(&self, key: &str, default: T) -> Result<T> {
        let conn = self.pool.get()?;
        SettingsRepo::get_or(&conn, key, default)
    }

    /// Store a typed setting.
    pub fn set_setting<T: Serialize>(&self, key: &str, value: &T) -> Result<()> {
        let conn = self.pool.get()?;
        SettingsRepo::set(&conn, key, value)
    }
}
