//! Sorted-set repository.
//!
//! Mirrors the small subset of sorted-set commands the classifier needs. Rank
//! order is ascending score, ties broken by member.

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::Result;
use crate::models::SetEntry;

/// Repository for sorted-set operations.
pub struct SortedSetRepo;

impl SortedSetRepo {
    /// Add a member or update its score. Returns true if the member is new.
    pub fn add(conn: &Connection, key: &str, score: i64, member: &str) -> Result<bool> {
        let existed = Self::score(conn, key, member)?.is_some();

        conn.execute(
            "INSERT INTO sorted_sets (set_key, member, score) VALUES (?1, ?2, ?3)
             ON CONFLICT(set_key, member) DO UPDATE SET score = ?3",
            params![key, member, score],
        )?;

        Ok(!existed)
    }

    /// Remove a member. Returns true if it was present.
    pub fn remove(conn: &Connection, key: &str, member: &str) -> Result<bool> {
        let deleted = conn.execute(
            "DELETE FROM sorted_sets WHERE set_key = ?1 AND member = ?2",
            params![key, member],
        )?;
        Ok(deleted > 0)
    }

    /// Score of a member, or `None` if absent.
    pub fn score(conn: &Connection, key: &str, member: &str) -> Result<Option<i64>> {
        let score = conn
            .query_row(
                "SELECT score FROM sorted_sets WHERE set_key = ?1 AND member = ?2",
                params![key, member],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score)
    }

    /// Number of members.
    pub fn card(conn: &Connection, key: &str) -> Result<usize> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM sorted_sets WHERE set_key = ?1",
            [key],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// All members in rank order.
    pub fn range_all(conn: &Connection, key: &str) -> Result<Vec<String>> {
        let mut stmt = conn.prepare(
            "SELECT member FROM sorted_sets WHERE set_key = ?1 ORDER BY score ASC, member ASC",
        )?;

        let members = stmt
            .query_map([key], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;

        Ok(members)
    }

    /// Members with `min <= score <= max`, in rank order.
    pub fn range_by_score(conn: &Connection, key: &str, min: i64, max: i64) -> Result<Vec<SetEntry>> {
        let mut stmt = conn.prepare(
            "SELECT member, score FROM sorted_sets
             WHERE set_key = ?1 AND score >= ?2 AND score <= ?3
             ORDER BY score ASC, member ASC",
        )?;

        let entries = stmt
            .query_map(params![key, min, max], |row| {
                Ok(SetEntry {
                    member: row.get(0)?,
                    score: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(entries)
    }

    /// Remove members by rank, inclusive on both ends.
    ///
    /// Negative indices count from the highest rank (`-1` is the last member).
    /// Returns the number of members removed.
    pub fn remove_range_by_rank(conn: &Connection, key: &str, start: i64, stop: i64) -> Result<usize> {
        let len = Self::card(conn, key)? as i64;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

        if len == 0 || start > stop {
            return Ok(0);
        }

        let removed = conn.execute(
            "DELETE FROM sorted_sets WHERE set_key = ?1 AND member IN (
                SELECT member FROM sorted_sets WHERE set_key = ?1
                ORDER BY score ASC, member ASC
                LIMIT ?2 OFFSET ?3
             )",
            params![key, stop - start + 1, start],
        )?;

        Ok(removed)
    }

    /// Delete the whole set. Returns true if it had members.
    pub fn delete_key(conn: &Connection, key: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM sorted_sets WHERE set_key = ?1", [key])?;
        Ok(deleted > 0)
    }
}
