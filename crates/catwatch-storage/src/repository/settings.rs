//! Runtime settings repository.
//!
//! Holds values that must survive restarts but are toggled at runtime, such as
//! the category filter feature switch.

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::models::Setting;

/// Repository for runtime settings.
pub struct SettingsRepo;

impl SettingsRepo {
    /// Get a raw setting.
    pub fn get(conn: &Connection, key: &str) -> Result<Option<Setting>> {
        let value: Option<String> = conn
            .query_row("SELECT value FROM settings WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        match value {
            Some(raw) => Ok(Some(Setting {
                key: key.to_string(),
                value: serde_json::from_str(&raw)?,
            })),
            None => Ok(None),
        }
    }

    /// Get a typed setting, falling back to `default` when absent.
    pub fn get_or<T: DeserializeOwned>(conn: &Connection, key: &str, default: T) -> Result<T> {
        match Self::get(conn, key)? {
            Some(setting) => Ok(serde_json::from_value(setting.value)?),
            None => Ok(default),
        }
    }

    /// Store a typed setting (insert or replace).
    pub fn set<T: Serialize>(conn: &Connection, key: &str, value: &T) -> Result<()> {
        let raw = serde_json::to_string(value)?;

        conn.execute(
            "INSERT INTO settings (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, raw],
        )?;

        Ok(())
    }

    /// Remove a setting. Returns true if it existed.
    pub fn delete(conn: &Connection, key: &str) -> Result<bool> {
        let deleted = conn.execute("DELETE FROM settings WHERE key = ?1", [key])?;
        Ok(deleted > 0)
    }
}
