//! Confirmation against downloaded raw category lists.
//!
//! A raw list lives at `<list_dir>/<category>.lst` and holds one domain or
//! wildcard pattern per line. Blank lines and `#` comments are ignored.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use catwatch_core::matcher::{base_domain, wildcard_candidates};
use tracing::debug;

use crate::error::{ExaminerError, Result};

/// Extension of raw list files.
pub const LIST_EXTENSION: &str = "lst";

/// Reads raw category lists from a directory.
#[derive(Debug, Clone)]
pub struct FileListSource {
    dir: PathBuf,
    timeout: Duration,
}

impl FileListSource {
    /// Creates a source reading from `dir`.
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
        }
    }

    /// Directory the lists are read from.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of a category's list.
    pub fn list_path(&self, category: &str) -> Result<PathBuf> {
        if category.is_empty() || category.contains(['/', '\\']) || category.starts_with('.') {
            return Err(ExaminerError::Config(format!(
                "invalid category id for list lookup: {:?}",
                category
            )));
        }
        Ok(self.dir.join(format!("{}.{}", category, LIST_EXTENSION)))
    }

    /// Loads the entries of a category's list.
    pub async fn load(&self, category: &str) -> Result<HashSet<String>> {
        let path = self.list_path(category)?;
        let raw = tokio::time::timeout(self.timeout, tokio::fs::read_to_string(&path))
            .await
            .map_err(|_| ExaminerError::Timeout(format!("reading {:?}", path)))??;

        let entries: HashSet<String> = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(str::to_ascii_lowercase)
            .collect();

        debug!("Loaded {} entries from {:?}", entries.len(), path);
        Ok(entries)
    }

    /// Confirms `keys` against a category's list. Returns the confirmed subset.
    ///
    /// A key is confirmed when the list holds it verbatim or holds a wildcard
    /// covering it.
    pub async fn confirm(&self, category: &str, keys: &[String]) -> Result<HashSet<String>> {
        if keys.is_empty() {
            return Ok(HashSet::new());
        }

        let entries = self.load(category).await?;
        Ok(keys
            .iter()
            .filter(|key| listed(&entries, key))
            .cloned()
            .collect())
    }
}

fn listed(entries: &HashSet<String>, key: &str) -> bool {
    entries.contains(key) || wildcard_candidates(base_domain(key)).any(|pattern| entries.contains(&pattern))
}
