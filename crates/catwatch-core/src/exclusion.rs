//! Per-category exclusion lists.

use std::collections::HashSet;

use crate::matcher::{is_wildcard, matches};

/// Domains and patterns that must never be classified as a hit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExclusionList {
    exact: HashSet<String>,
    wildcards: Vec<String>,
}

impl ExclusionList {
    /// Creates an empty exclusion list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entry. Returns false if it was already present.
    pub fn insert(&mut self, entry: impl Into<String>) -> bool {
        let entry = entry.into();
        if is_wildcard(&entry) {
            if self.wildcards.contains(&entry) {
                return false;
            }
            // `exact` holds every entry, wildcards included.
            self.exact.insert(entry.clone());
            self.wildcards.push(entry);
            true
        } else {
            self.exact.insert(entry)
        }
    }

    /// Returns true if `domain` (a hostname or stored pattern) is excluded.
    ///
    /// An entry excludes a domain when it equals it, or when the entry is a
    /// wildcard covering the domain.
    pub fn covers(&self, domain: &str) -> bool {
        self.exact.contains(domain) || self.wildcards.iter().any(|w| matches(domain, w))
    }

    /// Returns true if any of the given names is excluded.
    pub fn covers_any<'a>(&self, domains: impl IntoIterator<Item = &'a str>) -> bool {
        domains.into_iter().any(|d| self.covers(d))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// Returns true if the list has no entries.
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ExclusionList {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut list = ExclusionList::new();
        for entry in iter {
            list.insert(entry);
        }
        list
    }
}
