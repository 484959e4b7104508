//! Confirmation candidates produced by the local filter fast path.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Error parsing a composite candidate key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid candidate key: {0}")]
pub struct CandidateKeyError(pub String);

/// A local filter match waiting for authoritative confirmation.
///
/// Serialized as `category:matched_pattern:origin_domain`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfirmationCandidate {
    /// Category the local filter matched.
    pub category: String,
    /// Pattern reported by the local filter (coarser than the origin).
    pub matched_pattern: String,
    /// Domain observed on the network.
    pub origin_domain: String,
}

impl ConfirmationCandidate {
    /// Creates a new candidate.
    pub fn new(
        category: impl Into<String>,
        matched_pattern: impl Into<String>,
        origin_domain: impl Into<String>,
    ) -> Self {
        Self {
            category: category.into(),
            matched_pattern: matched_pattern.into(),
            origin_domain: origin_domain.into(),
        }
    }

    /// Returns the composite key.
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for ConfirmationCandidate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.category, self.matched_pattern, self.origin_domain
        )
    }
}

impl FromStr for ConfirmationCandidate {
    type Err = CandidateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.splitn(3, ':');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(category), Some(pattern), Some(origin))
                if !category.is_empty() && !pattern.is_empty() && !origin.is_empty() =>
            {
                Ok(Self::new(category, pattern, origin))
            }
            _ => Err(CandidateKeyError(s.to_string())),
        }
    }
}
