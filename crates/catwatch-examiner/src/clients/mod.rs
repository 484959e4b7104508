//! Clients of the services the pipeline consults.
//!
//! Each remote collaborator sits behind a trait so the examiner can be driven
//! by in-process fakes in tests:
//!
//! - [`LocalFilter`]: the local bloom-filter service (fast, lossy)
//! - [`TargetSetMembership`]: the cloud hashed-membership check (mirrored categories)
//! - [`IntelLookup`]: the cloud intel lookup (curated categories)
//!
//! Raw list files are read directly by [`FileListSource`].

pub mod cloud;
pub mod file;
pub mod intel;
pub mod local_filter;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use cloud::{confirm_by_hash, HttpCloudClient};
pub use file::FileListSource;
pub use intel::{resolve_intel, HttpIntelClient};
pub use local_filter::HttpLocalFilter;

/// Outcome of one filter check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchStatus {
    Match,
    NoMatch,
    /// Any status this version does not know.
    #[serde(other)]
    Unknown,
}

/// One filter's answer for a domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterResult {
    /// Filter uid (`category:<id>`).
    pub uid: String,
    /// Pattern that matched; may be coarser than the checked domain.
    #[serde(default)]
    pub item: String,
    pub status: MatchStatus,
}

impl FilterResult {
    /// Creates a result.
    pub fn new(uid: impl Into<String>, item: impl Into<String>, status: MatchStatus) -> Self {
        Self {
            uid: uid.into(),
            item: item.into(),
            status,
        }
    }
}

/// Response of the local filter service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckFilterResponse {
    #[serde(default)]
    pub results: Vec<FilterResult>,
}

/// Request body of the local filter service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckFilterRequest {
    pub domain: String,
    pub filters: Vec<String>,
}

/// Request body of the cloud membership check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipRequest {
    /// Hash set id (`app.<category>`).
    pub id: String,
    /// Base64 SHA-256 digests of the domains to check.
    pub domains: Vec<String>,
}

/// Response of the cloud membership check: the subset of digests present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipResponse {
    #[serde(default)]
    pub domains: Option<Vec<String>>,
}

/// One intel record for a looked-up domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelRecord {
    /// Domain or pattern the record was issued for.
    pub origin: String,
    /// Category the intel source assigns.
    pub category: String,
}

impl IntelRecord {
    /// Creates a record.
    pub fn new(origin: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            category: category.into(),
        }
    }
}

/// Response of the intel lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntelResponse {
    #[serde(default)]
    pub results: Vec<IntelRecord>,
}

/// Local bloom-filter service.
#[async_trait]
pub trait LocalFilter: Send + Sync {
    /// Checks `domain` against the given filter uids (all active filters when
    /// empty).
    async fn check_filter(&self, domain: &str, filters: &[String]) -> Result<CheckFilterResponse>;
}

/// Cloud hashed-membership check.
#[async_trait]
pub trait TargetSetMembership: Send + Sync {
    /// Returns the digests of `request.domains` present in the hash set.
    async fn check_membership(&self, request: &MembershipRequest) -> Result<MembershipResponse>;
}

/// Cloud intel lookup.
#[async_trait]
pub trait IntelLookup: Send + Sync {
    /// Returns the intel records known for `domain`.
    async fn lookup(&self, domain: &str) -> Result<Vec<IntelRecord>>;
}
