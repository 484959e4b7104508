//! Cloud hashed-membership confirmation for mirrored categories.
//!
//! Domains never leave the appliance in clear text: each is lowercased,
//! SHA-256 hashed and base64 encoded, and the cloud answers with the subset of
//! digests present in the category's canonical hash set.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use catwatch_core::hashing::hash_domain;
use tracing::debug;

use super::{MembershipRequest, MembershipResponse, TargetSetMembership};
use crate::error::{ExaminerError, Result};

/// Path of the membership endpoint.
pub const MEMBERSHIP_PATH: &str = "/intel/target_set/membership";

/// Cloud membership service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpCloudClient {
    client: reqwest::Client,
    endpoint: String,
    token: Option<String>,
}

impl HttpCloudClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("Catwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), MEMBERSHIP_PATH),
            token,
        })
    }

    /// Full URL of the membership endpoint.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl TargetSetMembership for HttpCloudClient {
    async fn check_membership(&self, request: &MembershipRequest) -> Result<MembershipResponse> {
        let mut builder = self.client.post(&self.endpoint).json(request);
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await?
            .error_for_status()?
            .json::<MembershipResponse>()
            .await?;
        Ok(response)
    }
}

/// Confirms `domains` against the hash set `hash_set_id`.
///
/// Returns the confirmed subset, in the caller's spelling. A response without
/// a `domains` field is a source error.
pub async fn confirm_by_hash(
    client: &dyn TargetSetMembership,
    hash_set_id: &str,
    domains: &[String],
) -> Result<HashSet<String>> {
    if domains.is_empty() {
        return Ok(HashSet::new());
    }

    let mut by_hash: HashMap<String, Vec<&String>> = HashMap::new();
    for domain in domains {
        by_hash.entry(hash_domain(domain)).or_default().push(domain);
    }

    let request = MembershipRequest {
        id: hash_set_id.to_string(),
        domains: by_hash.keys().cloned().collect(),
    };

    let present = client.check_membership(&request).await?.domains.ok_or_else(|| {
        ExaminerError::Source(format!("membership response for {} has no domains", hash_set_id))
    })?;

    let confirmed: HashSet<String> = present
        .iter()
        .filter_map(|hash| by_hash.get(hash))
        .flatten()
        .map(|domain| domain.to_string())
        .collect();

    debug!(
        "Cloud confirmed {}/{} domains in {}",
        confirmed.len(),
        domains.len(),
        hash_set_id
    );
    Ok(confirmed)
}
