//! Intel lookup confirmation for curated categories.

use std::time::Duration;

use async_trait::async_trait;
use catwatch_core::matcher::{base_domain, is_wildcard, matches};

use super::{IntelLookup, IntelRecord, IntelResponse};
use crate::error::Result;

/// Path prefix of the intel lookup endpoint.
pub const INTEL_PATH: &str = "/intel/finger";

/// Intel service reached over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIntelClient {
    client: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl HttpIntelClient {
    /// Creates a client for the service at `base_url`.
    pub fn new(base_url: &str, token: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("Catwatch/{}", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Lookup URL for a domain.
    pub fn url_for(&self, domain: &str) -> String {
        format!("{}{}/{}", self.base_url, INTEL_PATH, domain)
    }
}

#[async_trait]
impl IntelLookup for HttpIntelClient {
    async fn lookup(&self, domain: &str) -> Result<Vec<IntelRecord>> {
        let mut builder = self.client.get(self.url_for(domain));
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await?
            .error_for_status()?
            .json::<IntelResponse>()
            .await?;
        Ok(response.results)
    }
}

/// Returns true if an intel record issued for `origin` applies to `key`.
///
/// Wildcard origins follow the pattern matcher. Literal origins cover
/// themselves and every name below them.
fn covers(origin: &str, key: &str) -> bool {
    if origin == key {
        return true;
    }

    let target = base_domain(key);
    if is_wildcard(origin) {
        return matches(target, origin);
    }
    target == origin
        || target
            .strip_suffix(origin)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

/// Decides whether intel confirms `key` as one of `accepted` categories.
///
/// Among the records covering `key`, the one with the longest origin wins; the
/// key is confirmed when that record's category is accepted.
pub fn resolve_intel(records: &[IntelRecord], key: &str, accepted: &[String]) -> bool {
    records
        .iter()
        .filter(|record| covers(&record.origin, key))
        .max_by_key(|record| base_domain(&record.origin).len())
        .is_some_and(|record| accepted.iter().any(|category| *category == record.category))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_covers() {
        assert!(covers("onlyfans.com", "onlyfans.com"));
        assert!(covers("onlyfans.com", "www.onlyfans.com"));
        assert!(covers("onlyfans.com", "*.onlyfans.com"));
        assert!(!covers("fans.com", "onlyfans.com"));
        assert!(covers("*.onlyfans.com", "www.onlyfans.com"));
        assert!(!covers("*.onlyfans.com", "onlyfans.com"));
        assert!(covers("*.onlyfans.com", "*.onlyfans.com"));
        assert!(!covers("cdn.onlyfans.com", "www.onlyfans.com"));
    }

    #[test]
    fn test_longest_origin_wins() {
        let records = vec![
            IntelRecord::new("example.com", "porn"),
            IntelRecord::new("ads.example.com", "ad"),
        ];

        assert!(resolve_intel(&records, "x.ads.example.com", &accepted(&["ad"])));
        assert!(!resolve_intel(&records, "x.ads.example.com", &accepted(&["porn"])));
        assert!(resolve_intel(&records, "www.example.com", &accepted(&["porn"])));
    }

    #[test]
    fn test_alias_accepted() {
        let records = vec![IntelRecord::new("tracker.net", "ad")];

        assert!(resolve_intel(
            &records,
            "a.tracker.net",
            &accepted(&["adblock_strict", "ad"])
        ));
        assert!(!resolve_intel(&records, "a.tracker.net", &accepted(&["adblock_strict"])));
    }

    #[test]
    fn test_no_covering_record() {
        let records = vec![IntelRecord::new("other.com", "porn")];

        assert!(!resolve_intel(&records, "a.com", &accepted(&["porn"])));
        assert!(!resolve_intel(&[], "a.com", &accepted(&["porn"])));
    }

    #[test]
    fn test_url_for() {
        let client = HttpIntelClient::new("https://intel.test/v2", None, Duration::from_secs(1)).unwrap();
        assert_eq!(client.url_for("a.com"), "https://intel.test/v2/intel/finger/a.com");
    }
}
