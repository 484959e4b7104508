//! In-process fakes of the remote collaborators.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use catwatch_core::category::filter_uid;
use catwatch_core::hashing::hash_domain;
use parking_lot::Mutex;

use crate::clients::{
    CheckFilterResponse, FilterResult, IntelLookup, IntelRecord, LocalFilter, MatchStatus,
    MembershipRequest, MembershipResponse, TargetSetMembership,
};
use crate::error::{ExaminerError, Result};

/// Local filter answering from a table of `domain -> (category, pattern)`.
#[derive(Default)]
pub struct FakeLocalFilter {
    matches: Mutex<HashMap<String, Vec<(String, String)>>>,
    failing: AtomicBool,
    delay: Mutex<Duration>,
    calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeLocalFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_match(self, domain: &str, category: &str, pattern: &str) -> Self {
        self.add_match(domain, category, pattern);
        self
    }

    pub fn add_match(&self, domain: &str, category: &str, pattern: &str) {
        self.matches
            .lock()
            .entry(domain.to_string())
            .or_default()
            .push((category.to_string(), pattern.to_string()));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Every check sleeps this long before answering.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl LocalFilter for FakeLocalFilter {
    async fn check_filter(&self, domain: &str, filters: &[String]) -> Result<CheckFilterResponse> {
        self.calls
            .lock()
            .push((domain.to_string(), filters.to_vec()));

        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(ExaminerError::Source("local filter unavailable".into()));
        }

        let matches = self.matches.lock();
        let hits = matches.get(domain).cloned().unwrap_or_default();

        let mut results: Vec<FilterResult> = hits
            .into_iter()
            .map(|(category, pattern)| FilterResult::new(filter_uid(&category), pattern, MatchStatus::Match))
            .filter(|result| filters.is_empty() || filters.contains(&result.uid))
            .collect();

        for uid in filters {
            if !results.iter().any(|result| &result.uid == uid) {
                results.push(FilterResult::new(uid.clone(), "", MatchStatus::NoMatch));
            }
        }

        Ok(CheckFilterResponse { results })
    }
}

/// Cloud membership service holding plain domains per hash set.
#[derive(Default)]
pub struct FakeCloud {
    members: Mutex<HashMap<String, HashSet<String>>>,
    failing: AtomicBool,
    omit_domains: bool,
    requests: Mutex<Vec<MembershipRequest>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_member(self, hash_set_id: &str, domain: &str) -> Self {
        self.add_member(hash_set_id, domain);
        self
    }

    pub fn without_domains_field(mut self) -> Self {
        self.omit_domains = true;
        self
    }

    pub fn add_member(&self, hash_set_id: &str, domain: &str) {
        self.members
            .lock()
            .entry(hash_set_id.to_string())
            .or_default()
            .insert(hash_domain(domain));
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub fn requests(&self) -> Vec<MembershipRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TargetSetMembership for FakeCloud {
    async fn check_membership(&self, request: &MembershipRequest) -> Result<MembershipResponse> {
        self.requests.lock().push(request.clone());

        if self.failing.load(Ordering::SeqCst) {
            return Err(ExaminerError::Source("cloud unavailable".into()));
        }
        if self.omit_domains {
            return Ok(MembershipResponse { domains: None });
        }

        let members = self.members.lock();
        let present: Vec<String> = members
            .get(&request.id)
            .map(|set| {
                request
                    .domains
                    .iter()
                    .filter(|hash| set.contains(*hash))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(MembershipResponse {
            domains: Some(present),
        })
    }
}

/// Intel service answering from a table of `domain -> records`.
#[derive(Default)]
pub struct FakeIntel {
    records: Mutex<HashMap<String, Vec<IntelRecord>>>,
    failing: Mutex<HashSet<String>>,
}

impl FakeIntel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(self, domain: &str, origin: &str, category: &str) -> Self {
        self.records
            .lock()
            .entry(domain.to_string())
            .or_default()
            .push(IntelRecord::new(origin, category));
        self
    }

    pub fn fail_for(&self, domain: &str) {
        self.failing.lock().insert(domain.to_string());
    }
}

#[async_trait]
impl IntelLookup for FakeIntel {
    async fn lookup(&self, domain: &str) -> Result<Vec<IntelRecord>> {
        if self.failing.lock().contains(domain) {
            return Err(ExaminerError::Source(format!("intel lookup failed for {}", domain)));
        }
        Ok(self.records.lock().get(domain).cloned().unwrap_or_default())
    }
}
