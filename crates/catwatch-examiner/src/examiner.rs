//! The category examiner.
//!
//! Turns raw domain detections into durable per-category classifications:
//!
//! 1. [`CategoryExaminer::detect_domain`] runs the local filter, takes the fast
//!    paths for already classified domains and queues everything else.
//! 2. [`CategoryExaminer::confirm_job`] drains the queue, confirms each
//!    category's candidates with its authoritative source and records hits and
//!    passthroughs.
//! 3. [`CategoryExaminer::refresh_category_filter`] re-walks a category's sets
//!    after its local filter changed and drops entries that drifted.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use catwatch_core::category::{category_from_uid, filter_uid};
use catwatch_core::matcher::{is_wildcard, normalize_domain};
use catwatch_core::{ConfirmationCandidate, DetectionMemo, ExaminerEvent, ExclusionList};
use catwatch_storage::{now_score, ClassificationStore, SetKeys};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::category_manager::CategoryManager;
use crate::clients::{LocalFilter, MatchStatus};
use crate::config::ExaminerConfig;
use crate::confirm::{ConfirmSource, Confirmer};
use crate::error::Result;
use crate::notifier::Notifier;
use crate::queue::{group_by_category, ConfirmQueue, Pending};

/// Settings key of the persisted feature switch.
pub const FEATURE_KEY: &str = "feature.category_filter";

/// Summary of one confirmation drain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfirmReport {
    /// Candidates drained from the queue.
    pub candidates: usize,
    /// Categories the candidates belonged to.
    pub categories: usize,
    /// Categories whose sets changed.
    pub changed: Vec<String>,
    /// Candidates put back for another attempt.
    pub requeued: usize,
    /// Candidates dropped after exhausting their attempts.
    pub dropped: usize,
}

/// Summary of one category refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshReport {
    pub category: String,
    /// Members of both sets when the refresh started.
    pub checked: usize,
    /// Excluded hits moved to the passthrough set.
    pub excluded: usize,
    /// Members the local filter no longer matches.
    pub unmatched: usize,
    /// Members sent to the authoritative source.
    pub escalated: usize,
    /// Hits the source no longer confirms.
    pub removed_hits: usize,
    /// Passthroughs the source now confirms.
    pub removed_passthrough: usize,
    /// Whether any set membership changed.
    pub changed: bool,
}

impl RefreshReport {
    fn new(category: &str) -> Self {
        Self {
            category: category.to_string(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Default)]
struct CategoryOutcome {
    changed: bool,
    requeued: usize,
    dropped: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SetKind {
    Hit,
    Passthrough,
}

/// Detection, confirmation and refresh of category sets.
pub struct CategoryExaminer {
    config: ExaminerConfig,
    enabled: AtomicBool,
    store: ClassificationStore,
    manager: Arc<dyn CategoryManager>,
    local_filter: Arc<dyn LocalFilter>,
    confirmer: Confirmer,
    notifier: Notifier,
    queue: ConfirmQueue,
    memo: Mutex<DetectionMemo>,
    refresh_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    shutdown: CancellationToken,
}

impl CategoryExaminer {
    /// Creates an examiner. The feature switch starts from its persisted
    /// value, falling back to `config.enabled`.
    pub fn new(
        config: ExaminerConfig,
        store: ClassificationStore,
        manager: Arc<dyn CategoryManager>,
        local_filter: Arc<dyn LocalFilter>,
        confirmer: Confirmer,
        notifier: Notifier,
    ) -> Self {
        let enabled = store
            .database()
            .get_setting(FEATURE_KEY, config.enabled)
            .unwrap_or_else(|e| {
                warn!("Failed to read feature switch, using config value: {}", e);
                config.enabled
            });

        let memo = DetectionMemo::new(config.memo_capacity, config.memo_ttl());
        let queue = ConfirmQueue::new(config.max_confirm_attempts);

        Self {
            config,
            enabled: AtomicBool::new(enabled),
            store,
            manager,
            local_filter,
            confirmer,
            notifier,
            queue,
            memo: Mutex::new(memo),
            refresh_locks: Mutex::new(HashMap::new()),
            shutdown: CancellationToken::new(),
        }
    }

    /// Uses `token` to abort pending refreshes on shutdown.
    pub fn with_shutdown(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Token cancelled on shutdown.
    pub fn shutdown_token(&self) -> &CancellationToken {
        &self.shutdown
    }

    pub fn config(&self) -> &ExaminerConfig {
        &self.config
    }

    pub fn store(&self) -> &ClassificationStore {
        &self.store
    }

    pub fn manager(&self) -> &Arc<dyn CategoryManager> {
        &self.manager
    }

    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    pub fn queue(&self) -> &ConfirmQueue {
        &self.queue
    }

    /// Returns true if the category filter feature is on.
    pub fn is_on(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Turns the category filter feature on or off and persists the choice.
    pub fn set_enabled(&self, enabled: bool) -> Result<()> {
        self.store.database().set_setting(FEATURE_KEY, &enabled)?;
        self.enabled.store(enabled, Ordering::SeqCst);
        info!(
            "Category filter feature {}",
            if enabled { "enabled" } else { "disabled" }
        );
        Ok(())
    }

    /// Examines a domain seen on the network. Returns the number of
    /// candidates queued for confirmation.
    pub async fn detect_domain(&self, origin: &str) -> usize {
        if !self.is_on() {
            return 0;
        }
        if self.memo.lock().seen(origin) {
            return 0;
        }
        debug!("Detect domain {}", origin);

        let response = match self.local_filter.check_filter(origin, &[]).await {
            Ok(response) => response,
            Err(e) => {
                debug!("Local filter check of {} failed: {}", origin, e);
                return 0;
            }
        };

        let mut enqueued = 0;
        for result in response.results {
            if result.status != MatchStatus::Match {
                continue;
            }
            let Some(category) = category_from_uid(&result.uid) else {
                continue;
            };
            if !self.manager.is_activated(category) {
                debug!("Skip match of {} in inactive category {}", origin, category);
                continue;
            }

            let pattern = if result.item.is_empty() {
                origin
            } else {
                result.item.as_str()
            };
            match self.examine_match(category, pattern, origin).await {
                Ok(true) => enqueued += 1,
                Ok(false) => {}
                Err(e) => warn!("Failed to examine {} for category {}: {}", origin, category, e),
            }
        }

        enqueued
    }

    async fn examine_match(&self, category: &str, pattern: &str, origin: &str) -> Result<bool> {
        let exclusions = self.exclusions(category).await;
        if exclusions.covers_any([origin, pattern]) {
            debug!("{} ({}) is excluded from category {}", origin, pattern, category);
            return Ok(false);
        }

        let keys = self.manager.set_keys(category);
        let score = now_score();

        if self.store.in_hit_set(&keys, pattern)? {
            debug!("Fast confirm {} in hit set of {}", pattern, category);
            self.store.add_hit(&keys, pattern, score)?;
            return Ok(false);
        }
        if self.store.in_passthrough_set(&keys, origin)? {
            debug!("Fast refute {} in passthrough set of {}", origin, category);
            self.store.add_passthrough(&keys, origin, score)?;
            return Ok(false);
        }

        let candidate = ConfirmationCandidate::new(category, pattern, origin);
        let queued = self.queue.enqueue(candidate);
        if queued {
            debug!("Queue {}:{}:{} for confirmation", category, pattern, origin);
        }
        Ok(queued)
    }

    /// Drains the confirmation queue once.
    pub async fn confirm_job(&self) -> ConfirmReport {
        let batch = self.queue.drain();
        if batch.is_empty() {
            return ConfirmReport::default();
        }

        let mut report = ConfirmReport {
            candidates: batch.len(),
            ..Default::default()
        };

        for (category, items) in group_by_category(batch) {
            report.categories += 1;

            match self.confirm_category(&category, &items).await {
                Ok(outcome) => {
                    report.requeued += outcome.requeued;
                    report.dropped += outcome.dropped;
                    if outcome.changed {
                        self.notifier.notify(&category);
                        report.changed.push(category);
                    }
                }
                Err(e) => {
                    warn!(
                        "Failed to confirm {} candidates of category {}: {}",
                        items.len(),
                        category,
                        e
                    );
                    for (candidate, attempts) in items {
                        if self.queue.requeue(candidate, attempts) {
                            report.requeued += 1;
                        } else {
                            report.dropped += 1;
                        }
                    }
                }
            }
        }

        report
    }

    async fn confirm_category(&self, category: &str, items: &[Pending]) -> Result<CategoryOutcome> {
        let mut outcome = CategoryOutcome::default();

        let strategy = self.manager.strategy(category).await;
        if !strategy.update_confirm_set {
            debug!("Drop {} candidates of category {}", items.len(), category);
            return Ok(outcome);
        }

        let style = self.manager.style(category).await;
        let source = ConfirmSource::select(&strategy, &style);
        let keys: Vec<String> = items
            .iter()
            .map(|(candidate, _)| source.key_of(candidate).to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let confirmation = self.confirmer.confirm(category, source, &style, &keys).await?;

        let exclusions = self.exclusions(category).await;
        let set_keys = self.manager.set_keys(category);
        let score = now_score();
        let mut fed = HashSet::new();

        for (candidate, attempts) in items {
            let key = source.key_of(candidate);
            if confirmation.failed.contains(key) {
                if self.queue.requeue(candidate.clone(), *attempts) {
                    outcome.requeued += 1;
                } else {
                    outcome.dropped += 1;
                }
                continue;
            }

            let pattern = candidate.matched_pattern.as_str();
            let origin = candidate.origin_domain.as_str();

            if !confirmation.confirmed.contains(key) {
                outcome.changed |= applied(
                    self.store.add_passthrough(&set_keys, origin, score),
                    "add to passthrough set",
                    origin,
                    category,
                );
                continue;
            }

            if exclusions.covers_any([pattern, origin]) {
                info!("{} is excluded from category {}, add to passthrough set", origin, category);
                outcome.changed |= applied(
                    self.store.add_passthrough(&set_keys, origin, score),
                    "add to passthrough set",
                    origin,
                    category,
                );
                continue;
            }

            outcome.changed |= applied(
                self.store.add_hit(&set_keys, pattern, score),
                "add to hit set",
                pattern,
                category,
            );

            if source.feeds_enforcement() && fed.insert(pattern) {
                if let Err(e) = self
                    .manager
                    .update_domain(category, pattern, is_wildcard(pattern))
                    .await
                {
                    warn!("Failed to update domain {} of category {}: {}", pattern, category, e);
                }
            }
        }

        match self.store.trim(&set_keys, self.config.max_set_size) {
            Ok(0) => {}
            Ok(_) => outcome.changed = true,
            Err(e) => warn!("Failed to trim sets of category {}: {}", category, e),
        }

        Ok(outcome)
    }

    /// Re-validates a category's sets against its current local filter.
    ///
    /// Returns `Ok(None)` when the refresh was skipped (feature off, shutdown
    /// or a category that keeps no sets). Excluded hits are moved to the
    /// passthrough set first; a confirmation source failure then aborts the
    /// refresh before any other member is touched.
    pub async fn refresh_category_filter(&self, category: &str) -> Result<Option<RefreshReport>> {
        if !self.is_on() {
            return Ok(None);
        }
        if !self.settle().await {
            return Ok(None);
        }

        let lock = self.refresh_lock(category);
        let _guard = lock.lock().await;

        let strategy = self.manager.strategy(category).await;
        if !strategy.update_confirm_set {
            return Ok(None);
        }

        let keys = self.manager.set_keys(category);
        let hits = self.store.hit_members(&keys)?;
        let passthroughs = self.store.passthrough_members(&keys)?;

        let mut report = RefreshReport::new(category);
        report.checked = hits.len() + passthroughs.len();
        if report.checked == 0 {
            return Ok(Some(report));
        }

        let exclusions = self.exclusions(category).await;
        let mut excluded_hits = Vec::new();
        let mut members = Vec::with_capacity(report.checked);
        for domain in hits {
            if exclusions.covers(&domain) {
                excluded_hits.push(domain);
            } else {
                members.push((domain, SetKind::Hit));
            }
        }
        members.extend(
            passthroughs
                .into_iter()
                .filter(|domain| !exclusions.covers(domain))
                .map(|domain| (domain, SetKind::Passthrough)),
        );

        let score = now_score();
        let mut changed = false;
        for domain in &excluded_hits {
            info!("Move excluded {} from hit set to passthrough set of {}", domain, category);
            report.excluded += 1;
            changed |= applied(
                self.store.add_passthrough(&keys, domain, score),
                "move to passthrough set",
                domain,
                category,
            );
        }

        let uid = filter_uid(category);
        let filters = [uid.clone()];
        let mut unmatched = Vec::new();
        let mut escalated = Vec::new();

        for (domain, kind) in members {
            if self.shutdown.is_cancelled() {
                if changed {
                    self.notifier.notify(category);
                }
                return Ok(None);
            }

            let still_listed = match self.local_filter.check_filter(&domain, &filters).await {
                Ok(response) => response
                    .results
                    .iter()
                    .find(|result| result.uid == uid)
                    .is_some_and(|result| result.status != MatchStatus::NoMatch),
                Err(e) => {
                    debug!("Local filter check of {} failed, escalating: {}", domain, e);
                    true
                }
            };

            if still_listed {
                escalated.push((domain, kind));
            } else {
                unmatched.push((domain, kind));
            }
        }

        info!(
            "Refresh {} domains in category hit/passthrough: {}",
            escalated.len(),
            category
        );

        let style = self.manager.style(category).await;
        let source = ConfirmSource::select(&strategy, &style);
        let to_confirm: Vec<String> = escalated.iter().map(|(domain, _)| domain.clone()).collect();
        let confirmation = match self.confirmer.confirm(category, source, &style, &to_confirm).await {
            Ok(confirmation) => confirmation,
            Err(e) => {
                error!("Fail to refresh domains of category {}, abort: {}", category, e);
                if changed {
                    self.notifier.notify(category);
                }
                return Err(e);
            }
        };

        for (domain, kind) in &unmatched {
            report.unmatched += 1;
            changed |= self.remove_member(&keys, *kind, domain, category);
        }

        report.escalated = escalated.len();
        for (domain, kind) in &escalated {
            if confirmation.failed.contains(domain) {
                continue;
            }
            let confirmed = confirmation.confirmed.contains(domain);
            match kind {
                SetKind::Hit if !confirmed => {
                    report.removed_hits += 1;
                    changed |= self.remove_member(&keys, *kind, domain, category);
                }
                SetKind::Passthrough if confirmed => {
                    report.removed_passthrough += 1;
                    changed |= self.remove_member(&keys, *kind, domain, category);
                }
                _ => {}
            }
        }

        report.changed = changed;
        if changed {
            self.notifier.notify(category);
        }
        Ok(Some(report))
    }

    /// Refreshes every active category in turn.
    pub async fn refresh_all(&self) -> Vec<RefreshReport> {
        let mut reports = Vec::new();
        for category in self.manager.active_categories() {
            if self.shutdown.is_cancelled() {
                break;
            }
            match self.refresh_category_filter(&category).await {
                Ok(Some(report)) => reports.push(report),
                Ok(None) => {}
                Err(e) => warn!("Refresh of category {} failed: {}", category, e),
            }
        }
        reports
    }

    /// Deletes both sets of a deactivated category. Returns true if either
    /// held members.
    pub fn deactivate_category(&self, category: &str) -> Result<bool> {
        let keys = self.manager.set_keys(category);
        let cleared = self.store.clear(&keys)?;
        info!("Category {} deactivated, cleared sets: {}", category, cleared);
        if cleared {
            self.notifier.notify(category);
        }
        Ok(cleared)
    }

    /// Hits recorded within `window` across every active category.
    pub fn recent_hits(&self, window: Duration) -> Result<usize> {
        let since = now_score().saturating_sub(window.as_millis() as i64);
        let mut total = 0;
        for category in self.manager.active_categories() {
            total += self.store.hits_since(&self.manager.set_keys(&category), since)?.len();
        }
        Ok(total)
    }

    /// Reacts to a pipeline event. Returns the handle of a spawned refresh.
    pub async fn handle_event(self: &Arc<Self>, event: ExaminerEvent) -> Option<JoinHandle<()>> {
        match event {
            ExaminerEvent::DomainDetected { domain } => {
                match normalize_domain(&domain) {
                    Some(domain) => {
                        self.detect_domain(&domain).await;
                    }
                    None => warn!("Ignoring malformed domain {:?}", domain),
                }
                None
            }
            ExaminerEvent::FilterGenerationUpdated { category } => {
                let examiner = Arc::clone(self);
                Some(tokio::spawn(async move {
                    if let Err(e) = examiner.refresh_category_filter(&category).await {
                        warn!("Refresh of category {} failed: {}", category, e);
                    }
                }))
            }
            ExaminerEvent::CategoryDeactivated { category } => {
                if let Err(e) = self.deactivate_category(&category) {
                    error!("Failed to clear sets of category {}: {}", category, e);
                }
                None
            }
        }
    }

    async fn exclusions(&self, category: &str) -> ExclusionList {
        self.manager.excluded_domains(category).await.into_iter().collect()
    }

    async fn settle(&self) -> bool {
        let delay = self.config.settle_delay();
        if delay.is_zero() {
            return !self.shutdown.is_cancelled();
        }
        tokio::select! {
            _ = self.shutdown.cancelled() => false,
            _ = tokio::time::sleep(delay) => true,
        }
    }

    fn refresh_lock(&self, category: &str) -> Arc<tokio::sync::Mutex<()>> {
        self.refresh_locks
            .lock()
            .entry(category.to_string())
            .or_default()
            .clone()
    }

    fn remove_member(&self, keys: &SetKeys, kind: SetKind, domain: &str, category: &str) -> bool {
        match kind {
            SetKind::Hit => {
                info!("Remove {} from hit set of {}", domain, category);
                applied(self.store.remove_hit(keys, domain), "remove from hit set", domain, category)
            }
            SetKind::Passthrough => {
                info!("Remove {} from passthrough set of {}", domain, category);
                applied(
                    self.store.remove_passthrough(keys, domain),
                    "remove from passthrough set",
                    domain,
                    category,
                )
            }
        }
    }
}

fn applied(result: catwatch_storage::Result<bool>, action: &str, domain: &str, category: &str) -> bool {
    match result {
        Ok(changed) => changed,
        Err(e) => {
            warn!("Failed to {} {} in category {}: {}", action, domain, category, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use catwatch_core::{CategoryDefinition, ConfirmStyle, HitSetUpdated, Strategy};
    use catwatch_storage::Database;
    use tokio::sync::broadcast;

    use crate::category_manager::StaticCategoryManager;
    use crate::clients::FileListSource;
    use crate::testing::{FakeCloud, FakeIntel, FakeLocalFilter};

    struct Harness {
        examiner: Arc<CategoryExaminer>,
        local: Arc<FakeLocalFilter>,
        cloud: Arc<FakeCloud>,
        manager: Arc<StaticCategoryManager>,
        store: ClassificationStore,
        notifications: broadcast::Receiver<HitSetUpdated>,
        dir: tempfile::TempDir,
    }

    impl Harness {
        fn new(categories: Vec<CategoryDefinition>) -> Self {
            Self::build(categories, FakeIntel::new(), ExaminerConfig::default())
        }

        fn build(categories: Vec<CategoryDefinition>, intel: FakeIntel, config: ExaminerConfig) -> Self {
            let dir = tempfile::tempdir().unwrap();
            let store = ClassificationStore::new(Database::in_memory().unwrap());
            Self::with_store(store, categories, intel, config, dir)
        }

        fn with_store(
            store: ClassificationStore,
            categories: Vec<CategoryDefinition>,
            intel: FakeIntel,
            config: ExaminerConfig,
            dir: tempfile::TempDir,
        ) -> Self {
            let config = config
                .with_settle_delay(Duration::ZERO)
                .with_list_dir(dir.path());

            let local = Arc::new(FakeLocalFilter::new());
            let cloud = Arc::new(FakeCloud::new());
            let manager = Arc::new(StaticCategoryManager::new(store.clone(), categories));
            let confirmer = Confirmer::new(
                cloud.clone(),
                Arc::new(intel),
                FileListSource::new(dir.path(), Duration::from_secs(1)),
            );
            let notifier = Notifier::default();
            let notifications = notifier.subscribe();

            let examiner = Arc::new(CategoryExaminer::new(
                config,
                store.clone(),
                manager.clone(),
                local.clone(),
                confirmer,
                notifier,
            ));

            Self {
                examiner,
                local,
                cloud,
                manager,
                store,
                notifications,
                dir,
            }
        }

        fn keys(&self, category: &str) -> SetKeys {
            SetKeys::for_category(category)
        }

        fn hits(&self, category: &str) -> Vec<String> {
            self.store.hit_members(&self.keys(category)).unwrap()
        }

        fn passthroughs(&self, category: &str) -> Vec<String> {
            self.store.passthrough_members(&self.keys(category)).unwrap()
        }

        fn notified(&mut self) -> Vec<String> {
            let mut categories = Vec::new();
            while let Ok(event) = self.notifications.try_recv() {
                categories.push(event.category);
            }
            categories
        }
    }

    fn porn() -> CategoryDefinition {
        CategoryDefinition::new("porn")
    }

    #[tokio::test]
    async fn test_confirmed_match_becomes_hit() {
        let mut h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");
        h.cloud.add_member("app.porn", "*.onlyfans.com");

        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 1);
        assert!(h.examiner.queue().contains(&ConfirmationCandidate::new(
            "porn",
            "*.onlyfans.com",
            "www.onlyfans.com"
        )));

        let report = h.examiner.confirm_job().await;

        assert_eq!(report.candidates, 1);
        assert_eq!(report.changed, vec!["porn"]);
        assert_eq!(h.hits("porn"), vec!["*.onlyfans.com"]);
        assert!(h.passthroughs("porn").is_empty());
        assert_eq!(h.notified(), vec!["porn"]);
        assert_eq!(h.manager.dynamic_domains("porn").unwrap(), vec!["*.onlyfans.com"]);
    }

    #[tokio::test]
    async fn test_refuted_match_becomes_passthrough() {
        let mut h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        h.examiner.detect_domain("www.onlyfans.com").await;
        h.examiner.confirm_job().await;

        assert!(h.hits("porn").is_empty());
        assert_eq!(h.passthroughs("porn"), vec!["www.onlyfans.com"]);
        assert_eq!(h.notified(), vec!["porn"]);
        assert!(h.manager.dynamic_domains("porn").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_known_hit_is_refreshed_not_queued() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");
        h.store.add_hit(&h.keys("porn"), "*.onlyfans.com", 1).unwrap();

        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 0);
        assert!(h.examiner.queue().is_empty());

        let score = h
            .store
            .database()
            .zscore("category:porn:hit:domain", "*.onlyfans.com")
            .unwrap()
            .unwrap();
        assert!(score > 1);
    }

    #[tokio::test]
    async fn test_known_passthrough_is_refreshed_not_queued() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");
        h.store
            .add_passthrough(&h.keys("porn"), "www.onlyfans.com", 1)
            .unwrap();

        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 0);
        assert!(h.examiner.queue().is_empty());
        assert_eq!(h.passthroughs("porn"), vec!["www.onlyfans.com"]);
    }

    #[tokio::test]
    async fn test_repeated_detection_is_memoized() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        h.examiner.detect_domain("www.onlyfans.com").await;
        h.examiner.detect_domain("www.onlyfans.com").await;

        assert_eq!(h.local.calls().len(), 1);
        assert_eq!(h.examiner.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_feature_switch() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        h.examiner.set_enabled(false).unwrap();
        assert!(!h.examiner.is_on());
        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 0);
        assert!(h.local.calls().is_empty());
        assert_eq!(h.examiner.refresh_category_filter("porn").await.unwrap(), None);

        let restarted = Harness::with_store(
            h.store.clone(),
            vec![porn()],
            FakeIntel::new(),
            ExaminerConfig::default(),
            tempfile::tempdir().unwrap(),
        );
        assert!(!restarted.examiner.is_on());
    }

    #[tokio::test]
    async fn test_excluded_detection_is_not_queued() {
        let h = Harness::new(vec![porn().with_excluded("*.onlyfans.com")]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 0);
        assert!(h.examiner.queue().is_empty());
    }

    #[tokio::test]
    async fn test_inactive_category_is_skipped() {
        let h = Harness::new(vec![porn().with_active(false)]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 0);
    }

    #[tokio::test]
    async fn test_local_filter_error_is_swallowed() {
        let h = Harness::new(vec![porn()]);
        h.local.set_failing(true);

        assert_eq!(h.examiner.detect_domain("www.onlyfans.com").await, 0);
        assert!(h.examiner.queue().is_empty());
    }

    #[tokio::test]
    async fn test_empty_confirm_job_is_noop() {
        let mut h = Harness::new(vec![porn()]);

        assert_eq!(h.examiner.confirm_job().await, ConfirmReport::default());
        assert!(h.notified().is_empty());
        assert!(h.cloud.requests().is_empty());
    }

    #[tokio::test]
    async fn test_cloud_failure_requeues_until_dropped() {
        let mut h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");
        h.cloud.set_failing(true);

        h.examiner.detect_domain("www.onlyfans.com").await;

        let first = h.examiner.confirm_job().await;
        assert_eq!(first.requeued, 1);
        assert!(h.hits("porn").is_empty());
        assert!(h.passthroughs("porn").is_empty());

        let second = h.examiner.confirm_job().await;
        assert_eq!(second.requeued, 1);

        let third = h.examiner.confirm_job().await;
        assert_eq!(third.dropped, 1);
        assert!(h.examiner.queue().is_empty());
        assert!(h.notified().is_empty());
    }

    #[tokio::test]
    async fn test_requeued_candidate_confirms_once_source_recovers() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");
        h.cloud.add_member("app.porn", "*.onlyfans.com");
        h.cloud.set_failing(true);

        h.examiner.detect_domain("www.onlyfans.com").await;
        h.examiner.confirm_job().await;

        h.cloud.set_failing(false);
        let report = h.examiner.confirm_job().await;
        assert_eq!(report.changed, vec!["porn"]);
        assert_eq!(h.hits("porn"), vec!["*.onlyfans.com"]);
    }

    #[tokio::test]
    async fn test_ignored_category_drops_candidates() {
        let h = Harness::new(vec![porn().with_strategy(Strategy::ignore())]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        h.examiner.detect_domain("www.onlyfans.com").await;
        let report = h.examiner.confirm_job().await;

        assert!(report.changed.is_empty());
        assert!(h.hits("porn").is_empty());
        assert!(h.passthroughs("porn").is_empty());
        assert!(h.cloud.requests().is_empty());
    }

    #[tokio::test]
    async fn test_trusted_category_confirms_without_source() {
        let h = Harness::new(vec![
            CategoryDefinition::new("games").with_strategy(Strategy::trust_local())
        ]);
        h.local.add_match("play.steam.com", "games", "*.steam.com");

        h.examiner.detect_domain("play.steam.com").await;
        h.examiner.confirm_job().await;

        assert_eq!(h.hits("games"), vec!["*.steam.com"]);
        assert!(h.cloud.requests().is_empty());
        assert!(h.manager.dynamic_domains("games").unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_exclusion_added_after_detection_wins() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");
        h.cloud.add_member("app.porn", "*.onlyfans.com");

        h.examiner.detect_domain("www.onlyfans.com").await;
        h.manager.add_exclusion("porn", "www.onlyfans.com");
        h.examiner.confirm_job().await;

        assert!(h.hits("porn").is_empty());
        assert_eq!(h.passthroughs("porn"), vec!["www.onlyfans.com"]);
    }

    #[tokio::test]
    async fn test_curated_category_retries_only_failed_lookups() {
        let intel = FakeIntel::new().with_record("ads.tracker.net", "tracker.net", "ad");
        intel.fail_for("cdn.broken.net");
        let category = CategoryDefinition::new("adblock_strict").with_style(ConfirmStyle::Curated {
            aliases: vec!["ad".to_string()],
        });
        let h = Harness::build(vec![category], intel, ExaminerConfig::default());
        h.local.add_match("ads.tracker.net", "adblock_strict", "*.tracker.net");
        h.local.add_match("cdn.broken.net", "adblock_strict", "*.broken.net");

        h.examiner.detect_domain("ads.tracker.net").await;
        h.examiner.detect_domain("cdn.broken.net").await;
        let report = h.examiner.confirm_job().await;

        assert_eq!(report.requeued, 1);
        assert_eq!(h.hits("adblock_strict"), vec!["*.tracker.net"]);
        assert!(h.passthroughs("adblock_strict").is_empty());
        assert!(h.examiner.queue().contains(&ConfirmationCandidate::new(
            "adblock_strict",
            "*.broken.net",
            "cdn.broken.net"
        )));
        assert_eq!(
            h.manager.dynamic_domains("adblock_strict").unwrap(),
            vec!["*.tracker.net"]
        );
    }

    #[tokio::test]
    async fn test_file_category_confirms_by_origin() {
        let h = Harness::new(vec![CategoryDefinition::new("av").with_strategy(Strategy::file())]);
        tokio::fs::write(h.dir.path().join("av.lst"), "bad.malware.net\n")
            .await
            .unwrap();
        h.local.add_match("bad.malware.net", "av", "*.malware.net");
        h.local.add_match("ok.malware.net", "av", "*.malware.net");

        h.examiner.detect_domain("bad.malware.net").await;
        h.examiner.detect_domain("ok.malware.net").await;
        h.examiner.confirm_job().await;

        assert_eq!(h.hits("av"), vec!["*.malware.net"]);
        assert_eq!(h.passthroughs("av"), vec!["ok.malware.net"]);
    }

    #[tokio::test]
    async fn test_confirm_job_trims_oldest() {
        let max = 20;
        let h = Harness::build(
            vec![CategoryDefinition::new("games").with_strategy(Strategy::trust_local())],
            FakeIntel::new(),
            ExaminerConfig::default().with_max_set_size(max),
        );
        let keys = h.keys("games");
        for i in 0..(max + 4) {
            h.store
                .add_hit(&keys, &format!("d{:02}.com", i), 1_000 + i as i64)
                .unwrap();
        }
        h.local.add_match("www.new.com", "games", "*.new.com");

        h.examiner.detect_domain("www.new.com").await;
        h.examiner.confirm_job().await;

        let hits = h.hits("games");
        assert_eq!(hits.len(), max);
        for i in 0..5 {
            assert!(!hits.contains(&format!("d{:02}.com", i)));
        }
        assert!(hits.contains(&"*.new.com".to_string()));
    }

    #[tokio::test]
    async fn test_refresh_moves_excluded_hits() {
        let mut h = Harness::new(vec![porn().with_excluded("*.example.com")]);
        h.store.add_hit(&h.keys("porn"), "*.example.com", 1).unwrap();

        let report = h
            .examiner
            .refresh_category_filter("porn")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.excluded, 1);
        assert!(report.changed);
        assert!(h.hits("porn").is_empty());
        assert_eq!(h.passthroughs("porn"), vec!["*.example.com"]);
        assert_eq!(h.notified(), vec!["porn"]);
        assert!(h.local.calls().is_empty());
    }

    #[tokio::test]
    async fn test_refresh_drops_unmatched_members() {
        let h = Harness::new(vec![porn()]);
        let keys = h.keys("porn");
        h.store.add_hit(&keys, "*.gone.com", 1).unwrap();
        h.store.add_passthrough(&keys, "www.gone.org", 1).unwrap();

        let report = h
            .examiner
            .refresh_category_filter("porn")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.unmatched, 2);
        assert!(h.hits("porn").is_empty());
        assert!(h.passthroughs("porn").is_empty());
        assert_eq!(
            h.local.calls()[0].1,
            vec!["category:porn".to_string()]
        );
    }

    #[tokio::test]
    async fn test_refresh_reconciles_with_source() {
        let h = Harness::new(vec![porn()]);
        let keys = h.keys("porn");
        for (domain, hit) in [
            ("*.kept.com", true),
            ("*.stale.com", true),
            ("www.now-listed.com", false),
            ("www.still-clean.com", false),
        ] {
            h.local.add_match(domain, "porn", domain);
            if hit {
                h.store.add_hit(&keys, domain, 1).unwrap();
            } else {
                h.store.add_passthrough(&keys, domain, 1).unwrap();
            }
        }
        h.cloud.add_member("app.porn", "*.kept.com");
        h.cloud.add_member("app.porn", "www.now-listed.com");

        let report = h
            .examiner
            .refresh_category_filter("porn")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.escalated, 4);
        assert_eq!(report.removed_hits, 1);
        assert_eq!(report.removed_passthrough, 1);
        assert_eq!(h.hits("porn"), vec!["*.kept.com"]);
        assert_eq!(h.passthroughs("porn"), vec!["www.still-clean.com"]);
    }

    #[tokio::test]
    async fn test_refresh_aborts_on_source_failure() {
        let mut h = Harness::new(vec![porn().with_excluded("*.example.com")]);
        let keys = h.keys("porn");
        h.store.add_hit(&keys, "*.example.com", 1).unwrap();
        h.store.add_hit(&keys, "*.listed.com", 1).unwrap();
        h.store.add_hit(&keys, "*.gone.com", 1).unwrap();
        h.local.add_match("*.listed.com", "porn", "*.listed.com");
        h.cloud.set_failing(true);

        assert!(h.examiner.refresh_category_filter("porn").await.is_err());

        assert_eq!(h.hits("porn"), vec!["*.gone.com", "*.listed.com"]);
        assert_eq!(h.passthroughs("porn"), vec!["*.example.com"]);
        assert_eq!(h.notified(), vec!["porn"]);
    }

    #[tokio::test]
    async fn test_refresh_failure_without_exclusions_changes_nothing() {
        let mut h = Harness::new(vec![porn()]);
        let keys = h.keys("porn");
        h.store.add_hit(&keys, "*.listed.com", 1).unwrap();
        h.store.add_hit(&keys, "*.gone.com", 1).unwrap();
        h.local.add_match("*.listed.com", "porn", "*.listed.com");
        h.cloud.set_failing(true);

        assert!(h.examiner.refresh_category_filter("porn").await.is_err());

        assert_eq!(h.hits("porn").len(), 2);
        assert!(h.passthroughs("porn").is_empty());
        assert!(h.notified().is_empty());
    }

    #[tokio::test]
    async fn test_recent_hits_counts_active_categories_in_window() {
        let h = Harness::new(vec![porn(), CategoryDefinition::new("games").with_active(false)]);
        let now = now_score();
        h.store.add_hit(&h.keys("porn"), "*.new.com", now).unwrap();
        h.store.add_hit(&h.keys("porn"), "*.old.com", now - 3_600_000).unwrap();
        h.store.add_passthrough(&h.keys("porn"), "www.ok.com", now).unwrap();
        h.store.add_hit(&h.keys("games"), "*.steam.com", now).unwrap();

        assert_eq!(h.examiner.recent_hits(Duration::from_secs(60)).unwrap(), 1);
        assert_eq!(h.examiner.recent_hits(Duration::from_secs(7200)).unwrap(), 2);
    }

    #[tokio::test]
    async fn test_refresh_escalates_on_local_filter_error() {
        let h = Harness::new(vec![porn()]);
        h.store.add_hit(&h.keys("porn"), "*.kept.com", 1).unwrap();
        h.cloud.add_member("app.porn", "*.kept.com");
        h.local.set_failing(true);

        let report = h
            .examiner
            .refresh_category_filter("porn")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.escalated, 1);
        assert!(!report.changed);
        assert_eq!(h.hits("porn"), vec!["*.kept.com"]);
    }

    #[tokio::test]
    async fn test_refresh_of_empty_category() {
        let mut h = Harness::new(vec![porn()]);

        let report = h
            .examiner
            .refresh_category_filter("porn")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(report.checked, 0);
        assert!(h.notified().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_waits_for_settle_delay_and_honors_shutdown() {
        let h = Harness::new(vec![porn()]);
        let store = h.store.clone();
        let config = ExaminerConfig::default();
        let token = CancellationToken::new();

        let examiner = Arc::new(
            CategoryExaminer::new(
                config,
                store,
                h.manager.clone(),
                h.local.clone(),
                Confirmer::new(
                    h.cloud.clone(),
                    Arc::new(FakeIntel::new()),
                    FileListSource::new(h.dir.path(), Duration::from_secs(1)),
                ),
                Notifier::default(),
            )
            .with_shutdown(token.clone()),
        );

        let task = {
            let examiner = examiner.clone();
            tokio::spawn(async move { examiner.refresh_category_filter("porn").await })
        };

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(!task.is_finished());

        token.cancel();
        assert_eq!(task.await.unwrap().unwrap(), None);
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_serialize() {
        let h = Harness::new(vec![porn()]);
        let keys = h.keys("porn");
        h.store.add_hit(&keys, "*.kept.com", 1).unwrap();
        h.local.add_match("*.kept.com", "porn", "*.kept.com");
        h.cloud.add_member("app.porn", "*.kept.com");

        let (a, b) = tokio::join!(
            h.examiner.refresh_category_filter("porn"),
            h.examiner.refresh_category_filter("porn")
        );

        assert!(a.unwrap().is_some());
        assert!(b.unwrap().is_some());
        assert_eq!(h.hits("porn"), vec!["*.kept.com"]);
    }

    #[tokio::test]
    async fn test_deactivation_clears_sets() {
        let mut h = Harness::new(vec![porn()]);
        let keys = h.keys("porn");
        h.store.add_hit(&keys, "*.a.com", 1).unwrap();
        h.store.add_passthrough(&keys, "b.com", 1).unwrap();

        let handle = h
            .examiner
            .handle_event(ExaminerEvent::CategoryDeactivated {
                category: "porn".to_string(),
            })
            .await;

        assert!(handle.is_none());
        assert!(h.hits("porn").is_empty());
        assert!(h.passthroughs("porn").is_empty());
        assert_eq!(h.notified(), vec!["porn"]);
        assert!(!h.examiner.deactivate_category("porn").unwrap());
    }

    #[tokio::test]
    async fn test_detection_event_is_normalized() {
        let h = Harness::new(vec![porn()]);
        h.local.add_match("www.onlyfans.com", "porn", "*.onlyfans.com");

        h.examiner
            .handle_event(ExaminerEvent::DomainDetected {
                domain: " WWW.OnlyFans.com. ".to_string(),
            })
            .await;

        assert_eq!(h.local.calls()[0].0, "www.onlyfans.com");
        assert_eq!(h.examiner.queue().len(), 1);
    }

    #[tokio::test]
    async fn test_filter_update_event_spawns_refresh() {
        let h = Harness::new(vec![porn()]);
        h.store.add_hit(&h.keys("porn"), "*.gone.com", 1).unwrap();

        let handle = h
            .examiner
            .handle_event(ExaminerEvent::FilterGenerationUpdated {
                category: "porn".to_string(),
            })
            .await
            .unwrap();
        handle.await.unwrap();

        assert!(h.hits("porn").is_empty());
    }
}
