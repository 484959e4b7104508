//! Examiner configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use catwatch_core::memo::{DEFAULT_MEMO_CAPACITY, DEFAULT_MEMO_TTL};
use catwatch_core::{CategoryDefinition, MAX_SET_SIZE};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{ExaminerError, Result};

/// Default local bloom-filter service endpoint.
pub const DEFAULT_LOCAL_FILTER_URL: &str = "http://127.0.0.1:9964";

/// Default cloud classification service endpoint.
pub const DEFAULT_CLOUD_URL: &str = "https://intel.catwatch.io/v2";

/// Default directory holding downloaded raw category lists.
pub const DEFAULT_LIST_DIR: &str = "/var/lib/catwatch/category";

/// Confirmation drain interval in milliseconds.
pub const DEFAULT_CONFIRM_INTERVAL_MS: u64 = 2_000;

/// Delay before a triggered refresh starts, in milliseconds.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 3_000;

/// Local hour of the nightly refresh.
pub const DEFAULT_REFRESH_HOUR: u32 = 3;

/// Upper bound of the random delay added to the nightly refresh, in seconds.
pub const DEFAULT_REFRESH_JITTER_SECS: u64 = 2 * 60 * 60;

/// Timeout for every external call, in milliseconds.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 5_000;

/// Failed confirmation attempts after which a candidate is dropped.
pub const DEFAULT_MAX_CONFIRM_ATTEMPTS: u32 = 3;

/// Configuration of the classification pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExaminerConfig {
    /// Whether the category filter feature starts enabled.
    pub enabled: bool,
    /// Base URL of the local bloom-filter service.
    pub local_filter_url: String,
    /// Base URL of the cloud classification service.
    pub cloud_url: String,
    /// Bearer token for the cloud service.
    pub cloud_token: Option<String>,
    /// Directory of `<category>.lst` raw lists.
    pub list_dir: PathBuf,
    /// URL hit-set notifications are forwarded to.
    pub notify_url: Option<String>,
    /// Timeout for every external call, in milliseconds.
    pub request_timeout_ms: u64,
    /// Confirmation drain interval, in milliseconds.
    pub confirm_interval_ms: u64,
    /// Delay before a triggered refresh starts, in milliseconds.
    pub settle_delay_ms: u64,
    /// Local hour (0-23) of the nightly refresh.
    pub refresh_hour: u32,
    /// Upper bound of the nightly refresh jitter, in seconds.
    pub refresh_jitter_secs: u64,
    /// Cap of each hit and passthrough set.
    pub max_set_size: usize,
    /// Failed confirmation attempts after which a candidate is dropped.
    pub max_confirm_attempts: u32,
    /// Number of domains remembered by the detection memo.
    pub memo_capacity: usize,
    /// Seconds a detection is remembered.
    pub memo_ttl_secs: u64,
    /// Configured categories.
    pub categories: Vec<CategoryDefinition>,
}

impl Default for ExaminerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            local_filter_url: DEFAULT_LOCAL_FILTER_URL.to_string(),
            cloud_url: DEFAULT_CLOUD_URL.to_string(),
            cloud_token: None,
            list_dir: PathBuf::from(DEFAULT_LIST_DIR),
            notify_url: None,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            confirm_interval_ms: DEFAULT_CONFIRM_INTERVAL_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            refresh_hour: DEFAULT_REFRESH_HOUR,
            refresh_jitter_secs: DEFAULT_REFRESH_JITTER_SECS,
            max_set_size: MAX_SET_SIZE,
            max_confirm_attempts: DEFAULT_MAX_CONFIRM_ATTEMPTS,
            memo_capacity: DEFAULT_MEMO_CAPACITY,
            memo_ttl_secs: DEFAULT_MEMO_TTL.as_secs(),
            categories: Vec::new(),
        }
    }
}

impl ExaminerConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&raw)?;
        config.validate()?;

        info!(
            "Loaded examiner config from {:?} ({} categories)",
            path,
            config.categories.len()
        );
        Ok(config)
    }

    /// Checks value ranges.
    pub fn validate(&self) -> Result<()> {
        if self.refresh_hour > 23 {
            return Err(ExaminerError::Config(format!(
                "refresh_hour must be 0-23, got {}",
                self.refresh_hour
            )));
        }
        if self.max_set_size == 0 {
            return Err(ExaminerError::Config("max_set_size must be positive".into()));
        }
        if self.confirm_interval_ms == 0 {
            return Err(ExaminerError::Config(
                "confirm_interval_ms must be positive".into(),
            ));
        }
        for category in &self.categories {
            if category.id.is_empty() || category.id.contains(['/', '\\', ':']) {
                return Err(ExaminerError::Config(format!(
                    "invalid category id: {:?}",
                    category.id
                )));
            }
        }
        Ok(())
    }

    /// Sets the local filter URL.
    pub fn with_local_filter_url(mut self, url: impl Into<String>) -> Self {
        self.local_filter_url = url.into();
        self
    }

    /// Sets the cloud URL.
    pub fn with_cloud_url(mut self, url: impl Into<String>) -> Self {
        self.cloud_url = url.into();
        self
    }

    /// Sets the raw list directory.
    pub fn with_list_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.list_dir = dir.into();
        self
    }

    /// Sets the notification forward URL.
    pub fn with_notify_url(mut self, url: impl Into<String>) -> Self {
        self.notify_url = Some(url.into());
        self
    }

    /// Sets the initial feature switch.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the refresh settle delay.
    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay_ms = delay.as_millis() as u64;
        self
    }

    /// Sets the set cap.
    pub fn with_max_set_size(mut self, max: usize) -> Self {
        self.max_set_size = max;
        self
    }

    /// Adds a category.
    pub fn with_category(mut self, category: CategoryDefinition) -> Self {
        self.categories.push(category);
        self
    }

    /// Timeout for external calls.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Confirmation drain interval.
    pub fn confirm_interval(&self) -> Duration {
        Duration::from_millis(self.confirm_interval_ms)
    }

    /// Refresh settle delay.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    /// Upper bound of the nightly jitter.
    pub fn refresh_jitter(&self) -> Duration {
        Duration::from_secs(self.refresh_jitter_secs)
    }

    /// Detection memo time-to-live.
    pub fn memo_ttl(&self) -> Duration {
        Duration::from_secs(self.memo_ttl_secs)
    }
}
