//! Category definitions and confirmation strategies.

use serde::{Deserialize, Serialize};

/// Prefix of filter uids reported by the local filter service.
pub const FILTER_UID_PREFIX: &str = "category:";

/// Prefix of the cloud hash-set id for mirrored categories.
pub const DEFAULT_HASH_SET_PREFIX: &str = "app.";

/// Suffix of categories backed by a bloom filter of another category's list.
pub const BLOOM_FILTER_SUFFIX: &str = "_bf";

/// Governs whether detections for a category are persisted and which
/// confirmation source is authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Persist confirmed/refuted detections into the hit and passthrough sets.
    pub update_confirm_set: bool,
    /// Confirm against the cloud service.
    pub check_cloud: bool,
    /// Confirm against the downloaded raw list file.
    pub check_file: bool,
}

impl Default for Strategy {
    fn default() -> Self {
        Self::cloud()
    }
}

impl Strategy {
    /// Cloud-confirmed category.
    pub fn cloud() -> Self {
        Self {
            update_confirm_set: true,
            check_cloud: true,
            check_file: false,
        }
    }

    /// File-confirmed category.
    pub fn file() -> Self {
        Self {
            update_confirm_set: true,
            check_cloud: false,
            check_file: true,
        }
    }

    /// Every local match is trusted as-is.
    pub fn trust_local() -> Self {
        Self {
            update_confirm_set: true,
            check_cloud: false,
            check_file: false,
        }
    }

    /// Detections are ignored for this category.
    pub fn ignore() -> Self {
        Self {
            update_confirm_set: false,
            check_cloud: false,
            check_file: false,
        }
    }

    /// Returns true if some remote or file source must confirm a match.
    pub fn needs_confirmation(&self) -> bool {
        self.check_cloud || self.check_file
    }
}

/// How a cloud-checked category is confirmed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConfirmStyle {
    /// The local filter is a compressed copy of a cloud canonical list.
    /// Matched patterns are checked against the list's hash set.
    Mirrored {
        /// Cloud hash-set id (`app.<category>` when absent).
        #[serde(default)]
        hash_set_id: Option<String>,
    },
    /// Assembled from several upstream lists. Origin domains are checked with
    /// the general-purpose intel lookup.
    Curated {
        /// Intel category names that also count as this category.
        #[serde(default)]
        aliases: Vec<String>,
    },
}

impl Default for ConfirmStyle {
    fn default() -> Self {
        ConfirmStyle::Mirrored { hash_set_id: None }
    }
}

impl ConfirmStyle {
    /// Returns true for mirrored categories.
    pub fn is_mirrored(&self) -> bool {
        matches!(self, ConfirmStyle::Mirrored { .. })
    }

    /// Cloud hash-set id used to confirm `category`.
    pub fn hash_set_id(&self, category: &str) -> String {
        match self {
            ConfirmStyle::Mirrored {
                hash_set_id: Some(id),
            } => id.clone(),
            _ => format!("{}{}", DEFAULT_HASH_SET_PREFIX, category),
        }
    }
}

/// A category as configured by the lifecycle manager.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryDefinition {
    /// Category id (`porn`, `games`, `adblock_strict`, ...).
    pub id: String,
    /// Confirmation strategy.
    #[serde(default)]
    pub strategy: Strategy,
    /// Confirmation style used when `strategy.check_cloud` is set.
    #[serde(default)]
    pub style: ConfirmStyle,
    /// Domains or patterns never classified as a hit.
    #[serde(default)]
    pub excluded_domains: Vec<String>,
    /// Whether the category is active.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl CategoryDefinition {
    /// Creates an active, cloud-confirmed, mirrored category.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            strategy: Strategy::default(),
            style: ConfirmStyle::default(),
            excluded_domains: Vec::new(),
            active: true,
        }
    }

    /// Sets the strategy.
    pub fn with_strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Sets the confirmation style.
    pub fn with_style(mut self, style: ConfirmStyle) -> Self {
        self.style = style;
        self
    }

    /// Adds an excluded domain or pattern.
    pub fn with_excluded(mut self, domain: impl Into<String>) -> Self {
        self.excluded_domains.push(domain.into());
        self
    }

    /// Sets whether the category is active.
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Cloud hash-set id for mirrored categories.
    pub fn hash_set_id(&self) -> String {
        self.style.hash_set_id(&self.id)
    }
}

/// Builds the local filter uid for a category.
pub fn filter_uid(category: &str) -> String {
    format!("{}{}", FILTER_UID_PREFIX, category)
}

/// Extracts the category id from a local filter uid.
pub fn category_from_uid(uid: &str) -> Option<&str> {
    uid.strip_prefix(FILTER_UID_PREFIX)
        .filter(|category| !category.is_empty())
}

/// Base category of a bloom-filter variant (`porn_bf` -> `porn`).
pub fn category_base(category: &str) -> &str {
    category
        .strip_suffix(BLOOM_FILTER_SUFFIX)
        .filter(|base| !base.is_empty())
        .unwrap_or(category)
}

/// Store key of a category's hit set.
pub fn hit_set_key(category: &str) -> String {
    format!("category:{}:hit:domain", category)
}

/// Store key of a category's passthrough set.
pub fn passthrough_set_key(category: &str) -> String {
    format!("category:{}:passthrough:domain", category)
}

/// Store key of the domains fed back into a category's enforcement data.
pub fn dynamic_domain_key(category: &str) -> String {
    format!("dynamicCategoryDomain:{}", category)
}
