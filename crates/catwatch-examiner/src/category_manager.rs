//! Category lifecycle manager seam.
//!
//! The examiner never decides on its own which categories exist or how they
//! are confirmed; it asks a [`CategoryManager`]. [`StaticCategoryManager`] is
//! the configuration-driven implementation used by the binary.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use catwatch_core::category::{category_base, dynamic_domain_key, hit_set_key, passthrough_set_key};
use catwatch_core::{CategoryDefinition, ConfirmStyle, Strategy};
use catwatch_storage::{now_score, ClassificationStore, SetKeys};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::Result;

/// Source of category strategies, keys and exclusions.
#[async_trait]
pub trait CategoryManager: Send + Sync {
    /// Confirmation strategy of a category.
    async fn strategy(&self, category: &str) -> Strategy;

    /// Confirmation style of a category.
    async fn style(&self, category: &str) -> ConfirmStyle;

    /// Store key of the hit set.
    fn hit_key(&self, category: &str) -> String {
        hit_set_key(category)
    }

    /// Store key of the passthrough set.
    fn passthrough_key(&self, category: &str) -> String {
        passthrough_set_key(category)
    }

    /// Both store keys.
    fn set_keys(&self, category: &str) -> SetKeys {
        SetKeys::new(self.hit_key(category), self.passthrough_key(category))
    }

    /// Ids of all active categories.
    fn active_categories(&self) -> Vec<String>;

    /// Returns true if the category is active.
    fn is_activated(&self, category: &str) -> bool;

    /// Domains and patterns never classified as a hit for the category.
    async fn excluded_domains(&self, category: &str) -> Vec<String>;

    /// Feeds a confirmed pattern back into the category's enforcement data.
    async fn update_domain(&self, category: &str, pattern: &str, is_wildcard: bool) -> Result<()>;
}

/// Category manager built from configured definitions.
pub struct StaticCategoryManager {
    categories: RwLock<HashMap<String, CategoryDefinition>>,
    store: ClassificationStore,
}

impl StaticCategoryManager {
    /// Creates a manager over the given definitions.
    pub fn new(store: ClassificationStore, definitions: impl IntoIterator<Item = CategoryDefinition>) -> Self {
        let categories = definitions
            .into_iter()
            .map(|def| (def.id.clone(), def))
            .collect();

        Self {
            categories: RwLock::new(categories),
            store,
        }
    }

    /// Adds or replaces a definition.
    pub fn upsert(&self, definition: CategoryDefinition) {
        info!("Category {} configured", definition.id);
        self.categories.write().insert(definition.id.clone(), definition);
    }

    /// Definition of a category.
    pub fn definition(&self, category: &str) -> Option<CategoryDefinition> {
        self.categories.read().get(category).cloned()
    }

    /// Sets a category's activation. Returns false for unknown categories.
    pub fn set_active(&self, category: &str, active: bool) -> bool {
        match self.categories.write().get_mut(category) {
            Some(def) => {
                def.active = active;
                true
            }
            None => false,
        }
    }

    /// Adds an exclusion. Returns false if unknown or already present.
    pub fn add_exclusion(&self, category: &str, domain: &str) -> bool {
        let mut categories = self.categories.write();
        let Some(def) = categories.get_mut(category) else {
            return false;
        };
        if def.excluded_domains.iter().any(|d| d == domain) {
            return false;
        }
        def.excluded_domains.push(domain.to_string());
        true
    }

    /// Removes an exclusion. Returns true if it was present.
    pub fn remove_exclusion(&self, category: &str, domain: &str) -> bool {
        let mut categories = self.categories.write();
        let Some(def) = categories.get_mut(category) else {
            return false;
        };
        let before = def.excluded_domains.len();
        def.excluded_domains.retain(|d| d != domain);
        def.excluded_domains.len() != before
    }

    /// Patterns fed back through [`CategoryManager::update_domain`], oldest first.
    pub fn dynamic_domains(&self, category: &str) -> Result<Vec<String>> {
        Ok(self.store.database().zrange_all(&dynamic_domain_key(category))?)
    }
}

#[async_trait]
impl CategoryManager for StaticCategoryManager {
    async fn strategy(&self, category: &str) -> Strategy {
        self.categories
            .read()
            .get(category)
            .map(|def| def.strategy)
            .unwrap_or_else(Strategy::ignore)
    }

    async fn style(&self, category: &str) -> ConfirmStyle {
        self.categories
            .read()
            .get(category)
            .map(|def| def.style.clone())
            .unwrap_or_default()
    }

    fn active_categories(&self) -> Vec<String> {
        let mut active: Vec<String> = self
            .categories
            .read()
            .values()
            .filter(|def| def.active)
            .map(|def| def.id.clone())
            .collect();
        active.sort();
        active
    }

    fn is_activated(&self, category: &str) -> bool {
        self.categories
            .read()
            .get(category)
            .is_some_and(|def| def.active)
    }

    async fn excluded_domains(&self, category: &str) -> Vec<String> {
        let categories = self.categories.read();
        let base = category_base(category);

        let mut excluded = BTreeSet::new();
        for id in [category, base] {
            if let Some(def) = categories.get(id) {
                excluded.extend(def.excluded_domains.iter().cloned());
            }
        }
        excluded.into_iter().collect()
    }

    async fn update_domain(&self, category: &str, pattern: &str, is_wildcard: bool) -> Result<()> {
        let added = self
            .store
            .database()
            .zadd(&dynamic_domain_key(category), now_score(), pattern)?;
        if added {
            debug!(category, pattern, is_wildcard, "Dynamic category domain added");
        }
        Ok(())
    }
}
