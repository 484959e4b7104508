//! Dispatch of confirmations to the authoritative source of a category.

use std::collections::HashSet;
use std::sync::Arc;

use catwatch_core::category::category_base;
use catwatch_core::matcher::base_domain;
use catwatch_core::{ConfirmStyle, ConfirmationCandidate, Strategy};
use tracing::{debug, warn};

use crate::clients::{confirm_by_hash, resolve_intel, FileListSource, IntelLookup, TargetSetMembership};
use crate::error::Result;

/// Authoritative source confirming a category's local matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmSource {
    /// Raw list file, keyed by origin domain.
    File,
    /// Cloud hash set, keyed by matched pattern.
    Cloud,
    /// Intel lookup, keyed by origin domain.
    Intel,
    /// No source; every local match is trusted.
    Trusted,
}

impl ConfirmSource {
    /// Selects the source for a category. The raw list wins over the cloud.
    pub fn select(strategy: &Strategy, style: &ConfirmStyle) -> Self {
        if strategy.check_file {
            ConfirmSource::File
        } else if strategy.check_cloud && style.is_mirrored() {
            ConfirmSource::Cloud
        } else if strategy.check_cloud {
            ConfirmSource::Intel
        } else {
            ConfirmSource::Trusted
        }
    }

    /// The part of a candidate this source confirms.
    pub fn key_of<'a>(&self, candidate: &'a ConfirmationCandidate) -> &'a str {
        match self {
            ConfirmSource::Cloud | ConfirmSource::Trusted => &candidate.matched_pattern,
            ConfirmSource::File | ConfirmSource::Intel => &candidate.origin_domain,
        }
    }

    /// Returns true if confirmed patterns are fed back into enforcement data.
    pub fn feeds_enforcement(&self) -> bool {
        matches!(self, ConfirmSource::Cloud | ConfirmSource::Intel)
    }
}

/// Result of confirming a batch of keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Confirmation {
    /// Keys the source confirmed.
    pub confirmed: HashSet<String>,
    /// Keys the source could not answer for; neither confirmed nor refuted.
    pub failed: HashSet<String>,
}

impl Confirmation {
    /// Every key confirmed.
    pub fn all(keys: &[String]) -> Self {
        Self {
            confirmed: keys.iter().cloned().collect(),
            failed: HashSet::new(),
        }
    }
}

/// Routes confirmations to the cloud, intel or file source.
#[derive(Clone)]
pub struct Confirmer {
    cloud: Arc<dyn TargetSetMembership>,
    intel: Arc<dyn IntelLookup>,
    files: FileListSource,
}

impl Confirmer {
    /// Creates a confirmer over the given sources.
    pub fn new(
        cloud: Arc<dyn TargetSetMembership>,
        intel: Arc<dyn IntelLookup>,
        files: FileListSource,
    ) -> Self {
        Self { cloud, intel, files }
    }

    /// Confirms `keys` for `category`.
    ///
    /// An error means the whole batch failed and nothing may be concluded.
    /// Keys the intel source failed on individually are reported in
    /// [`Confirmation::failed`].
    pub async fn confirm(
        &self,
        category: &str,
        source: ConfirmSource,
        style: &ConfirmStyle,
        keys: &[String],
    ) -> Result<Confirmation> {
        if keys.is_empty() {
            return Ok(Confirmation::default());
        }

        match source {
            ConfirmSource::Trusted => Ok(Confirmation::all(keys)),
            ConfirmSource::File => Ok(Confirmation {
                confirmed: self.files.confirm(category, keys).await?,
                failed: HashSet::new(),
            }),
            ConfirmSource::Cloud => {
                let hash_set_id = style.hash_set_id(category);
                Ok(Confirmation {
                    confirmed: confirm_by_hash(self.cloud.as_ref(), &hash_set_id, keys).await?,
                    failed: HashSet::new(),
                })
            }
            ConfirmSource::Intel => Ok(self.confirm_by_intel(category, style, keys).await),
        }
    }

    async fn confirm_by_intel(&self, category: &str, style: &ConfirmStyle, keys: &[String]) -> Confirmation {
        let mut accepted = vec![category.to_string(), category_base(category).to_string()];
        if let ConfirmStyle::Curated { aliases } = style {
            accepted.extend(aliases.iter().cloned());
        }

        let mut confirmation = Confirmation::default();
        for key in keys {
            match self.intel.lookup(base_domain(key)).await {
                Ok(records) => {
                    if resolve_intel(&records, key, &accepted) {
                        confirmation.confirmed.insert(key.clone());
                    }
                }
                Err(e) => {
                    warn!("Intel lookup of {} for category {} failed: {}", key, category, e);
                    confirmation.failed.insert(key.clone());
                }
            }
        }

        debug!(
            "Intel confirmed {}/{} domains for {}",
            confirmation.confirmed.len(),
            keys.len(),
            category
        );
        confirmation
    }
}
