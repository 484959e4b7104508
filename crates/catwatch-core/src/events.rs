//! Events consumed and emitted by the classification pipeline.

use serde::{Deserialize, Serialize};

/// Events the examiner reacts to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ExaminerEvent {
    /// The traffic layer resolved a domain for an observed flow.
    #[serde(rename = "DOMAIN_DETECTED")]
    DomainDetected { domain: String },
    /// A category's local filter generation changed.
    #[serde(rename = "FILTER_GENERATION_UPDATED")]
    FilterGenerationUpdated { category: String },
    /// A category was deactivated by the lifecycle manager.
    #[serde(rename = "CATEGORY_DEACTIVATED")]
    CategoryDeactivated { category: String },
}

impl ExaminerEvent {
    /// Returns the event type name.
    pub fn kind(&self) -> &'static str {
        match self {
            ExaminerEvent::DomainDetected { .. } => "DOMAIN_DETECTED",
            ExaminerEvent::FilterGenerationUpdated { .. } => "FILTER_GENERATION_UPDATED",
            ExaminerEvent::CategoryDeactivated { .. } => "CATEGORY_DEACTIVATED",
        }
    }
}

/// Untagged `{ domain }` message published by the separate local matching
/// process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchMessage {
    pub domain: String,
}

impl From<MatchMessage> for ExaminerEvent {
    fn from(msg: MatchMessage) -> Self {
        ExaminerEvent::DomainDetected { domain: msg.domain }
    }
}

/// Broadcast whenever a category's hit or passthrough set changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename = "UPDATE_CATEGORY_HITSET")]
pub struct HitSetUpdated {
    pub category: String,
}

impl HitSetUpdated {
    /// Creates a new update notification.
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
        }
    }
}
