//! Catwatch Examiner - detection, confirmation and refresh of category sets.
//!
//! Wires the local bloom-filter service, the cloud confirmation sources and
//! the classification store into a pipeline:
//!
//! - [`CategoryExaminer`]: detection fast path, confirmation drain, refresh
//! - [`ExaminerService`]: the background loops driving it
//! - [`CategoryManager`]: where strategies, keys and exclusions come from
//! - [`clients`]: HTTP clients of the local and cloud services

pub mod category_manager;
pub mod clients;
pub mod config;
pub mod confirm;
pub mod error;
pub mod examiner;
pub mod notifier;
pub mod queue;
pub mod scheduler;

#[cfg(test)]
mod testing;

pub use category_manager::{CategoryManager, StaticCategoryManager};
pub use config::ExaminerConfig;
pub use confirm::{ConfirmSource, Confirmer};
pub use error::{ExaminerError, Result};
pub use examiner::{CategoryExaminer, ConfirmReport, RefreshReport, FEATURE_KEY};
pub use notifier::Notifier;
pub use queue::ConfirmQueue;
pub use scheduler::{
    next_nightly_run, ExaminerService, EVENT_CHANNEL_CAPACITY, MAX_CONCURRENT_DETECTIONS,
};
