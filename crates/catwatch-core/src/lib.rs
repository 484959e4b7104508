//! Catwatch Core - domain matching and category classification primitives.
//!
//! This crate holds the synchronous building blocks shared by the pipeline:
//!
//! - [`matcher`]: wildcard domain pattern matching
//! - [`category`]: category definitions, strategies and store keys
//! - [`candidate`]: confirmation candidates and their composite keys
//! - [`exclusion`]: per-category exclusion lists
//! - [`memo`]: the short-lived detection dedup memo
//! - [`hashing`]: domain digests used by the cloud membership check
//! - [`events`]: consumed and emitted event payloads

pub mod candidate;
pub mod category;
pub mod events;
pub mod exclusion;
pub mod hashing;
pub mod matcher;
pub mod memo;

pub use candidate::ConfirmationCandidate;
pub use category::{CategoryDefinition, ConfirmStyle, Strategy};
pub use events::{ExaminerEvent, HitSetUpdated, MatchMessage};
pub use exclusion::ExclusionList;
pub use memo::DetectionMemo;

/// Maximum number of entries kept in each hit or passthrough set.
pub const MAX_SET_SIZE: usize = 20_000;
