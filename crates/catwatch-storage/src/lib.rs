//! Catwatch Storage - SQLite persistence layer.
//!
//! Provides the durable sorted-set store behind classification state:
//!
//! - Scored sets keyed by string (add, remove, score lookup, rank trimming)
//! - Per-category hit/passthrough pairs with mutual exclusion
//! - Runtime settings (feature switches)
//!
//! # Example
//!
//! ```no_run
//! use catwatch_storage::{ClassificationStore, Database, SetKeys};
//!
//! let store = ClassificationStore::new(Database::in_memory().unwrap());
//! let keys = SetKeys::for_category("porn");
//!
//! store.add_hit(&keys, "*.onlyfans.com", 1).unwrap();
//! assert!(store.in_hit_set(&keys, "*.onlyfans.com").unwrap());
//! ```

pub mod classification;
mod database;
pub mod error;
pub mod models;
mod pool;
pub mod repository;
mod schema;

pub use classification::{now_score, ClassificationStore, SetKeys};
pub use database::Database;
pub use error::{Result, StorageError};
pub use models::{SetEntry, Setting};
pub use pool::ConnectionPool;
