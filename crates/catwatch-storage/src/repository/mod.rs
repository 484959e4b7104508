//! Database repositories for each table.

pub mod settings;
pub mod sorted_set;

pub use settings::SettingsRepo;
pub use sorted_set::SortedSetRepo;
