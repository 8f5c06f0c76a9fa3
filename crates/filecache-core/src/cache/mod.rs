//! Cache management module

mod diagnostics;
mod list;
mod manager;
mod stats;

pub use diagnostics::{Snapshot, SnapshotEntry};
pub use manager::{CacheConfig, FileCache};
pub use stats::CacheStats;
