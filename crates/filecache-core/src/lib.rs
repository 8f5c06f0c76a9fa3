//! File Cache Core
//!
//! This crate provides the size-bounded, least-recently-used cache of whole
//! file contents, along with its statistics and diagnostics.

pub mod cache;
pub mod error;

pub use cache::{CacheConfig, CacheStats, FileCache, Snapshot, SnapshotEntry};
pub use error::CoreError;
