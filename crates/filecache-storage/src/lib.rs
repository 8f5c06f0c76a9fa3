//! File Cache Storage Layer
//!
//! This crate provides the byte-storage abstraction the file cache reads
//! through on a miss, with a local disk backend and an in-memory backend.

pub mod backend;
pub mod error;
pub mod local;
pub mod memory;
pub mod utils;

pub use backend::StorageBackend;
pub use error::StorageError;
pub use local::LocalStorage;
pub use memory::MemoryStorage;
pub use utils::format_bytes;
