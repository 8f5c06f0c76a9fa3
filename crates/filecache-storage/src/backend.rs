//! Storage backend trait

use bytes::Bytes;

use crate::error::StorageError;

/// Storage backend trait
///
/// Implementations resolve a file name to its full byte content. Callers are
/// plain threads, so every method blocks until the backend answers.
pub trait StorageBackend: Send + Sync {
    /// Check if a file exists
    fn exists(&self, name: &str) -> Result<bool, StorageError>;

    /// Get the size of a file in bytes
    fn size(&self, name: &str) -> Result<u64, StorageError>;

    /// Read a file fully into memory
    ///
    /// Opening, sizing and reading fail independently, each with its own
    /// [`StorageError`] variant.
    fn read(&self, name: &str) -> Result<Bytes, StorageError>;

    /// Human readable location of this backend, for logs
    fn describe(&self) -> String;
}

/// Reject names no backend can resolve
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    if name.is_empty() || name.contains('\0') {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
