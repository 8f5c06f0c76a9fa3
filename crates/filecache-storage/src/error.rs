//! Storage error types

use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Cannot open file: {name}: {source}")]
    Open {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot get file info: {name}: {source}")]
    Stat {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Cannot read file: {name}: {source}")]
    Read {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Invalid file name: {0:?}")]
    InvalidName(String),
}

impl StorageError {
    /// The file name the failed operation was addressed to
    pub fn name(&self) -> &str {
        match self {
            StorageError::Open { name, .. }
            | StorageError::Stat { name, .. }
            | StorageError::Read { name, .. } => name,
            StorageError::InvalidName(name) => name,
        }
    }

    /// Whether the underlying cause is a missing file
    pub fn is_not_found(&self) -> bool {
        match self {
            StorageError::Open { source, .. }
            | StorageError::Stat { source, .. }
            | StorageError::Read { source, .. } => source.kind() == io::ErrorKind::NotFound,
            StorageError::InvalidName(_) => false,
        }
    }
}
