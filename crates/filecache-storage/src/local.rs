//! Local disk storage backend

use bytes::Bytes;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::backend::{validate_name, StorageBackend};
use crate::error::StorageError;

/// Local disk storage backend
///
/// Names are resolved with `root.join(name)`, so an absolute name bypasses
/// the root directory.
pub struct LocalStorage {
    root: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend rooted at an existing directory
    pub fn new(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        let display = root.to_string_lossy().to_string();

        let metadata = fs::metadata(&root).map_err(|e| StorageError::Stat {
            name: display.clone(),
            source: e,
        })?;
        if !metadata.is_dir() {
            return Err(StorageError::Open {
                name: display,
                source: io::Error::new(io::ErrorKind::InvalidInput, "not a directory"),
            });
        }

        info!("Initialized local storage at {:?}", root);
        Ok(Self { root })
    }

    /// Get the file path for a name
    fn file_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    fn open(&self, name: &str) -> Result<File, StorageError> {
        let path = self.file_path(name)?;
        File::open(&path).map_err(|e| StorageError::Open {
            name: name.to_string(),
            source: e,
        })
    }
}

impl StorageBackend for LocalStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.file_path(name)?;
        Ok(path.is_file())
    }

    fn size(&self, name: &str) -> Result<u64, StorageError> {
        let path = self.file_path(name)?;
        let metadata = fs::metadata(&path).map_err(|e| StorageError::Stat {
            name: name.to_string(),
            source: e,
        })?;
        Ok(metadata.len())
    }

    fn read(&self, name: &str) -> Result<Bytes, StorageError> {
        let mut file = self.open(name)?;

        let size = file
            .metadata()
            .map_err(|e| StorageError::Stat {
                name: name.to_string(),
                source: e,
            })?
            .len();
        debug!("Reading {} bytes from {:?}", size, self.root.join(name));

        let len = usize::try_from(size).map_err(|_| StorageError::Stat {
            name: name.to_string(),
            source: io::Error::new(io::ErrorKind::InvalidData, "file too large"),
        })?;

        // A file that shrank after the stat surfaces as UnexpectedEof
        let mut buffer = vec![0u8; len];
        file.read_exact(&mut buffer)
            .map_err(|e| StorageError::Read {
                name: name.to_string(),
                source: e,
            })?;

        Ok(Bytes::from(buffer))
    }

    fn describe(&self) -> String {
        format!("local:{}", self.root.display())
    }
}
