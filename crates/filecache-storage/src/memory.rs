//! In-memory storage backend

use bytes::Bytes;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::debug;

use crate::backend::{validate_name, StorageBackend};
use crate::error::StorageError;

#[derive(Default)]
struct Object {
    data: Option<Bytes>,
    fetches: AtomicU64,
}

/// In-memory storage backend
///
/// Keeps named objects in a map and counts how many times each name was
/// fetched with [`StorageBackend::read`], including failed fetches.
#[derive(Default)]
pub struct MemoryStorage {
    objects: RwLock<HashMap<String, Object>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store (or replace) an object
    pub fn insert(&self, name: impl Into<String>, data: impl Into<Bytes>) {
        let mut objects = self.objects.write();
        objects.entry(name.into()).or_default().data = Some(data.into());
    }

    /// Remove an object, keeping its fetch count. Returns whether it existed.
    pub fn remove(&self, name: &str) -> bool {
        let mut objects = self.objects.write();
        objects
            .get_mut(name)
            .and_then(|o| o.data.take())
            .is_some()
    }

    /// Number of `read` calls that reached this backend for `name`
    pub fn fetch_count(&self, name: &str) -> u64 {
        self.objects
            .read()
            .get(name)
            .map(|o| o.fetches.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn not_found() -> io::Error {
        io::Error::new(io::ErrorKind::NotFound, "no such object")
    }
}

impl StorageBackend for MemoryStorage {
    fn exists(&self, name: &str) -> Result<bool, StorageError> {
        validate_name(name)?;
        Ok(self
            .objects
            .read()
            .get(name)
            .is_some_and(|o| o.data.is_some()))
    }

    fn size(&self, name: &str) -> Result<u64, StorageError> {
        validate_name(name)?;
        self.objects
            .read()
            .get(name)
            .and_then(|o| o.data.as_ref())
            .map(|d| d.len() as u64)
            .ok_or_else(|| StorageError::Stat {
                name: name.to_string(),
                source: Self::not_found(),
            })
    }

    fn read(&self, name: &str) -> Result<Bytes, StorageError> {
        validate_name(name)?;

        let data = {
            let mut objects = self.objects.write();
            let object = objects.entry(name.to_string()).or_default();
            object.fetches.fetch_add(1, Ordering::Relaxed);
            object.data.clone()
        };

        debug!("Fetching {} from memory", name);
        data.ok_or_else(|| StorageError::Open {
            name: name.to_string(),
            source: Self::not_found(),
        })
    }

    fn describe(&self) -> String {
        let objects = self.objects.read();
        let stored = objects.values().filter(|o| o.data.is_some()).count();
        format!("memory:{} objects", stored)
    }
}
