//! In-memory repository cache
//!
//! One entry per key, overwritten wholesale on every fresh fetch. Entries
//! live as long as the session (process); nothing is persisted.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::CacheKey;
use crate::package::{PackageDescriptor, PackageSnapshot};

/// A stored snapshot of a fetched package
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: PackageSnapshot,
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Descriptor view of the payload, built on demand
    pub fn descriptor(&self) -> PackageDescriptor {
        PackageDescriptor::from_snapshot(&self.key.repo, &self.payload)
    }
}

/// Statistics about cache state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_size_bytes: usize,
}

/// Session-scoped package cache.
///
/// The map sits behind a mutex so a `put` is atomic with respect to `get`.
#[derive(Debug, Default)]
pub struct RepositoryCache {
    entries: Mutex<HashMap<CacheKey, Arc<CacheEntry>>>,
}

impl RepositoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        self.lock().get(key).cloned()
    }

    /// Store a payload, replacing any previous entry for the key
    pub fn put(&self, key: CacheKey, payload: PackageSnapshot) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            key: key.clone(),
            payload,
            fetched_at: Utc::now(),
        });
        if self.lock().insert(key, Arc::clone(&entry)).is_some() {
            log::debug!("Replaced cache entry for {}", entry.key);
        }
        entry
    }

    /// Drop all entries, returning how many were removed
    pub fn clear(&self) -> usize {
        let mut entries = self.lock();
        let removed = entries.len();
        entries.clear();
        removed
    }

    pub fn stats(&self) -> CacheStats {
        let entries = self.lock();
        CacheStats {
            entries: entries.len(),
            total_size_bytes: entries.values().map(|e| e.payload.size_bytes()).sum(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, Arc<CacheEntry>>> {
        self.entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
