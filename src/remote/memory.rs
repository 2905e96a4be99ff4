//! In-process store, for tests and dry runs

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;

use super::{RemoteEntry, RemoteError, RemoteKey, RemoteStore};
use crate::fingerprint::FingerprintAlgorithm;

/// Map of key → fingerprint
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
    lookups: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a fingerprint under `key`
    pub fn insert(&self, key: impl Into<String>, fingerprint: impl Into<String>) {
        if let Ok(mut entries) = self.entries.write() {
            entries.insert(key.into(), fingerprint.into());
        }
    }

    /// Record `content` as published under `key`
    pub fn publish(&self, key: &RemoteKey, content: &[u8], algorithm: FingerprintAlgorithm) {
        self.insert(key.as_str(), algorithm.digest(content));
    }

    /// Number of `head` calls served
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl RemoteStore for MemoryStore {
    fn head(&self, key: &RemoteKey) -> Result<Option<RemoteEntry>, RemoteError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let entries = self.entries.read().map_err(|_| RemoteError::Transport {
            key: key.to_string(),
            message: "store lock poisoned".to_string(),
        })?;
        Ok(entries.get(key.as_str()).map(|fingerprint| RemoteEntry {
            fingerprint: fingerprint.clone(),
        }))
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
