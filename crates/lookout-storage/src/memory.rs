use std::collections::HashMap;
use std::time::Instant;

use parking_lot::Mutex;

use crate::{validate_key, PostponeStorage, StorageError, StorageLimits};

struct Entry {
    bytes: Vec<u8>,
    stored_at: Instant,
}

/// Process-local backend. Only useful when the follow-up request is served by
/// the same process.
pub struct MemoryStorage {
    limits: StorageLimits,
    entries: Mutex<HashMap<String, Entry>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(StorageLimits::default())
    }
}

impl MemoryStorage {
    pub fn new(limits: StorageLimits) -> Self {
        Self {
            limits,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn put_at(&self, key: &str, bytes: &[u8], now: Instant) -> Result<(), StorageError> {
        validate_key(key)?;
        let mut entries = self.entries.lock();
        let ttl = self.limits.ttl;
        entries.retain(|_, entry| now.saturating_duration_since(entry.stored_at) < ttl);

        if !entries.contains_key(key) {
            while entries.len() >= self.limits.max_entries.max(1) {
                let Some(oldest) = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.stored_at)
                    .map(|(key, _)| key.clone())
                else {
                    break;
                };
                tracing::debug!(target: "lookout.storage", key = %oldest, "evicting oldest postponed entry");
                entries.remove(&oldest);
            }
        }

        entries.insert(
            key.to_string(),
            Entry {
                bytes: bytes.to_vec(),
                stored_at: now,
            },
        );
        Ok(())
    }

    fn take_at(&self, key: &str, now: Instant) -> Result<Option<Vec<u8>>, StorageError> {
        validate_key(key)?;
        let entry = self.entries.lock().remove(key);
        Ok(entry
            .filter(|entry| now.saturating_duration_since(entry.stored_at) < self.limits.ttl)
            .map(|entry| entry.bytes))
    }
}

impl PostponeStorage for MemoryStorage {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        self.put_at(key, bytes, Instant::now())
    }

    fn take_and_clear(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        self.take_at(key, Instant::now())
    }
}
