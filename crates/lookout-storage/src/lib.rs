//! Keyed storage for packets postponed across a redirect.
//!
//! A [`PostponeStorage`] maps a session token to one opaque payload. `put`
//! replaces any previous payload for the key and is all-or-nothing;
//! `take_and_clear` hands the payload to exactly one caller even when two
//! requests of the same session race.

mod error;
mod file;
mod memory;

use std::sync::Arc;
use std::time::Duration;

pub use error::StorageError;
pub use file::FileStorage;
pub use memory::MemoryStorage;

pub const DEFAULT_TTL: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_ENTRIES: usize = 1000;
pub const MAX_KEY_LEN: usize = 128;

pub trait PostponeStorage: Send + Sync {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    /// Returns and removes the payload for `key`. Expired payloads read as
    /// absent.
    fn take_and_clear(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;
}

impl<T: PostponeStorage + ?Sized> PostponeStorage for Arc<T> {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, bytes)
    }

    fn take_and_clear(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).take_and_clear(key)
    }
}

impl<T: PostponeStorage + ?Sized> PostponeStorage for Box<T> {
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        (**self).put(key, bytes)
    }

    fn take_and_clear(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        (**self).take_and_clear(key)
    }
}

/// Expiry and size bounds shared by all backends.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StorageLimits {
    pub ttl: Duration,
    pub max_entries: usize,
}

impl Default for StorageLimits {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

/// Keys are 1 to 128 bytes of `[A-Za-z0-9_.-]`.
pub fn validate_key(key: &str) -> Result<(), StorageError> {
    let ok = (1..=MAX_KEY_LEN).contains(&key.len())
        && key
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'));
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidKey {
            key: key.chars().take(MAX_KEY_LEN).collect(),
        })
    }
}
