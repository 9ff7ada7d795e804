//! Persisted key-value store seam
//!
//! The lock policy and the codec keep all durable state in a flat string
//! store. Hosts plug in their own store (the mobile app's async storage, a
//! keychain, ...); this crate ships [`MemoryStore`] and
//! [`FileStore`](crate::file_store::FileStore).

use anyhow::Result;
use parking_lot::Mutex;
use std::collections::BTreeMap;

pub const PIN_HASH_KEY: &str = "pin_hash";
pub const PIN_SALT_KEY: &str = "pin_salt";
pub const PIN_ENABLED_KEY: &str = "pin_enabled";
pub const BIOMETRIC_ENABLED_KEY: &str = "biometric_enabled";
pub const FAILED_ATTEMPTS_KEY: &str = "failed_attempts";
pub const LOCKED_UNTIL_KEY: &str = "locked_until";
pub const LAST_ACTIVITY_KEY: &str = "last_activity";
pub const ENCRYPTION_KEY_KEY: &str = "encryption_key";

/// Every key owned by the lock subsystem, in the order they are cleared
pub const ALL_SECURITY_KEYS: &[&str] = &[
    PIN_HASH_KEY,
    PIN_SALT_KEY,
    PIN_ENABLED_KEY,
    BIOMETRIC_ENABLED_KEY,
    FAILED_ATTEMPTS_KEY,
    LOCKED_UNTIL_KEY,
    LAST_ACTIVITY_KEY,
    ENCRYPTION_KEY_KEY,
];

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// Remove several keys as one batch.
    ///
    /// Implementations should apply the batch all-or-nothing. The default
    /// removes keys one by one in slice order and stops at the first
    /// failure, leaving later keys in place.
    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// In-process store, used by tests and hosts without durable storage
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut entries = self.entries.lock();
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}
