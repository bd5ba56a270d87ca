// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! In-memory config store fake for testing without filesystem I/O.

use geofence_app_core::config::{validate_key, ConfigError, ConfigStore};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// In-memory implementation of [`ConfigStore`] for testing.
///
/// Clones share the same blobs, so a test can hand one clone to a
/// `ConfigService` and inspect through another.
///
/// # Example
///
/// ```
/// use geofence_dry_tests::InMemoryConfigStore;
/// use geofence_app_core::config::ConfigService;
///
/// let store = InMemoryConfigStore::new();
/// let service = ConfigService::new(store.clone());
///
/// service.save("console", &serde_json::json!({"zoom": 16})).unwrap();
/// assert_eq!(store.save_count(), 1);
/// assert!(store.contains_key("console"));
/// ```
#[derive(Clone, Default)]
pub struct InMemoryConfigStore {
    inner: Arc<Mutex<InMemoryConfigStoreInner>>,
}

#[derive(Default)]
struct InMemoryConfigStoreInner {
    data: HashMap<String, Vec<u8>>,
    load_count: usize,
    save_count: usize,
    fail_on_load: bool,
    fail_on_save: bool,
}

impl InMemoryConfigStore {
    /// Create a new empty in-memory config store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryConfigStoreInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Seed a raw blob (bypasses counters and failure flags).
    pub fn insert_raw(&self, key: &str, data: &[u8]) {
        self.lock().data.insert(key.to_string(), data.to_vec());
    }

    /// Configure the store to fail on load operations.
    pub fn set_fail_on_load(&self, fail: bool) {
        self.lock().fail_on_load = fail;
    }

    /// Configure the store to fail on save operations.
    pub fn set_fail_on_save(&self, fail: bool) {
        self.lock().fail_on_save = fail;
    }

    /// Number of `load_raw` attempts, including failed ones.
    pub fn load_count(&self) -> usize {
        self.lock().load_count
    }

    /// Number of `save_raw` attempts, including failed ones.
    pub fn save_count(&self) -> usize {
        self.lock().save_count
    }

    /// Check if a key exists in the store.
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().data.contains_key(key)
    }

    /// Raw blob stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.lock().data.get(key).cloned()
    }
}

impl ConfigStore for InMemoryConfigStore {
    fn load_raw(&self, key: &str) -> Result<Vec<u8>, ConfigError> {
        let mut inner = self.lock();
        inner.load_count += 1;
        validate_key(key)?;

        if inner.fail_on_load {
            return Err(ConfigError::Other("simulated load failure".into()));
        }

        inner.data.get(key).cloned().ok_or(ConfigError::NotFound)
    }

    fn save_raw(&self, key: &str, data: &[u8]) -> Result<(), ConfigError> {
        let mut inner = self.lock();
        inner.save_count += 1;
        validate_key(key)?;

        if inner.fail_on_save {
            return Err(ConfigError::Other("simulated save failure".into()));
        }

        inner.data.insert(key.to_string(), data.to_vec());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_found() {
        let store = InMemoryConfigStore::new();
        assert!(matches!(store.load_raw("console"), Err(ConfigError::NotFound)));
        assert_eq!(store.load_count(), 1);
    }

    #[test]
    fn path_like_keys_are_rejected() {
        let store = InMemoryConfigStore::new();
        assert!(matches!(
            store.save_raw("../console", b"{}"),
            Err(ConfigError::InvalidKey(_))
        ));
        assert!(!store.contains_key("../console"));
    }

    #[test]
    fn simulated_failures_count_as_attempts() {
        let store = InMemoryConfigStore::new();
        store.insert_raw("console", b"{}");
        store.set_fail_on_load(true);
        store.set_fail_on_save(true);
        assert!(matches!(store.load_raw("console"), Err(ConfigError::Other(_))));
        assert!(matches!(store.save_raw("console", b"[]"), Err(ConfigError::Other(_))));
        assert_eq!(store.load_count(), 1);
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.raw("console").unwrap(), b"{}");
    }
}
