// # Memory Secret Store
//
// In-memory implementation of SecretStore.
//
// ## Purpose
//
// Holds hostname secrets in a HashMap. Nothing persists across restarts,
// so this store is meant for tests and local development.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use crate::Error;
use crate::config::SecretStoreConfig;
use crate::traits::secret_store::{HostnameRecord, Secret, SecretStore, SecretStoreFactory};

/// In-memory secret store
///
/// Clones share the same map, so a test can keep a handle and rotate a
/// secret while the service holds another.
///
/// # Example
///
/// ```rust
/// use ddns_core::store::MemorySecretStore;
///
/// let store = MemorySecretStore::new();
/// store.insert("ddns.example.com", "s3cret");
/// assert_eq!(store.len(), 1);
/// ```
#[derive(Clone, Default)]
pub struct MemorySecretStore {
    inner: Arc<RwLock<HashMap<String, Secret>>>,
}

impl std::fmt::Debug for MemorySecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemorySecretStore")
            .field("hostnames", &self.len())
            .finish()
    }
}

impl MemorySecretStore {
    /// Create a new empty memory secret store
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-populated from a hostname to secret map
    pub fn from_map(secrets: &HashMap<String, String>) -> Self {
        let store = Self::new();
        for (hostname, secret) in secrets {
            store.insert(hostname, secret.clone());
        }
        store
    }

    /// Register or replace the secret for `hostname`
    ///
    /// Hostnames are stored lowercased without a trailing dot, matching the
    /// normalized form requests are looked up with.
    pub fn insert(&self, hostname: &str, secret: impl Into<String>) {
        let key = hostname.trim_end_matches('.').to_ascii_lowercase();
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.insert(key, Secret::new(secret));
    }

    /// Remove the registration for `hostname`
    pub fn remove(&self, hostname: &str) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        guard.remove(hostname);
    }

    /// Number of registered hostnames
    pub fn len(&self) -> usize {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl SecretStore for MemorySecretStore {
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRecord>, Error> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        Ok(guard.get(hostname).map(|secret| HostnameRecord {
            hostname: hostname.to_string(),
            secret: secret.clone(),
        }))
    }

    fn store_name(&self) -> &'static str {
        "memory"
    }
}

/// Factory for [`MemorySecretStore`]
pub struct MemorySecretStoreFactory;

impl SecretStoreFactory for MemorySecretStoreFactory {
    fn create(&self, config: &SecretStoreConfig) -> Result<Box<dyn SecretStore>, Error> {
        match config {
            SecretStoreConfig::Memory { secrets } => {
                Ok(Box::new(MemorySecretStore::from_map(secrets)))
            }
            other => Err(Error::config(format!(
                "Memory store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
