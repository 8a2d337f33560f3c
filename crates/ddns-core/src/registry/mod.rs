//! Plugin-based provider registry
//!
//! The registry allows DNS providers and secret stores to be registered
//! dynamically at runtime, avoiding hardcoded if-else chains.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ddns_core::registry::ProviderRegistry;
//!
//! let registry = ProviderRegistry::with_builtin_stores();
//! ddns_provider_cloudflare::register(&registry);
//!
//! let provider = registry.create_provider(&config.provider)?;
//! let store = registry.create_secret_store(&config.secret_store)?;
//! ```
//!
//! ## Registration
//!
//! Implementations register themselves during initialization:
//!
//! ```rust,ignore
//! // In ddns-provider-cloudflare crate
//! pub fn register(registry: &ProviderRegistry) {
//!     registry.register_provider("cloudflare", Box::new(CloudflareFactory));
//! }
//! ```

use crate::config::{ProviderConfig, SecretStoreConfig};
use crate::error::{Error, Result};
use crate::store::{FileSecretStoreFactory, MemorySecretStoreFactory};
use crate::traits::{DnsProvider, DnsProviderFactory, SecretStore, SecretStoreFactory};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

/// Registry of DNS provider and secret store factories
///
/// ## Thread Safety
///
/// The registry uses interior mutability with RwLock, allowing concurrent
/// reads and exclusive writes.
#[derive(Default)]
pub struct ProviderRegistry {
    /// Registered DNS provider factories
    providers: RwLock<HashMap<String, Box<dyn DnsProviderFactory>>>,

    /// Registered secret store factories
    secret_stores: RwLock<HashMap<String, Box<dyn SecretStoreFactory>>>,
}

impl ProviderRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the `file` and `memory` secret stores registered
    pub fn with_builtin_stores() -> Self {
        let registry = Self::new();
        registry.register_secret_store("file", Box::new(FileSecretStoreFactory));
        registry.register_secret_store("memory", Box::new(MemorySecretStoreFactory));
        registry
    }

    /// Register a DNS provider factory
    ///
    /// # Parameters
    ///
    /// - `name`: Provider type name (e.g., "cloudflare")
    /// - `factory`: Factory object for creating provider instances
    pub fn register_provider(&self, name: impl Into<String>, factory: Box<dyn DnsProviderFactory>) {
        let mut providers = self.providers.write().unwrap_or_else(PoisonError::into_inner);
        providers.insert(name.into(), factory);
    }

    /// Register a secret store factory
    ///
    /// # Parameters
    ///
    /// - `name`: Store type name (e.g., "file", "http")
    /// - `factory`: Factory object for creating store instances
    pub fn register_secret_store(
        &self,
        name: impl Into<String>,
        factory: Box<dyn SecretStoreFactory>,
    ) {
        let mut stores = self.secret_stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.insert(name.into(), factory);
    }

    /// Create a DNS provider from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn DnsProvider>)`: Created provider instance
    /// - `Err(Error)`: If provider type is not registered or creation fails
    pub fn create_provider(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        let provider_type = config.type_name();
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);

        let factory = providers
            .get(provider_type)
            .ok_or_else(|| Error::config(format!("Unknown provider type: {}", provider_type)))?;

        factory.create(config)
    }

    /// Create a secret store from configuration
    ///
    /// # Returns
    ///
    /// - `Ok(Box<dyn SecretStore>)`: Created store instance
    /// - `Err(Error)`: If store type is not registered or creation fails
    pub fn create_secret_store(&self, config: &SecretStoreConfig) -> Result<Box<dyn SecretStore>> {
        let store_type = config.type_name();
        let stores = self.secret_stores.read().unwrap_or_else(PoisonError::into_inner);

        let factory = stores
            .get(store_type)
            .ok_or_else(|| Error::config(format!("Unknown secret store type: {}", store_type)))?;

        factory.create(config)
    }

    /// List all registered provider types
    pub fn list_providers(&self) -> Vec<String> {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.keys().cloned().collect()
    }

    /// List all registered secret store types
    pub fn list_secret_stores(&self) -> Vec<String> {
        let stores = self.secret_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.keys().cloned().collect()
    }

    /// Check if a provider type is registered
    pub fn has_provider(&self, name: &str) -> bool {
        let providers = self.providers.read().unwrap_or_else(PoisonError::into_inner);
        providers.contains_key(name)
    }

    /// Check if a secret store type is registered
    pub fn has_secret_store(&self, name: &str) -> bool {
        let stores = self.secret_stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.contains_key(name)
    }
}
