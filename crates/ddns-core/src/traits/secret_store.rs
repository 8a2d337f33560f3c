// # Secret Store Trait
//
// Defines the read-only interface to the store holding per-hostname secrets.
//
// ## Purpose
//
// An operator registers a hostname by placing one object in the store,
// keyed by the hostname (optionally under a key prefix). The object's
// content is the secret that authenticates `set` requests for that hostname.
//
// ## Implementations
//
// - In-memory: `MemorySecretStore` (development and tests)
// - Directory: `FileSecretStore` (one file per hostname)
// - HTTP object store: `ddns-secret-http` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::SecretStore;
//
// let store = /* SecretStore implementation */;
// match store.get("ddns.example.com").await? {
//     Some(record) => { /* compare credential against record.secret */ }
//     None => { /* hostname was never registered */ }
// }
// ```

use async_trait::async_trait;

/// Opaque credential material
///
/// The Debug implementation never prints the value, so a secret cannot leak
/// through `tracing` fields or error formatting.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    /// Wrap secret material
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw secret
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Check whether the secret is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(<REDACTED>)")
    }
}

/// A registered hostname and the secret bound to it
///
/// The published address is not part of this record: the authoritative copy
/// lives in the DNS provider's zone and is read through
/// [`DnsProvider::current_record`](crate::traits::DnsProvider::current_record).
#[derive(Debug, Clone)]
pub struct HostnameRecord {
    /// Fully-qualified hostname (normalized, lowercase, no trailing dot)
    pub hostname: String,
    /// Secret authenticating updates for `hostname`
    pub secret: Secret,
}

/// Trait for secret store implementations
///
/// # Thread Safety
///
/// All methods must be safe to call concurrently from multiple tasks.
///
/// # Trust Level: Trusted, Read-Only
///
/// ## Allowed Capabilities
/// - ✅ Perform I/O to read a single object per call
/// - ✅ Map "object absent" to `Ok(None)`
///
/// ## Forbidden Capabilities
/// - ❌ Write, create or delete objects
/// - ❌ Cache secrets across calls (credential rotation must take effect
///   on the very next request)
/// - ❌ Decide whether a credential is valid (owned by `Authenticator`)
#[async_trait]
pub trait SecretStore: Send + Sync {
    /// Look up the record registered for `hostname`
    ///
    /// # Parameters
    ///
    /// - `hostname`: Normalized fully-qualified hostname
    ///
    /// # Returns
    ///
    /// - `Ok(Some(HostnameRecord))`: The hostname is registered
    /// - `Ok(None)`: No object exists for the hostname
    /// - `Err(Error)`: The store could not be read
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRecord>, crate::Error>;

    /// Get the store name (for logging/debugging)
    fn store_name(&self) -> &'static str;
}

/// Helper trait for constructing secret stores from configuration
pub trait SecretStoreFactory: Send + Sync {
    /// Create a SecretStore instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this store
    ///
    /// # Returns
    ///
    /// A boxed SecretStore trait object
    fn create(
        &self,
        config: &crate::config::SecretStoreConfig,
    ) -> Result<Box<dyn SecretStore>, crate::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secret_not_exposed_in_debug() {
        let record = HostnameRecord {
            hostname: "ddns.example.com".to_string(),
            secret: Secret::new("hunter2-very-secret"),
        };

        let debug_str = format!("{:?}", record);
        assert!(!debug_str.contains("hunter2"));
        assert!(debug_str.contains("ddns.example.com"));
        assert!(debug_str.contains("<REDACTED>"));
    }
}
