// # DNS Provider Trait
//
// Defines the interface to the authoritative DNS provider that owns the zone.
//
// ## Implementations
//
// - Cloudflare: `ddns-provider-cloudflare` crate
//
// ## Usage
//
// ```rust,ignore
// use ddns_core::traits::{DnsProvider, RecordType};
//
// let provider = /* DnsProvider implementation */;
// let ip: std::net::IpAddr = "203.0.113.7".parse()?;
//
// let published = provider.current_record("ddns.example.com", RecordType::A).await?;
// if published != Some(ip) {
//     provider.upsert_record("ddns.example.com", ip, 60).await?;
// }
// ```

use async_trait::async_trait;
use std::net::IpAddr;

/// Address record types the gateway manages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    /// IPv4 address record
    A,
    /// IPv6 address record
    Aaaa,
}

impl RecordType {
    /// Record type matching the family of `ip`
    pub fn for_addr(ip: &IpAddr) -> Self {
        match ip {
            IpAddr::V4(_) => RecordType::A,
            IpAddr::V6(_) => RecordType::Aaaa,
        }
    }

    /// Wire name of the record type
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
        }
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Trait for DNS provider implementations
///
/// # Thread Safety
///
/// Implementations must be thread-safe; the gateway calls them from many
/// concurrent request tasks without coordination.
///
/// # Trust Level: Untrusted
///
/// ## Allowed Capabilities
/// - ✅ Perform HTTP/HTTPS API calls to their endpoints only
/// - ✅ Parse provider-specific responses
/// - ✅ Return success or failure
///
/// ## Forbidden Capabilities
/// - ❌ Retry or back off (clients own the retry schedule)
/// - ❌ Cache record state between calls (zone identity may be cached)
/// - ❌ Decide whether an update is needed (owned by `DnsMutator`)
/// - ❌ Spawn tasks or threads
#[async_trait]
pub trait DnsProvider: Send + Sync {
    /// Resolve process-wide provider state once, before serving
    ///
    /// Called at startup so that lookups which never change for the life of
    /// the process (such as zone identity) are not repeated per request.
    /// Failure here is a startup error.
    async fn prepare(&self) -> Result<(), crate::Error> {
        Ok(())
    }

    /// Read the address currently published for a record
    ///
    /// # Parameters
    ///
    /// - `record_name`: Fully-qualified record name
    /// - `record_type`: A or AAAA
    ///
    /// # Returns
    ///
    /// - `Ok(Some(IpAddr))`: The published address
    /// - `Ok(None)`: No record of that type exists
    /// - `Err(Error)`: The provider rejected or failed the request
    async fn current_record(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Option<IpAddr>, crate::Error>;

    /// Create or overwrite the address record for `record_name`
    ///
    /// # Idempotency
    ///
    /// Must be safe to repeat with the same arguments: the resulting zone
    /// state is the same after one call or many. "Create" semantics that
    /// fail on an existing record, or appending a second record, violate
    /// this contract.
    ///
    /// # Parameters
    ///
    /// - `record_name`: Fully-qualified record name
    /// - `ip`: Address to publish; the record type follows its family
    /// - `ttl`: Record time-to-live in seconds
    async fn upsert_record(
        &self,
        record_name: &str,
        ip: IpAddr,
        ttl: u32,
    ) -> Result<(), crate::Error>;

    /// Check if this provider can manage the given record name
    fn supports_record(&self, record_name: &str) -> bool;

    /// Get the provider name (for logging/debugging)
    fn provider_name(&self) -> &'static str;
}

/// Helper trait for constructing DNS providers from configuration
pub trait DnsProviderFactory: Send + Sync {
    /// Create a DnsProvider instance from configuration
    ///
    /// # Parameters
    ///
    /// - `config`: Configuration specific to this provider
    ///
    /// # Returns
    ///
    /// A boxed DnsProvider trait object
    fn create(
        &self,
        config: &crate::config::ProviderConfig,
    ) -> Result<Box<dyn DnsProvider>, crate::Error>;
}
