//! DNS record mutation
//!
//! Publishes a caller's address for a hostname with a single
//! read-compare-upsert round against the provider. There are no retries:
//! the client's next periodic request is the retry.

use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::traits::{DnsProvider, RecordType};

/// Result of a successful mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutateOutcome {
    /// The record was created or overwritten
    Updated {
        /// Address published before this call, if a record existed
        previous: Option<IpAddr>,
    },
    /// The record already held the address; nothing was written
    Unchanged,
}

/// Writes address records through a [`DnsProvider`]
#[derive(Clone)]
pub struct DnsMutator {
    provider: Arc<dyn DnsProvider>,
    ttl: u32,
    timeout: Duration,
}

impl std::fmt::Debug for DnsMutator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DnsMutator")
            .field("provider", &self.provider.provider_name())
            .field("ttl", &self.ttl)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl DnsMutator {
    /// Create a mutator
    ///
    /// # Parameters
    ///
    /// - `provider`: Authoritative DNS provider
    /// - `ttl`: TTL written on every upserted record
    /// - `timeout`: Deadline covering the read and the write together
    pub fn new(provider: Arc<dyn DnsProvider>, ttl: u32, timeout: Duration) -> Self {
        Self {
            provider,
            ttl,
            timeout,
        }
    }

    /// Make `hostname` resolve to `ip`
    ///
    /// The record type follows the address family. Reading first keeps a
    /// repeated `set` with an unchanged address from writing to the zone.
    ///
    /// # Returns
    ///
    /// - `Ok(MutateOutcome)`: Zone state now matches `ip`
    /// - `Err(Error::InvalidRequest)`: The provider does not manage `hostname`
    /// - `Err(Error::Timeout)`: The deadline passed; the zone may or may not
    ///   have been written
    /// - `Err(Error)`: Any other provider failure
    pub async fn upsert(&self, hostname: &str, ip: IpAddr) -> Result<MutateOutcome> {
        if !self.provider.supports_record(hostname) {
            return Err(Error::invalid_request(format!(
                "Hostname {} is not managed by provider {}",
                hostname,
                self.provider.provider_name()
            )));
        }

        match tokio::time::timeout(self.timeout, self.read_compare_write(hostname, ip)).await {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(format!(
                "Provider {} did not answer for {} within {}s",
                self.provider.provider_name(),
                hostname,
                self.timeout.as_secs()
            ))),
        }
    }

    async fn read_compare_write(&self, hostname: &str, ip: IpAddr) -> Result<MutateOutcome> {
        let record_type = RecordType::for_addr(&ip);
        let previous = self.provider.current_record(hostname, record_type).await?;

        if previous == Some(ip) {
            debug!("Record {} {} already has IP {}, skipping update", hostname, record_type, ip);
            return Ok(MutateOutcome::Unchanged);
        }

        self.provider.upsert_record(hostname, ip, self.ttl).await?;
        info!("Updated {} {} -> {} (previous: {:?})", hostname, record_type, ip, previous);

        Ok(MutateOutcome::Updated { previous })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct ZoneProvider {
        records: Mutex<HashMap<(String, RecordType), (IpAddr, u32)>>,
        writes: AtomicUsize,
        delay: Option<Duration>,
    }

    #[async_trait]
    impl DnsProvider for ZoneProvider {
        async fn current_record(
            &self,
            record_name: &str,
            record_type: RecordType,
        ) -> Result<Option<IpAddr>> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let records = self.records.lock().unwrap();
            Ok(records
                .get(&(record_name.to_string(), record_type))
                .map(|(ip, _)| *ip))
        }

        async fn upsert_record(&self, record_name: &str, ip: IpAddr, ttl: u32) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            let mut records = self.records.lock().unwrap();
            records.insert((record_name.to_string(), RecordType::for_addr(&ip)), (ip, ttl));
            Ok(())
        }

        fn supports_record(&self, record_name: &str) -> bool {
            record_name.ends_with(".example.com")
        }

        fn provider_name(&self) -> &'static str {
            "zone"
        }
    }

    fn mutator(provider: Arc<ZoneProvider>) -> DnsMutator {
        DnsMutator::new(provider, 60, Duration::from_secs(1))
    }

    #[tokio::test]
    async fn creates_then_skips_then_updates() {
        let provider = Arc::new(ZoneProvider::default());
        let mutator = mutator(provider.clone());
        let first: IpAddr = "203.0.113.7".parse().unwrap();
        let second: IpAddr = "203.0.113.9".parse().unwrap();

        let created = mutator.upsert("ddns.example.com", first).await.unwrap();
        assert_eq!(created, MutateOutcome::Updated { previous: None });

        let same = mutator.upsert("ddns.example.com", first).await.unwrap();
        assert_eq!(same, MutateOutcome::Unchanged);
        assert_eq!(provider.writes.load(Ordering::SeqCst), 1);

        let moved = mutator.upsert("ddns.example.com", second).await.unwrap();
        assert_eq!(moved, MutateOutcome::Updated { previous: Some(first) });
        assert_eq!(provider.writes.load(Ordering::SeqCst), 2);

        let records = provider.records.lock().unwrap();
        assert_eq!(
            records.get(&("ddns.example.com".to_string(), RecordType::A)),
            Some(&(second, 60))
        );
    }

    #[tokio::test]
    async fn address_families_are_separate_records() {
        let provider = Arc::new(ZoneProvider::default());
        let mutator = mutator(provider.clone());
        let v4: IpAddr = "203.0.113.7".parse().unwrap();
        let v6: IpAddr = "2001:db8::7".parse().unwrap();

        mutator.upsert("ddns.example.com", v4).await.unwrap();
        let outcome = mutator.upsert("ddns.example.com", v6).await.unwrap();

        assert_eq!(outcome, MutateOutcome::Updated { previous: None });
        assert_eq!(provider.records.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn unsupported_hostname_is_rejected_before_io() {
        let provider = Arc::new(ZoneProvider::default());
        let mutator = mutator(provider.clone());

        let err = mutator
            .upsert("ddns.other.org", "203.0.113.7".parse().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidRequest(_)));
        assert_eq!(provider.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_provider_times_out() {
        let provider = Arc::new(ZoneProvider {
            delay: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let mutator = mutator(provider.clone());

        let err = mutator
            .upsert("ddns.example.com", "203.0.113.7".parse().unwrap())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Timeout(_)), "got {}", err);
        assert_eq!(provider.writes.load(Ordering::SeqCst), 0);
    }
}
