//! Test doubles and common utilities for contract tests
//!
//! The doubles count every call so tests can assert not only on results
//! but on which collaborators were (or were not) touched.

#![allow(dead_code)]

use ddns_core::config::ServiceConfig;
use ddns_core::error::{Error, Result};
use ddns_core::traits::{DnsProvider, HostnameRecord, RecordType, Secret, SecretStore};
use ddns_core::{ConnectionMeta, UpdateQuery, UpdateService};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How a mock collaborator misbehaves
#[derive(Debug, Clone, Copy, Default)]
pub enum Behavior {
    /// Answer normally
    #[default]
    Healthy,
    /// Fail every call with a provider error
    Failing,
    /// Sleep before answering
    Slow(Duration),
}

/// A mock DnsProvider backed by an in-memory zone
#[derive(Clone, Default)]
pub struct MockDnsProvider {
    zone: Arc<Mutex<HashMap<(String, RecordType), (IpAddr, u32)>>>,
    read_call_count: Arc<AtomicUsize>,
    upsert_call_count: Arc<AtomicUsize>,
    behavior: Behavior,
}

impl MockDnsProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior,
            ..Self::default()
        }
    }

    /// Pre-publish a record
    pub fn publish(&self, name: &str, ip: IpAddr) {
        self.zone
            .lock()
            .unwrap()
            .insert((name.to_string(), RecordType::for_addr(&ip)), (ip, 300));
    }

    /// Address currently published for `name`
    pub fn published(&self, name: &str, record_type: RecordType) -> Option<IpAddr> {
        self.zone
            .lock()
            .unwrap()
            .get(&(name.to_string(), record_type))
            .map(|(ip, _)| *ip)
    }

    /// TTL currently published for `name`
    pub fn published_ttl(&self, name: &str, record_type: RecordType) -> Option<u32> {
        self.zone
            .lock()
            .unwrap()
            .get(&(name.to_string(), record_type))
            .map(|(_, ttl)| *ttl)
    }

    /// Get the number of times current_record() was called
    pub fn read_call_count(&self) -> usize {
        self.read_call_count.load(Ordering::SeqCst)
    }

    /// Get the number of times upsert_record() was called
    pub fn upsert_call_count(&self) -> usize {
        self.upsert_call_count.load(Ordering::SeqCst)
    }

    async fn misbehave(&self) -> Result<()> {
        match self.behavior {
            Behavior::Healthy => Ok(()),
            Behavior::Failing => Err(Error::provider("mock", "403 permission denied")),
            Behavior::Slow(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        }
    }
}

#[async_trait::async_trait]
impl DnsProvider for MockDnsProvider {
    async fn current_record(&self, record_name: &str, record_type: RecordType) -> Result<Option<IpAddr>> {
        self.read_call_count.fetch_add(1, Ordering::SeqCst);
        self.misbehave().await?;
        Ok(self.published(record_name, record_type))
    }

    async fn upsert_record(&self, record_name: &str, ip: IpAddr, ttl: u32) -> Result<()> {
        self.upsert_call_count.fetch_add(1, Ordering::SeqCst);
        self.misbehave().await?;
        self.zone
            .lock()
            .unwrap()
            .insert((record_name.to_string(), RecordType::for_addr(&ip)), (ip, ttl));
        Ok(())
    }

    fn supports_record(&self, _record_name: &str) -> bool {
        true
    }

    fn provider_name(&self) -> &'static str {
        "mock"
    }
}

/// A mock SecretStore that tracks calls
#[derive(Clone, Default)]
pub struct MockSecretStore {
    secrets: Arc<Mutex<HashMap<String, String>>>,
    get_call_count: Arc<AtomicUsize>,
    failing: bool,
}

impl MockSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            failing: true,
            ..Self::default()
        }
    }

    /// Register or rotate a hostname's secret
    pub fn register(&self, hostname: &str, secret: &str) {
        self.secrets
            .lock()
            .unwrap()
            .insert(hostname.to_string(), secret.to_string());
    }

    /// Get the number of times get() was called
    pub fn get_call_count(&self) -> usize {
        self.get_call_count.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl SecretStore for MockSecretStore {
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRecord>> {
        self.get_call_count.fetch_add(1, Ordering::SeqCst);
        if self.failing {
            return Err(Error::secret_store("bucket unreachable"));
        }
        Ok(self.secrets.lock().unwrap().get(hostname).map(|secret| HostnameRecord {
            hostname: hostname.to_string(),
            secret: Secret::new(secret.clone()),
        }))
    }

    fn store_name(&self) -> &'static str {
        "mock"
    }
}

pub const HOSTNAME: &str = "ddns.fishare.de";
pub const SECRET: &str = "correct-horse-battery-staple";

pub fn ip(s: &str) -> IpAddr {
    s.parse().unwrap()
}

/// Build a service over the given doubles with default settings
pub fn service(store: &MockSecretStore, provider: &MockDnsProvider) -> UpdateService {
    service_with(ServiceConfig::default(), store, provider)
}

/// Build a service over the given doubles
pub fn service_with(
    config: ServiceConfig,
    store: &MockSecretStore,
    provider: &MockDnsProvider,
) -> UpdateService {
    UpdateService::new(&config, Arc::new(store.clone()), Arc::new(provider.clone()))
        .expect("service construction succeeds")
}

/// Query parameters as the HTTP layer would extract them
pub fn query(mode: Option<&str>, hostname: Option<&str>, hash: Option<&str>) -> UpdateQuery {
    UpdateQuery {
        mode: mode.map(str::to_string),
        hostname: hostname.map(str::to_string),
        hash: hash.map(str::to_string),
    }
}

/// A direct connection from `peer`
pub fn from(peer: &str) -> ConnectionMeta {
    ConnectionMeta::direct(ip(peer))
}
