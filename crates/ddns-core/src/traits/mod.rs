//! Core traits for the DDNS update gateway
//!
//! This module defines the abstract interfaces to the two external
//! collaborators the gateway depends on.
//!
//! - [`SecretStore`]: Read-only lookup of per-hostname secrets
//! - [`DnsProvider`]: Read and upsert address records at the authoritative provider

pub mod dns_provider;
pub mod secret_store;

pub use dns_provider::{DnsProvider, DnsProviderFactory, RecordType};
pub use secret_store::{HostnameRecord, Secret, SecretStore, SecretStoreFactory};
