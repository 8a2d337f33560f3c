// # ddns-core
//
// Core library for the DDNS update gateway.
//
// ## Architecture Overview
//
// A client (router, cron script) calls the gateway to learn or publish its
// public address:
//
// - **AddressResolver**: Caller address from connection metadata, honouring
//   forwarding headers only from allow-listed proxies
// - **Authenticator**: Constant-time credential check against a `SecretStore`
// - **UpdateService**: Mode dispatch (`get` / `set`) and request validation
// - **DnsMutator**: Read-compare-upsert against a `DnsProvider`
// - **ResponseFormatter**: Status token or JSON body plus HTTP status code
// - **ProviderRegistry**: Plugin-based construction of providers and stores
//
// ## Design Principles
//
// 1. **Stateless requests**: Nothing is cached between requests
// 2. **Transport-observed addresses**: No request parameter can choose the
//    address that gets written
// 3. **Fail fast**: No retries inside a request; clients own the retry schedule
// 4. **Library-First**: The binary only wires configuration to this crate

pub mod address;
pub mod auth;
pub mod config;
pub mod error;
pub mod hostname;
pub mod mutator;
pub mod registry;
pub mod response;
pub mod service;
pub mod store;
pub mod traits;

// Re-export core types for convenience
pub use address::{AddressResolver, ConnectionMeta, ProxyNet};
pub use auth::{AuthResult, Authenticator};
pub use config::{CredentialScheme, GatewayConfig, ProviderConfig, SecretStoreConfig, ServiceConfig};
pub use error::{Error, Result};
pub use mutator::{DnsMutator, MutateOutcome};
pub use registry::ProviderRegistry;
pub use response::{Format, FormattedResponse, ResponseFormatter};
pub use service::{Mode, UpdateQuery, UpdateRequest, UpdateResult, UpdateService, UpdateStatus};
pub use store::{FileSecretStore, MemorySecretStore};
pub use traits::{DnsProvider, RecordType, SecretStore};
