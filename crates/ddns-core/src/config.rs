//! Configuration types for the DDNS update gateway
//!
//! All configuration is built once at process start, validated, and then
//! shared read-only with every request handler.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

use crate::address::ProxyNet;
use crate::hostname;

/// Default record TTL in seconds (short, favors fast convergence)
pub const DEFAULT_RECORD_TTL: u32 = 60;

/// Default deadline for one provider round trip, in seconds
pub const DEFAULT_PROVIDER_TIMEOUT_SECS: u64 = 5;

/// Header a trusted proxy uses to report the original client address
pub const DEFAULT_FORWARDED_HEADER: &str = "x-forwarded-for";

/// Main gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Request handling settings
    #[serde(default)]
    pub service: ServiceConfig,

    /// DNS provider configuration
    pub provider: ProviderConfig,

    /// Secret store configuration
    pub secret_store: SecretStoreConfig,
}

impl GatewayConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        self.service.validate()?;
        self.provider.validate()?;
        self.secret_store.validate()?;

        Ok(())
    }
}

/// How the `hash` request parameter proves ownership of a hostname
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialScheme {
    /// `hash` is the stored secret itself
    #[default]
    Shared,
    /// `hash` is hex SHA-256 of caller address, hostname and secret concatenated
    Sha256,
}

impl std::str::FromStr for CredentialScheme {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "shared" => Ok(CredentialScheme::Shared),
            "sha256" => Ok(CredentialScheme::Sha256),
            other => Err(crate::Error::config(format!(
                "Unknown credential scheme '{}'. Supported: shared, sha256",
                other
            ))),
        }
    }
}

/// Request handling settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Zone apex; when set, only hostnames inside it may be updated
    #[serde(default)]
    pub zone_name: Option<String>,

    /// TTL written on every upserted record (seconds)
    #[serde(default = "default_record_ttl")]
    pub record_ttl: u32,

    /// Deadline for the provider calls of a single request (seconds)
    #[serde(default = "default_provider_timeout_secs")]
    pub provider_timeout_secs: u64,

    /// Upstream hops allowed to assert the caller address, as CIDRs
    #[serde(default)]
    pub trusted_proxies: Vec<String>,

    /// Header honoured when the peer is a trusted proxy
    #[serde(default = "default_forwarded_header")]
    pub forwarded_header: String,

    /// Credential check applied to `set` requests
    #[serde(default)]
    pub credential_scheme: CredentialScheme,

    /// Report unknown hostnames as 404 instead of folding them into 401
    ///
    /// Off by default: revealing which hostnames exist allows enumeration.
    #[serde(default)]
    pub reveal_unknown_hostnames: bool,
}

impl ServiceConfig {
    /// Validate the service configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        if !(1..=86_400).contains(&self.record_ttl) {
            return Err(crate::Error::config(format!(
                "Record TTL must be between 1 and 86400 seconds. Got: {}",
                self.record_ttl
            )));
        }

        if !(1..=60).contains(&self.provider_timeout_secs) {
            return Err(crate::Error::config(format!(
                "Provider timeout must be between 1 and 60 seconds. Got: {}",
                self.provider_timeout_secs
            )));
        }

        if self.forwarded_header.is_empty()
            || !self
                .forwarded_header
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
        {
            return Err(crate::Error::config(format!(
                "Forwarded header name is not a valid header name: '{}'",
                self.forwarded_header
            )));
        }

        for cidr in &self.trusted_proxies {
            cidr.parse::<ProxyNet>()?;
        }

        if let Some(zone) = &self.zone_name {
            hostname::normalize(zone).map_err(|e| {
                crate::Error::config(format!("Invalid zone name '{}': {}", zone, e))
            })?;
        }

        Ok(())
    }

    /// Provider deadline as a Duration
    pub fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.provider_timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            zone_name: None,
            record_ttl: default_record_ttl(),
            provider_timeout_secs: default_provider_timeout_secs(),
            trusted_proxies: Vec::new(),
            forwarded_header: default_forwarded_header(),
            credential_scheme: CredentialScheme::default(),
            reveal_unknown_hostnames: false,
        }
    }
}

/// DNS provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// Cloudflare provider
    Cloudflare {
        /// Cloudflare API token
        api_token: String,
        /// Zone ID (optional, discovered from the zone name when absent)
        zone_id: Option<String>,
        /// Zone apex used for zone discovery
        #[serde(default)]
        zone_name: Option<String>,
        /// API base URL override
        #[serde(default)]
        api_base: Option<String>,
        /// Perform reads, log writes instead of sending them
        #[serde(default)]
        dry_run: bool,
    },

    /// Custom provider
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl ProviderConfig {
    /// Validate the provider configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            ProviderConfig::Cloudflare { api_token, .. } => {
                if api_token.is_empty() {
                    return Err(crate::Error::config("Cloudflare API token cannot be empty"));
                }
                Ok(())
            }
            ProviderConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom provider factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom provider config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the provider type name
    pub fn type_name(&self) -> &str {
        match self {
            ProviderConfig::Cloudflare { .. } => "cloudflare",
            ProviderConfig::Custom { factory, .. } => factory,
        }
    }
}

/// Secret store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SecretStoreConfig {
    /// Directory holding one file per hostname
    File {
        /// Directory path
        path: String,
        /// Prefix prepended to the hostname to form the file name
        #[serde(default)]
        key_prefix: String,
    },

    /// HTTP object store (`GET <url>/<key_prefix><hostname>`)
    Http {
        /// Base URL of the bucket or object endpoint
        url: String,
        /// Prefix prepended to the hostname to form the object key
        #[serde(default)]
        key_prefix: String,
        /// Optional bearer token sent with every read
        #[serde(default)]
        bearer_token: Option<String>,
        /// Per-read timeout (seconds)
        #[serde(default = "default_store_timeout_secs")]
        timeout_secs: u64,
    },

    /// In-memory secrets (development only, not persistent)
    Memory {
        /// Hostname to secret map
        #[serde(default)]
        secrets: HashMap<String, String>,
    },

    /// Custom secret store
    Custom {
        /// Factory name to use
        factory: String,
        /// Custom configuration data
        config: serde_json::Value,
    },
}

impl SecretStoreConfig {
    /// Validate the secret store configuration
    pub fn validate(&self) -> Result<(), crate::Error> {
        match self {
            SecretStoreConfig::File { path, key_prefix } => {
                if path.is_empty() {
                    return Err(crate::Error::config("Secret store path cannot be empty"));
                }
                validate_key_prefix(key_prefix)
            }
            SecretStoreConfig::Http {
                url,
                key_prefix,
                timeout_secs,
                ..
            } => {
                if !url.starts_with("https://") && !url.starts_with("http://") {
                    return Err(crate::Error::config(format!(
                        "Secret store URL must use HTTP or HTTPS scheme. Got: {}",
                        url
                    )));
                }
                if !(1..=60).contains(timeout_secs) {
                    return Err(crate::Error::config(format!(
                        "Secret store timeout must be between 1 and 60 seconds. Got: {}",
                        timeout_secs
                    )));
                }
                validate_key_prefix(key_prefix)
            }
            SecretStoreConfig::Memory { .. } => Ok(()),
            SecretStoreConfig::Custom { factory, config } => {
                if factory.is_empty() {
                    return Err(crate::Error::config(
                        "Custom secret store factory cannot be empty",
                    ));
                }
                if config.is_null() {
                    return Err(crate::Error::config(
                        "Custom secret store config cannot be null",
                    ));
                }
                Ok(())
            }
        }
    }

    /// Get the store type name
    pub fn type_name(&self) -> &str {
        match self {
            SecretStoreConfig::File { .. } => "file",
            SecretStoreConfig::Http { .. } => "http",
            SecretStoreConfig::Memory { .. } => "memory",
            SecretStoreConfig::Custom { factory, .. } => factory,
        }
    }
}

// A prefix may contain path separators (object "folders"), never a parent reference.
fn validate_key_prefix(prefix: &str) -> Result<(), crate::Error> {
    if prefix.split('/').any(|segment| segment == "..") {
        return Err(crate::Error::config(format!(
            "Secret key prefix cannot contain '..': {}",
            prefix
        )));
    }
    Ok(())
}

fn default_record_ttl() -> u32 {
    DEFAULT_RECORD_TTL
}

fn default_provider_timeout_secs() -> u64 {
    DEFAULT_PROVIDER_TIMEOUT_SECS
}

fn default_forwarded_header() -> String {
    DEFAULT_FORWARDED_HEADER.to_string()
}

fn default_store_timeout_secs() -> u64 {
    5
}
