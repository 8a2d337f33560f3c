// # HTTP Secret Store
//
// This crate provides a SecretStore that reads hostname secrets from an
// HTTP object store (an S3-style bucket, or any server that maps a path to
// a blob).
//
// ## Layout
//
// One object per registered hostname:
//
// ```text
// GET <url>/<key_prefix><hostname>
// ```
//
// | Response | Meaning |
// |---|---|
// | 200 | Body (trimmed) is the secret |
// | 404 | Hostname is not registered |
// | anything else | Store error |
//
// ## Trust Level: Trusted, Read-Only
//
// - ✅ One GET per lookup, optionally with a bearer token
// - ❌ NO caching (rotation takes effect on the next request)
// - ❌ NO writes

use async_trait::async_trait;
use ddns_core::config::SecretStoreConfig;
use ddns_core::traits::{HostnameRecord, Secret, SecretStore, SecretStoreFactory};
use ddns_core::{Error, Result};
use std::time::Duration;

/// Secret store backed by an HTTP object store
pub struct HttpSecretStore {
    /// Base URL without trailing slash
    base_url: String,

    /// Prefix prepended to the hostname to form the object key
    key_prefix: String,

    /// Optional bearer token
    /// ⚠️ NEVER log this value
    bearer_token: Option<String>,

    /// HTTP client for object reads
    client: reqwest::Client,
}

// Custom Debug implementation that hides the bearer token
impl std::fmt::Debug for HttpSecretStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpSecretStore")
            .field("base_url", &self.base_url)
            .field("key_prefix", &self.key_prefix)
            .field("bearer_token", &self.bearer_token.as_ref().map(|_| "<REDACTED>"))
            .finish()
    }
}

impl HttpSecretStore {
    /// Create a new HTTP secret store
    ///
    /// # Parameters
    ///
    /// - `base_url`: Bucket or endpoint URL (e.g., "https://secrets.example.com/ddns")
    /// - `key_prefix`: Prefix prepended to every hostname
    /// - `bearer_token`: Optional token sent as `Authorization: Bearer`
    /// - `timeout`: Per-read timeout
    pub fn new(
        base_url: impl Into<String>,
        key_prefix: impl Into<String>,
        bearer_token: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        if !base_url.starts_with("https://") && !base_url.starts_with("http://") {
            return Err(Error::config(format!(
                "Secret store URL must use HTTP or HTTPS scheme. Got: {}",
                base_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url,
            key_prefix: key_prefix.into(),
            bearer_token,
            client,
        })
    }

    /// Object URL for `hostname`
    fn object_url(&self, hostname: &str) -> String {
        format!("{}/{}{}", self.base_url, self.key_prefix, hostname)
    }
}

#[async_trait]
impl SecretStore for HttpSecretStore {
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRecord>> {
        if hostname.is_empty() || hostname.contains(['/', '?', '#']) {
            return Err(Error::invalid_request(format!(
                "Hostname cannot be used as an object key: '{}'",
                hostname
            )));
        }

        let url = self.object_url(hostname);
        let mut request = self.client.get(&url);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                Error::timeout(format!("Secret store did not answer: {}", e))
            } else {
                Error::secret_store(format!("Request failed: {}", e))
            }
        })?;

        match response.status().as_u16() {
            200 => {
                let body = response
                    .text()
                    .await
                    .map_err(|e| Error::secret_store(format!("Failed to read object: {}", e)))?;
                Ok(Some(HostnameRecord {
                    hostname: hostname.to_string(),
                    secret: Secret::new(body.trim()),
                }))
            }
            404 => {
                tracing::debug!("No secret object for {}", hostname);
                Ok(None)
            }
            status => Err(Error::secret_store(format!(
                "Unexpected status {} reading secret object for {}",
                status, hostname
            ))),
        }
    }

    fn store_name(&self) -> &'static str {
        "http"
    }
}

/// Factory for creating HTTP secret stores
pub struct HttpSecretStoreFactory;

impl SecretStoreFactory for HttpSecretStoreFactory {
    fn create(&self, config: &SecretStoreConfig) -> Result<Box<dyn SecretStore>> {
        match config {
            SecretStoreConfig::Http {
                url,
                key_prefix,
                bearer_token,
                timeout_secs,
            } => Ok(Box::new(HttpSecretStore::new(
                url.clone(),
                key_prefix.clone(),
                bearer_token.clone(),
                Duration::from_secs(*timeout_secs),
            )?)),
            _ => Err(Error::config("Invalid config for HTTP secret store")),
        }
    }
}

/// Register the HTTP secret store with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::with_builtin_stores();
/// ddns_secret_http::register(&registry);
/// assert!(registry.has_secret_store("http"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_secret_store("http", Box::new(HttpSecretStoreFactory));
}
