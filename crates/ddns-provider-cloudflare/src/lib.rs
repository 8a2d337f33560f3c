// # Cloudflare DNS Provider
//
// This crate provides a Cloudflare DNS provider implementation for the DDNS
// update gateway.
//
// ## Behaviour
//
// - ✅ Reads the published A/AAAA record for a hostname
// - ✅ Upserts: PUT over an existing record, POST when none exists
// - ✅ Specific error handling for HTTP status codes (401/403, 404, 409, 429, 5xx)
// - ✅ Dry-run mode for safe testing
// - ✅ Zone auto-discovery and explicit zone ID
// - ❌ NO retry logic (clients own the retry schedule)
// - ✅ Zone ID discovered once and reused
// - ❌ NO record caching (every call observes the live zone)
// - ❌ NO background tasks
//
// ### Trust Level: Untrusted (DNS Provider)
//
// **Allowed Capabilities**:
// - ✅ Perform HTTP/HTTPS API calls to the Cloudflare API only
// - ✅ Parse provider-specific responses
//
// **Forbidden Capabilities**:
// - ❌ Spawn tasks or threads
// - ❌ Decide whether an update is needed (owned by `DnsMutator`)
// - ❌ Access the secret store
//
// ## Security Requirements
//
// - API token NEVER appears in logs or Debug output
// - Provider construction fails if the token is empty
//
// ## API Reference
//
// - Cloudflare API v4: https://developers.cloudflare.com/api/
// - List DNS Records: GET `/zones/:zone_id/dns_records?name=...&type=...`
// - Create DNS Record: POST `/zones/:zone_id/dns_records`
// - Overwrite DNS Record: PUT `/zones/:zone_id/dns_records/:record_id`
// - List Zones: GET `/zones?name=...`

use async_trait::async_trait;
use ddns_core::config::ProviderConfig;
use ddns_core::hostname;
use ddns_core::traits::{DnsProvider, DnsProviderFactory, RecordType};
use ddns_core::{Error, Result};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Cloudflare API base URL
const CLOUDFLARE_API_BASE: &str = "https://api.cloudflare.com/client/v4";

/// Default HTTP timeout for API requests
///
/// The gateway wraps each request in its own, shorter deadline; this only
/// bounds a single call made outside of it.
const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Envelope around every Cloudflare v4 response
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    #[serde(default)]
    errors: Vec<ApiMessage>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct Zone {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DnsRecord {
    id: String,
    content: String,
}

/// Cloudflare DNS provider
///
/// # Dry-Run Mode
///
/// When `dry_run` is true, the provider will:
/// - Perform all GET requests (zone lookup, record lookup)
/// - Log the intended PUT/POST payload
/// - **NOT** modify DNS records
pub struct CloudflareProvider {
    /// Cloudflare API token
    /// ⚠️ NEVER log this value
    api_token: String,

    /// Zone ID (optional, discovered when absent)
    zone_id: Option<String>,

    /// Zone apex; limits managed records and drives zone discovery
    zone_name: Option<String>,

    /// API base URL without trailing slash
    api_base: String,

    /// HTTP client for API requests
    client: reqwest::Client,

    /// Dry-run mode: perform reads, skip writes
    dry_run: bool,

    /// Zone IDs discovered by zone name
    discovered_zones: RwLock<HashMap<String, String>>,
}

// Custom Debug implementation that hides the API token
impl std::fmt::Debug for CloudflareProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareProvider")
            .field("api_token", &"<REDACTED>")
            .field("zone_id", &self.zone_id)
            .field("zone_name", &self.zone_name)
            .field("api_base", &self.api_base)
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl CloudflareProvider {
    /// Create a new Cloudflare provider
    ///
    /// # Parameters
    ///
    /// - `api_token`: Cloudflare API token with Zone:DNS:Edit permissions
    /// - `zone_id`: Optional zone ID (discovered from `zone_name` when absent)
    /// - `zone_name`: Optional zone apex
    /// - `api_base`: Optional API base URL override
    /// - `dry_run`: If true, perform GET requests but skip writes
    ///
    /// # Errors
    ///
    /// - Empty API token or unparseable zone name: `Error::Config`
    /// - HTTP client construction failure: `Error::Http`
    pub fn new(
        api_token: impl Into<String>,
        zone_id: Option<String>,
        zone_name: Option<String>,
        api_base: Option<String>,
        dry_run: bool,
    ) -> Result<Self> {
        let api_token = api_token.into();
        if api_token.is_empty() {
            return Err(Error::config("Cloudflare API token cannot be empty"));
        }

        let zone_name = zone_name
            .as_deref()
            .map(hostname::normalize)
            .transpose()
            .map_err(|e| Error::config(format!("Invalid Cloudflare zone name: {}", e)))?;

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_HTTP_TIMEOUT)
            .build()
            .map_err(|e| Error::http(format!("Failed to build HTTP client: {}", e)))?;

        let api_base = api_base
            .unwrap_or_else(|| CLOUDFLARE_API_BASE.to_string())
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            api_token,
            zone_id,
            zone_name,
            api_base,
            client,
            dry_run,
            discovered_zones: RwLock::new(HashMap::new()),
        })
    }

    /// Resolve the configured zone ID once
    ///
    /// With an explicit zone ID nothing is fetched. With only a zone name the
    /// ID is looked up now and reused by every later call. Without either,
    /// zones are discovered per record name on first use.
    pub async fn resolve_zone(&self) -> Result<Option<String>> {
        if let Some(zone_id) = &self.zone_id {
            return Ok(Some(zone_id.clone()));
        }
        match &self.zone_name {
            Some(zone) => self.get_zone_id(zone).await.map(Some),
            None => Ok(None),
        }
    }

    /// Zone that owns `record_name`
    ///
    /// Uses the configured zone ID if present. Otherwise looks the zone up
    /// by the configured zone name, falling back to the record's last two
    /// labels. A zone is fetched at most once; later calls hit the cache.
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones?name=example.com
    /// Authorization: Bearer <token>
    /// ```
    async fn get_zone_id(&self, record_name: &str) -> Result<String> {
        if let Some(zone_id) = &self.zone_id {
            return Ok(zone_id.clone());
        }

        let zone_name = match &self.zone_name {
            Some(zone) => zone.clone(),
            None => {
                let labels: Vec<&str> = record_name.split('.').collect();
                if labels.len() < 2 {
                    return Err(Error::config(format!("Invalid domain name: {}", record_name)));
                }
                labels[labels.len() - 2..].join(".")
            }
        };

        let cached = self
            .discovered_zones
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&zone_name)
            .cloned();
        if let Some(zone_id) = cached {
            return Ok(zone_id);
        }

        tracing::debug!("Looking up zone ID for domain: {}", zone_name);

        let url = format!("{}/zones", self.api_base);
        let zones: Vec<Zone> = self
            .call(self.client.get(&url).query(&[("name", zone_name.as_str())]), "Zone lookup")
            .await?;

        let zone = zones
            .into_iter()
            .next()
            .ok_or_else(|| Error::not_found(format!("Zone not found: {}", zone_name)))?;

        tracing::debug!("Found zone ID: {}", zone.id);
        self.discovered_zones
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(zone_name, zone.id.clone());
        Ok(zone.id)
    }

    /// List records of one name and type
    ///
    /// # API Call
    ///
    /// ```http
    /// GET /zones/:zone_id/dns_records?name=ddns.example.com&type=A
    /// Authorization: Bearer <token>
    /// ```
    async fn list_records(
        &self,
        zone_id: &str,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Vec<DnsRecord>> {
        let url = format!("{}/zones/{}/dns_records", self.api_base, zone_id);
        self.call(
            self.client
                .get(&url)
                .query(&[("name", record_name), ("type", record_type.as_str())]),
            "Record lookup",
        )
        .await
    }

    /// Send a request and decode the `result` of the Cloudflare envelope
    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        context: &str,
    ) -> Result<T> {
        let response = request
            .bearer_auth(&self.api_token)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    Error::timeout(format!("{}: Cloudflare did not answer: {}", context, e))
                } else {
                    Error::provider("cloudflare", format!("HTTP request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());
            return Err(map_status(status.as_u16(), &error_text, context));
        }

        let envelope: ApiResponse<T> = response.json().await.map_err(|e| {
            Error::provider("cloudflare", format!("Failed to parse response: {}", e))
        })?;

        if !envelope.success {
            let errors = envelope
                .errors
                .iter()
                .map(|e| format!("{} ({})", e.message, e.code))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(Error::provider(
                "cloudflare",
                format!("{} rejected: {}", context, errors),
            ));
        }

        envelope.result.ok_or_else(|| {
            Error::provider("cloudflare", format!("{}: response has no result", context))
        })
    }
}

/// Map a non-success HTTP status to an error
fn map_status(status: u16, body: &str, context: &str) -> Error {
    match status {
        401 | 403 => Error::provider(
            "cloudflare",
            format!(
                "Authentication failed: Invalid API token or insufficient permissions. Status: {}",
                status
            ),
        ),
        404 => Error::not_found(format!("{}: zone or record not found", context)),
        409 => Error::provider(
            "cloudflare",
            format!("Conflict: Record is being updated by another process. Status: {}", status),
        ),
        429 => Error::rate_limited(format!("Cloudflare rate limit exceeded. Status: {}", status)),
        500..=599 => Error::provider(
            "cloudflare",
            format!("Cloudflare server error (transient): {} - {}", status, body),
        ),
        _ => Error::provider(
            "cloudflare",
            format!("{} failed: {} - {}", context, status, body),
        ),
    }
}

/// Only the first of several same-type records is read and overwritten
fn warn_duplicates(records: &[DnsRecord], record_name: &str, record_type: RecordType) {
    if records.len() > 1 {
        tracing::warn!(
            hostname = %record_name,
            record_type = %record_type,
            count = records.len(),
            "Zone holds duplicate records; only the first ({}) is managed",
            records[0].id
        );
    }
}

#[async_trait]
impl DnsProvider for CloudflareProvider {
    async fn prepare(&self) -> Result<()> {
        if let Some(zone_id) = self.resolve_zone().await? {
            tracing::info!("Cloudflare zone ID: {}", zone_id);
        }
        Ok(())
    }

    async fn current_record(
        &self,
        record_name: &str,
        record_type: RecordType,
    ) -> Result<Option<IpAddr>> {
        let zone_id = self.get_zone_id(record_name).await?;
        let records = self.list_records(&zone_id, record_name, record_type).await?;
        warn_duplicates(&records, record_name, record_type);

        match records.first() {
            Some(record) => {
                let ip = record.content.parse::<IpAddr>().map_err(|e| {
                    Error::provider("cloudflare", format!("Invalid IP in response: {}", e))
                })?;
                Ok(Some(ip))
            }
            None => Ok(None),
        }
    }

    /// Create or overwrite the record
    ///
    /// ```http
    /// # Overwrite when a record exists (skipped in dry-run mode)
    /// PUT /zones/:zone_id/dns_records/:record_id
    /// # Create otherwise (skipped in dry-run mode)
    /// POST /zones/:zone_id/dns_records
    /// {"type": "A", "name": "...", "content": "1.2.3.4", "ttl": 60, "proxied": false}
    /// ```
    async fn upsert_record(&self, record_name: &str, ip: IpAddr, ttl: u32) -> Result<()> {
        let record_type = RecordType::for_addr(&ip);

        tracing::info!(
            "Upserting Cloudflare DNS record: {} -> {} ({}) [mode: {}]",
            record_name,
            ip,
            record_type,
            if self.dry_run { "DRY-RUN" } else { "LIVE" }
        );

        let zone_id = self.get_zone_id(record_name).await?;
        // Listed again rather than trusting a record ID seen earlier: the
        // record may have been replaced since the caller's read.
        let existing = self.list_records(&zone_id, record_name, record_type).await?;
        warn_duplicates(&existing, record_name, record_type);

        let payload = serde_json::json!({
            "type": record_type.as_str(),
            "name": record_name,
            "content": ip.to_string(),
            "ttl": ttl,
            "proxied": false,
        });

        let collection = format!("{}/zones/{}/dns_records", self.api_base, zone_id);
        let request = match existing.first() {
            Some(record) => {
                let url = format!("{}/{}", collection, record.id);
                if self.dry_run {
                    tracing::info!("[DRY-RUN] Would send PUT request to {} with payload: {}", url, payload);
                    return Ok(());
                }
                self.client.put(url)
            }
            None => {
                if self.dry_run {
                    tracing::info!(
                        "[DRY-RUN] Would send POST request to {} with payload: {}",
                        collection,
                        payload
                    );
                    return Ok(());
                }
                self.client.post(collection.as_str())
            }
        };

        let _: serde_json::Value = self.call(request.json(&payload), "Record upsert").await?;

        tracing::info!("DNS record upserted successfully: {} -> {}", record_name, ip);
        Ok(())
    }

    fn supports_record(&self, record_name: &str) -> bool {
        match &self.zone_name {
            Some(zone) => hostname::is_within_zone(record_name, zone),
            None => record_name.contains('.') && record_name.len() <= 253,
        }
    }

    fn provider_name(&self) -> &'static str {
        "cloudflare"
    }
}

/// Factory for creating Cloudflare providers
pub struct CloudflareFactory;

impl DnsProviderFactory for CloudflareFactory {
    fn create(&self, config: &ProviderConfig) -> Result<Box<dyn DnsProvider>> {
        match config {
            ProviderConfig::Cloudflare {
                api_token,
                zone_id,
                zone_name,
                api_base,
                dry_run,
            } => {
                if *dry_run {
                    tracing::warn!("Cloudflare provider running in DRY-RUN mode - no changes will be made");
                }

                Ok(Box::new(CloudflareProvider::new(
                    api_token.clone(),
                    zone_id.clone(),
                    zone_name.clone(),
                    api_base.clone(),
                    *dry_run,
                )?))
            }
            _ => Err(Error::config("Invalid config for Cloudflare provider")),
        }
    }
}

/// Register the Cloudflare provider with a registry
///
/// # Example
///
/// ```rust
/// use ddns_core::ProviderRegistry;
///
/// let registry = ProviderRegistry::new();
/// ddns_provider_cloudflare::register(&registry);
/// assert!(registry.has_provider("cloudflare"));
/// ```
pub fn register(registry: &ddns_core::ProviderRegistry) {
    registry.register_provider("cloudflare", Box::new(CloudflareFactory));
}
