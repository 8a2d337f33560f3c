//! Request dispatch
//!
//! [`UpdateService`] turns one inbound request into one [`UpdateResult`]:
//!
//! 1. Parse the mode. Missing or unknown modes stop here, before any I/O.
//! 2. Resolve the caller address from connection metadata.
//! 3. `get`: answer with the address. No secret store or DNS access.
//! 4. `set`: validate the hostname, authenticate it, then upsert.
//!
//! The service holds no mutable state. Every request reads the secret store
//! afresh, so concurrent requests need no coordination.

use serde::Deserialize;
use std::net::IpAddr;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::address::{AddressResolver, ConnectionMeta};
use crate::auth::{AuthResult, Authenticator};
use crate::config::ServiceConfig;
use crate::error::{Error, Result};
use crate::hostname;
use crate::mutator::{DnsMutator, MutateOutcome};
use crate::traits::{DnsProvider, SecretStore};

/// Requested execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Report the caller's address
    Get,
    /// Point the hostname's record at the caller's address
    Set,
}

impl FromStr for Mode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "get" => Ok(Mode::Get),
            "set" => Ok(Mode::Set),
            other => Err(Error::invalid_request(format!(
                "Unknown mode '{}'. Supported: get, set",
                other
            ))),
        }
    }
}

/// Raw query parameters as they arrive on the wire
///
/// Every field is optional here; presence rules are enforced by
/// [`UpdateService::build_request`].
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateQuery {
    /// `get` or `set`
    #[serde(default)]
    pub mode: Option<String>,
    /// Target hostname (`set` only)
    #[serde(default)]
    pub hostname: Option<String>,
    /// Ownership credential (`set` only)
    #[serde(default)]
    pub hash: Option<String>,
}

/// A validated request
///
/// The caller address comes from the transport, never from a parameter.
#[derive(Clone, PartialEq, Eq)]
pub struct UpdateRequest {
    /// Execution mode
    pub mode: Mode,
    /// Normalized hostname, present for `set`
    pub hostname: Option<String>,
    /// Supplied credential; empty when the parameter was omitted
    pub credential: String,
    /// Resolved caller address
    pub caller: IpAddr,
}

impl std::fmt::Debug for UpdateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpdateRequest")
            .field("mode", &self.mode)
            .field("hostname", &self.hostname)
            .field("credential", &"<REDACTED>")
            .field("caller", &self.caller)
            .finish()
    }
}

/// Classification of a finished request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// `get` answered, or `set` wrote a new address
    Ok,
    /// `set` found the address already published
    NoChange,
    /// Credential missing or wrong
    Unauthorized,
    /// Hostname is not registered
    NotFound,
    /// Bad or missing mode, bad hostname, or no usable caller address
    InvalidRequest,
    /// Secret store or DNS provider failed
    ProviderError,
}

impl UpdateStatus {
    /// Whether the request succeeded
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateStatus::Ok | UpdateStatus::NoChange)
    }
}

/// Outcome of one request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateResult {
    /// Classification
    pub status: UpdateStatus,
    /// Caller address, reported on success only
    pub address: Option<IpAddr>,
}

impl UpdateResult {
    fn success(status: UpdateStatus, address: IpAddr) -> Self {
        Self {
            status,
            address: Some(address),
        }
    }

    fn failure(status: UpdateStatus) -> Self {
        Self {
            status,
            address: None,
        }
    }
}

/// Handles `get` and `set` requests
///
/// Built once at startup and shared behind an `Arc` by every request task.
#[derive(Debug, Clone)]
pub struct UpdateService {
    resolver: AddressResolver,
    authenticator: Authenticator,
    mutator: DnsMutator,
    zone: Option<String>,
}

impl UpdateService {
    /// Create the service from validated configuration and its collaborators
    ///
    /// # Errors
    ///
    /// Returns a configuration error if a trusted proxy CIDR or the zone
    /// name does not parse.
    pub fn new(
        config: &ServiceConfig,
        store: Arc<dyn SecretStore>,
        provider: Arc<dyn DnsProvider>,
    ) -> Result<Self> {
        let zone = config
            .zone_name
            .as_deref()
            .map(hostname::normalize)
            .transpose()
            .map_err(|e| Error::config(format!("Invalid zone name: {}", e)))?;

        Ok(Self {
            resolver: AddressResolver::from_config(config)?,
            authenticator: Authenticator::new(store, config.credential_scheme),
            mutator: DnsMutator::new(provider, config.record_ttl, config.provider_timeout()),
            zone,
        })
    }

    /// Handle one request end to end
    ///
    /// Never fails: every error is classified into the returned status.
    pub async fn handle(&self, query: &UpdateQuery, meta: &ConnectionMeta) -> UpdateResult {
        let request = match self.build_request(query, meta) {
            Ok(request) => request,
            Err(e) => {
                debug!(peer = %meta.peer, error = %e, "Rejected request");
                return UpdateResult::failure(e.status());
            }
        };

        let result = match self.dispatch(&request).await {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    mode = ?request.mode,
                    hostname = request.hostname.as_deref().unwrap_or("-"),
                    caller = %request.caller,
                    error = %e,
                    "Request failed"
                );
                UpdateResult::failure(e.status())
            }
        };

        info!(
            mode = ?request.mode,
            hostname = request.hostname.as_deref().unwrap_or("-"),
            caller = %request.caller,
            status = ?result.status,
            "Request handled"
        );
        result
    }

    /// Validate raw parameters into an [`UpdateRequest`]
    ///
    /// The mode is checked first so an invalid mode costs no further work.
    /// `hostname` and `hash` are ignored for `get`.
    pub fn build_request(&self, query: &UpdateQuery, meta: &ConnectionMeta) -> Result<UpdateRequest> {
        let mode: Mode = query
            .mode
            .as_deref()
            .ok_or_else(|| Error::invalid_request("Missing mode parameter"))?
            .parse()?;

        let caller = self.resolver.resolve(meta)?;

        let hostname = match mode {
            Mode::Get => None,
            Mode::Set => {
                let raw = query
                    .hostname
                    .as_deref()
                    .ok_or_else(|| Error::invalid_request("Missing hostname parameter"))?;
                let name = hostname::normalize(raw)?;
                if let Some(zone) = &self.zone {
                    if !hostname::is_within_zone(&name, zone) {
                        return Err(Error::invalid_request(format!(
                            "Hostname {} is outside zone {}",
                            name, zone
                        )));
                    }
                }
                Some(name)
            }
        };

        let credential = match mode {
            Mode::Get => String::new(),
            Mode::Set => query.hash.clone().unwrap_or_default(),
        };

        Ok(UpdateRequest {
            mode,
            hostname,
            credential,
            caller,
        })
    }

    /// Run a validated request
    ///
    /// # Returns
    ///
    /// - `Ok(UpdateResult)`: Any classified outcome, including failed auth
    /// - `Err(Error)`: Secret store or provider failure
    pub async fn dispatch(&self, request: &UpdateRequest) -> Result<UpdateResult> {
        let hostname = match (request.mode, request.hostname.as_deref()) {
            (Mode::Get, _) => return Ok(UpdateResult::success(UpdateStatus::Ok, request.caller)),
            (Mode::Set, Some(hostname)) => hostname,
            (Mode::Set, None) => return Err(Error::invalid_request("Missing hostname parameter")),
        };

        let auth = self
            .authenticator
            .authenticate(hostname, &request.credential, request.caller)
            .await?;

        match auth {
            AuthResult::Authenticated => {}
            AuthResult::Unauthorized => return Ok(UpdateResult::failure(UpdateStatus::Unauthorized)),
            AuthResult::NotFound => return Ok(UpdateResult::failure(UpdateStatus::NotFound)),
        }

        let status = match self.mutator.upsert(hostname, request.caller).await? {
            MutateOutcome::Updated { .. } => UpdateStatus::Ok,
            MutateOutcome::Unchanged => UpdateStatus::NoChange,
        };

        Ok(UpdateResult::success(status, request.caller))
    }
}
