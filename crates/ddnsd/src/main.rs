// # ddnsd - DDNS Update Gateway
//
// The ddnsd daemon is a thin integration layer over ddns-core. It is
// responsible for:
// 1. Reading configuration from environment variables
// 2. Initializing logging and the runtime
// 3. Registering DNS providers and secret stores
// 4. Serving the update endpoint until SIGTERM/SIGINT
//
// Request handling (addressing, authentication, DNS mutation) lives in
// ddns-core; this crate only translates HTTP to and from it.
//
// ## Configuration
//
// All configuration is done via environment variables:
//
// ### Listener
// - `DDNS_LISTEN_ADDR`: Socket to bind (default 0.0.0.0:8080)
// - `DDNS_TRUSTED_PROXIES`: Comma-separated CIDRs allowed to forward the caller address
// - `DDNS_FORWARDED_HEADER`: Header read from trusted proxies (default x-forwarded-for)
//
// ### DNS Provider
// - `DDNS_PROVIDER_TYPE`: Provider type (cloudflare)
// - `DDNS_PROVIDER_API_TOKEN`: API token
// - `DDNS_PROVIDER_ZONE_ID`: Zone ID (optional, discovered from the zone name)
// - `DDNS_PROVIDER_API_BASE`: API base URL override
// - `DDNS_ZONE_NAME`: Zone apex; hostnames outside it are rejected
// - `DDNS_MODE`: `dry-run` logs provider writes instead of sending them
//
// ### Secret Store
// - `DDNS_SECRET_STORE_TYPE`: Type of secret store (file, http, memory)
// - `DDNS_SECRET_STORE_PATH`: Secrets directory (for file)
// - `DDNS_SECRET_STORE_URL`: Base URL (for http)
// - `DDNS_SECRET_STORE_TOKEN`: Bearer token (for http, optional)
// - `DDNS_SECRET_KEY_PREFIX`: Prefix prepended to the hostname to form the key
//
// ### Updates
// - `DDNS_RECORD_TTL`: TTL written on records (default 60)
// - `DDNS_PROVIDER_TIMEOUT_SECS`: Deadline for provider calls (default 5)
// - `DDNS_CREDENTIAL_SCHEME`: shared or sha256 (default shared)
// - `DDNS_REVEAL_UNKNOWN_HOSTNAMES`: Answer 404 for unknown hostnames (default false)
//
// ## Example
//
// ```bash
// export DDNS_PROVIDER_API_TOKEN=...
// export DDNS_ZONE_NAME=fishare.de
// export DDNS_SECRET_STORE_TYPE=file
// export DDNS_SECRET_STORE_PATH=/var/lib/ddns/secrets
//
// ddnsd
// ```

mod server;

use anyhow::Result;
use ddns_core::{
    CredentialScheme, DnsProvider, GatewayConfig, ProviderConfig, ProviderRegistry,
    ResponseFormatter, SecretStoreConfig, ServiceConfig, UpdateService,
};
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::process::ExitCode;
use std::str::FromStr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{Level, error, info, warn};
use tracing_subscriber::FmtSubscriber;

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:8080";

/// Exit codes for different termination scenarios
///
/// These codes follow systemd conventions:
/// - 0: Clean shutdown
/// - 1: Configuration or startup error
/// - 2: Runtime error (unexpected)
#[derive(Debug, Clone, Copy)]
enum DdnsExitCode {
    /// Clean shutdown (normal exit)
    CleanShutdown = 0,
    /// Configuration error or startup failure
    ConfigError = 1,
    /// Runtime error (unexpected failure)
    RuntimeError = 2,
}

impl From<DdnsExitCode> for ExitCode {
    fn from(code: DdnsExitCode) -> Self {
        ExitCode::from(code as u8)
    }
}

/// Application configuration
struct Config {
    listen_addr: SocketAddr,
    log_level: String,
    gateway: GatewayConfig,
}

impl Config {
    /// Load configuration from environment variables
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through `lookup`, which maps a variable name to its value
    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let listen_addr = var("DDNS_LISTEN_ADDR").unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());
        let listen_addr = listen_addr.parse::<SocketAddr>().map_err(|e| {
            anyhow::anyhow!("DDNS_LISTEN_ADDR '{}' is not a socket address: {}", listen_addr, e)
        })?;

        let zone_name = var("DDNS_ZONE_NAME");
        let defaults = ServiceConfig::default();

        let service = ServiceConfig {
            zone_name: zone_name.clone(),
            record_ttl: parse_or(&var, "DDNS_RECORD_TTL", defaults.record_ttl)?,
            provider_timeout_secs: parse_or(
                &var,
                "DDNS_PROVIDER_TIMEOUT_SECS",
                defaults.provider_timeout_secs,
            )?,
            trusted_proxies: var("DDNS_TRUSTED_PROXIES")
                .unwrap_or_default()
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            forwarded_header: var("DDNS_FORWARDED_HEADER")
                .map(|h| h.trim().to_ascii_lowercase())
                .unwrap_or(defaults.forwarded_header),
            credential_scheme: match var("DDNS_CREDENTIAL_SCHEME") {
                Some(scheme) => CredentialScheme::from_str(&scheme)
                    .map_err(|e| anyhow::anyhow!("DDNS_CREDENTIAL_SCHEME: {}", e))?,
                None => defaults.credential_scheme,
            },
            reveal_unknown_hostnames: parse_or(&var, "DDNS_REVEAL_UNKNOWN_HOSTNAMES", false)?,
        };

        let dry_run = match var("DDNS_MODE").as_deref() {
            None => false,
            Some("dry-run") => true,
            Some(other) => anyhow::bail!(
                "DDNS_MODE '{}' is not supported. Supported modes: dry-run",
                other
            ),
        };

        let provider_type = var("DDNS_PROVIDER_TYPE").unwrap_or_else(|| "cloudflare".to_string());
        let provider = match provider_type.as_str() {
            "cloudflare" => ProviderConfig::Cloudflare {
                api_token: var("DDNS_PROVIDER_API_TOKEN").ok_or_else(|| {
                    anyhow::anyhow!(
                        "DDNS_PROVIDER_API_TOKEN is required. \
                        Set it via: export DDNS_PROVIDER_API_TOKEN=<token>"
                    )
                })?,
                zone_id: var("DDNS_PROVIDER_ZONE_ID"),
                zone_name,
                api_base: var("DDNS_PROVIDER_API_BASE"),
                dry_run,
            },
            other => anyhow::bail!(
                "DDNS_PROVIDER_TYPE '{}' is not supported. \
                Supported providers: cloudflare",
                other
            ),
        };

        let key_prefix = var("DDNS_SECRET_KEY_PREFIX").unwrap_or_default();
        let store_type = var("DDNS_SECRET_STORE_TYPE").unwrap_or_else(|| "file".to_string());
        let secret_store = match store_type.as_str() {
            "file" => SecretStoreConfig::File {
                path: var("DDNS_SECRET_STORE_PATH").ok_or_else(|| {
                    anyhow::anyhow!(
                        "DDNS_SECRET_STORE_PATH is required when DDNS_SECRET_STORE_TYPE=file. \
                        Set it via: export DDNS_SECRET_STORE_PATH=/var/lib/ddns/secrets"
                    )
                })?,
                key_prefix,
            },
            "http" => SecretStoreConfig::Http {
                url: var("DDNS_SECRET_STORE_URL").ok_or_else(|| {
                    anyhow::anyhow!(
                        "DDNS_SECRET_STORE_URL is required when DDNS_SECRET_STORE_TYPE=http"
                    )
                })?,
                key_prefix,
                bearer_token: var("DDNS_SECRET_STORE_TOKEN"),
                timeout_secs: parse_or(&var, "DDNS_SECRET_STORE_TIMEOUT_SECS", 5)?,
            },
            "memory" => SecretStoreConfig::Memory {
                secrets: HashMap::new(),
            },
            other => anyhow::bail!(
                "DDNS_SECRET_STORE_TYPE '{}' is not supported. \
                Supported types: file, http, memory",
                other
            ),
        };

        Ok(Self {
            listen_addr,
            log_level: var("DDNS_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            gateway: GatewayConfig {
                service,
                provider,
                secret_store,
            },
        })
    }

    /// Validate the configuration
    ///
    /// Typed checks (ranges, CIDRs, URL schemes) are delegated to
    /// `GatewayConfig::validate`; this adds the checks that only make sense
    /// for operator-supplied environment values.
    fn validate(&self) -> Result<()> {
        self.gateway
            .validate()
            .map_err(|e| anyhow::anyhow!("{}", e))?;

        if let ProviderConfig::Cloudflare { api_token, .. } = &self.gateway.provider {
            // Check for obvious placeholder tokens (common mistake)
            let token_lower = api_token.to_lowercase();
            if token_lower.contains("your_token")
                || token_lower.contains("replace_me")
                || token_lower == "token"
            {
                anyhow::bail!(
                    "DDNS_PROVIDER_API_TOKEN appears to be a placeholder. \
                    Use an actual API token from your DNS provider."
                );
            }
        }

        if let SecretStoreConfig::File { path, .. } = &self.gateway.secret_store
            && !std::path::Path::new(path).is_dir()
        {
            anyhow::bail!(
                "DDNS_SECRET_STORE_PATH is not a directory: {}. \
                Create it first: sudo mkdir -p {}",
                path,
                path
            );
        }

        match self.log_level.to_lowercase().as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!(
                "DDNS_LOG_LEVEL '{}' is not valid. \
                Valid levels: trace, debug, info, warn, error",
                self.log_level
            ),
        }

        Ok(())
    }
}

/// Parse an optional variable, falling back to `default` when unset
fn parse_or<T>(var: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} '{}' is not valid: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn main() -> ExitCode {
    // Load configuration from environment
    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            return DdnsExitCode::ConfigError.into();
        }
    };

    if let Err(e) = config.validate() {
        eprintln!("Configuration validation error: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    let log_level = match config.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(log_level).finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
        return DdnsExitCode::ConfigError.into();
    }

    info!("Starting ddnsd");

    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            error!("Failed to create tokio runtime: {}", e);
            return DdnsExitCode::RuntimeError.into();
        }
    };

    rt.block_on(async {
        // Startup failures (registry, bind) are configuration problems
        let (listener, state) = match prepare(&config).await {
            Ok(prepared) => prepared,
            Err(e) => {
                error!("Startup error: {}", e);
                return DdnsExitCode::ConfigError;
            }
        };

        match run_daemon(listener, state).await {
            Ok(()) => DdnsExitCode::CleanShutdown,
            Err(e) => {
                error!("Daemon error: {}", e);
                DdnsExitCode::RuntimeError
            }
        }
    })
    .into()
}

/// Instantiate components from config and bind the listener
async fn prepare(config: &Config) -> Result<(TcpListener, server::AppState)> {
    let registry = ProviderRegistry::with_builtin_stores();

    #[cfg(feature = "cloudflare")]
    {
        info!("Registering Cloudflare provider");
        ddns_provider_cloudflare::register(&registry);
    }

    #[cfg(feature = "http-store")]
    {
        info!("Registering HTTP secret store");
        ddns_secret_http::register(&registry);
    }

    let gateway = &config.gateway;
    let provider = registry
        .create_provider(&gateway.provider)
        .map_err(|e| anyhow::anyhow!("Failed to create provider: {}", e))?;
    let store = registry
        .create_secret_store(&gateway.secret_store)
        .map_err(|e| anyhow::anyhow!("Failed to create secret store: {}", e))?;

    // Zone identity is fixed for the life of the process
    tokio::time::timeout(gateway.service.provider_timeout(), provider.prepare())
        .await
        .map_err(|_| anyhow::anyhow!("Provider did not answer during startup"))?
        .map_err(|e| anyhow::anyhow!("Failed to prepare provider: {}", e))?;

    if matches!(gateway.secret_store, SecretStoreConfig::Memory { .. }) {
        warn!("Using the in-memory secret store; every set request will be refused");
    }
    if let ProviderConfig::Cloudflare { dry_run: true, .. } = gateway.provider {
        warn!("Dry-run mode: provider writes are logged, not sent");
    }

    info!("Provider type: {}", gateway.provider.type_name());
    info!("Secret store type: {}", gateway.secret_store.type_name());
    info!("Credential scheme: {:?}", gateway.service.credential_scheme);
    if let Some(zone) = &gateway.service.zone_name {
        info!("Restricting updates to zone: {}", zone);
    }

    let service = UpdateService::new(&gateway.service, Arc::from(store), Arc::from(provider))
        .map_err(|e| anyhow::anyhow!("Failed to create update service: {}", e))?;
    let state = server::AppState::new(
        service,
        ResponseFormatter::new(gateway.service.reveal_unknown_hostnames),
        &gateway.service.forwarded_header,
    )?;

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to bind {}: {}", config.listen_addr, e))?;
    info!("Listening on {}", config.listen_addr);

    Ok((listener, state))
}

/// Run the daemon until a shutdown signal arrives
async fn run_daemon(listener: TcpListener, state: server::AppState) -> Result<()> {
    let shutdown = shutdown_signal().await?;

    server::serve(listener, state, async move {
        let signal = shutdown.await;
        info!("Received shutdown signal: {}", signal);
        info!("Shutting down daemon");
    })
    .await
}

/// Install SIGTERM/SIGINT handlers
///
/// Installation happens up front so a failure is reported before serving;
/// the returned future resolves with the name of the signal received.
#[cfg(unix)]
async fn shutdown_signal() -> Result<impl std::future::Future<Output = &'static str> + Send> {
    let mut sigterm = signal(SignalKind::terminate())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGTERM handler: {}", e))?;
    let mut sigint = signal(SignalKind::interrupt())
        .map_err(|e| anyhow::anyhow!("Failed to setup SIGINT handler: {}", e))?;

    Ok(async move {
        tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
        }
    })
}

/// Install the CTRL-C handler
///
/// Fallback implementation for non-Unix platforms.
#[cfg(not(unix))]
async fn shutdown_signal() -> Result<impl std::future::Future<Output = &'static str> + Send> {
    Ok(async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to wait for CTRL-C: {}", e);
        }
        "SIGINT"
    })
}
