// # File Secret Store
//
// Directory-backed implementation of SecretStore.
//
// ## Layout
//
// One file per registered hostname, named `<key_prefix><hostname>` inside
// the configured directory. The file content is the secret; surrounding
// whitespace (such as the trailing newline editors add) is ignored.
//
// ```text
// /etc/ddns/secrets/
// ├── hosts/ddns.example.com
// └── hosts/nas.example.com
// ```
//
// ## Rotation
//
// The file is read on every lookup. Replacing or deleting it takes effect
// on the next request without restarting the daemon.

use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::Error;
use crate::config::SecretStoreConfig;
use crate::traits::secret_store::{HostnameRecord, Secret, SecretStore, SecretStoreFactory};

/// Directory-backed secret store
///
/// # Example
///
/// ```rust,no_run
/// use ddns_core::store::FileSecretStore;
/// use ddns_core::traits::SecretStore;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = FileSecretStore::new("/etc/ddns/secrets", "hosts/")?;
///     let record = store.get("ddns.example.com").await?;
///     assert!(record.is_some());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct FileSecretStore {
    dir: PathBuf,
    key_prefix: String,
}

impl FileSecretStore {
    /// Create a store over `dir`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if `dir` is not an existing directory.
    pub fn new<P: AsRef<Path>>(dir: P, key_prefix: impl Into<String>) -> Result<Self, Error> {
        let dir = dir.as_ref().to_path_buf();
        if !dir.is_dir() {
            return Err(Error::config(format!(
                "Secret store directory does not exist: {}",
                dir.display()
            )));
        }

        Ok(Self {
            dir,
            key_prefix: key_prefix.into(),
        })
    }

    fn path_for(&self, hostname: &str) -> Result<PathBuf, Error> {
        // Hostnames reaching the store are normalized, but the store is a
        // public type and must not resolve outside its directory.
        if hostname.is_empty() || hostname.contains(['/', '\\']) || hostname.starts_with('.') {
            return Err(Error::invalid_request(format!(
                "Hostname cannot be used as a secret key: '{}'",
                hostname
            )));
        }
        Ok(self.dir.join(format!("{}{}", self.key_prefix, hostname)))
    }
}

#[async_trait]
impl SecretStore for FileSecretStore {
    async fn get(&self, hostname: &str) -> Result<Option<HostnameRecord>, Error> {
        let path = self.path_for(hostname)?;

        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(HostnameRecord {
                hostname: hostname.to_string(),
                secret: Secret::new(content.trim()),
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %path.display(), "No secret file for hostname");
                Ok(None)
            }
            Err(e) => Err(Error::secret_store(format!(
                "Failed to read {}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn store_name(&self) -> &'static str {
        "file"
    }
}

/// Factory for [`FileSecretStore`]
pub struct FileSecretStoreFactory;

impl SecretStoreFactory for FileSecretStoreFactory {
    fn create(&self, config: &SecretStoreConfig) -> Result<Box<dyn SecretStore>, Error> {
        match config {
            SecretStoreConfig::File { path, key_prefix } => {
                Ok(Box::new(FileSecretStore::new(path, key_prefix.clone())?))
            }
            other => Err(Error::config(format!(
                "File store factory cannot build a '{}' store",
                other.type_name()
            ))),
        }
    }
}
