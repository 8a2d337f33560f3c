//! Hostname-owner authentication
//!
//! A `set` request proves ownership of a hostname with the `hash` parameter.
//! The check reads the hostname's secret from the [`SecretStore`] on every
//! call (no caching, so rotation is immediate) and compares in constant time.
//!
//! Unknown hostnames go through the same comparison against a dummy secret,
//! so the work done does not depend on whether the hostname is registered.

use sha2::{Digest, Sha256};
use std::net::IpAddr;
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};

use crate::config::CredentialScheme;
use crate::error::Result;
use crate::traits::SecretStore;

/// Stand-in secret for hostnames with no registration
const DUMMY_SECRET: &str = "unregistered-hostname-placeholder-secret";

/// Outcome of an authentication attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    /// Credential matches the hostname's secret
    Authenticated,
    /// Hostname is registered but the credential does not match
    Unauthorized,
    /// Hostname has no entry in the secret store
    NotFound,
}

impl AuthResult {
    /// Whether the caller may mutate the hostname's record
    pub fn is_ok(&self) -> bool {
        matches!(self, AuthResult::Authenticated)
    }
}

/// Validates credentials against the secret store
#[derive(Clone)]
pub struct Authenticator {
    store: Arc<dyn SecretStore>,
    scheme: CredentialScheme,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("store", &self.store.store_name())
            .field("scheme", &self.scheme)
            .finish()
    }
}

impl Authenticator {
    /// Create an authenticator over `store`
    pub fn new(store: Arc<dyn SecretStore>, scheme: CredentialScheme) -> Self {
        Self { store, scheme }
    }

    /// Check `credential` for `hostname`
    ///
    /// # Parameters
    ///
    /// - `hostname`: Normalized hostname
    /// - `credential`: The `hash` request parameter (empty when absent)
    /// - `caller`: Resolved caller address, bound into `sha256` credentials
    ///
    /// # Returns
    ///
    /// - `Ok(AuthResult)`: Classification of the attempt
    /// - `Err(Error)`: The secret store could not be read
    pub async fn authenticate(
        &self,
        hostname: &str,
        credential: &str,
        caller: IpAddr,
    ) -> Result<AuthResult> {
        let record = self.store.get(hostname).await?;

        let (secret, registered) = match &record {
            Some(record) => (record.secret.expose(), true),
            None => (DUMMY_SECRET, false),
        };

        let expected = match self.scheme {
            CredentialScheme::Shared => secret.to_string(),
            CredentialScheme::Sha256 => sha256_credential(caller, hostname, secret),
        };
        let supplied = match self.scheme {
            CredentialScheme::Shared => credential.to_string(),
            CredentialScheme::Sha256 => credential.trim().to_ascii_lowercase(),
        };

        let matches = digests_match(&expected, &supplied);

        let result = if !registered {
            AuthResult::NotFound
        } else if secret.is_empty() {
            warn!(hostname = %hostname, "Registered secret is empty; refusing all credentials");
            AuthResult::Unauthorized
        } else if matches {
            AuthResult::Authenticated
        } else {
            AuthResult::Unauthorized
        };

        debug!(hostname = %hostname, result = ?result, "Authentication attempt");
        Ok(result)
    }
}

/// Credential a client sends under the `sha256` scheme
///
/// Lowercase hex of `SHA-256(caller || hostname || secret)`, where `caller`
/// is the canonical text form of the client's public address.
pub fn sha256_credential(caller: IpAddr, hostname: &str, secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(caller.to_string().as_bytes());
    hasher.update(hostname.as_bytes());
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

// Hashing first gives both sides a fixed length, so neither the content nor
// the length of the secret influences comparison time.
fn digests_match(expected: &str, supplied: &str) -> bool {
    let expected = Sha256::digest(expected.as_bytes());
    let supplied = Sha256::digest(supplied.as_bytes());
    expected.as_slice().ct_eq(supplied.as_slice()).into()
}
