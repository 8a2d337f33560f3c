//! Hostname normalization and validation
//!
//! Hostnames arrive as untrusted query parameters and are used both as
//! Secret Store keys and as DNS record names, so they are validated before
//! either collaborator sees them.

use crate::error::{Error, Result};

/// Maximum length of a domain name in text form (RFC 1035)
const MAX_NAME_LEN: usize = 253;

/// Maximum length of a single label (RFC 1035)
const MAX_LABEL_LEN: usize = 63;

/// Normalize and validate a hostname
///
/// Lowercases the name and strips one trailing dot, then checks RFC 1035
/// label rules: at most 253 characters, labels of 1 to 63 ASCII letters,
/// digits or hyphens, no label starting or ending with a hyphen.
pub fn normalize(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    let name = trimmed.strip_suffix('.').unwrap_or(trimmed).to_ascii_lowercase();

    if name.is_empty() {
        return Err(Error::invalid_request("Hostname cannot be empty"));
    }

    if name.len() > MAX_NAME_LEN {
        return Err(Error::invalid_request(format!(
            "Hostname too long: {} chars (max {})",
            name.len(),
            MAX_NAME_LEN
        )));
    }

    for label in name.split('.') {
        if label.is_empty() {
            return Err(Error::invalid_request(format!(
                "Hostname has empty label: '{}'",
                name
            )));
        }

        if label.len() > MAX_LABEL_LEN {
            return Err(Error::invalid_request(format!(
                "Hostname label too long: {} chars (max {})",
                label.len(),
                MAX_LABEL_LEN
            )));
        }

        if !label.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-') {
            return Err(Error::invalid_request(format!(
                "Hostname label contains invalid characters: '{}'",
                label
            )));
        }

        if label.starts_with('-') || label.ends_with('-') {
            return Err(Error::invalid_request(format!(
                "Hostname label cannot start or end with hyphen: '{}'",
                label
            )));
        }
    }

    Ok(name)
}

/// Check whether a normalized hostname lies at or below a normalized zone apex
pub fn is_within_zone(hostname: &str, zone: &str) -> bool {
    hostname == zone
        || hostname
            .strip_suffix(zone)
            .is_some_and(|head| head.ends_with('.'))
}
