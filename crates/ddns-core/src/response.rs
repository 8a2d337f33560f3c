//! Response formatting
//!
//! Legacy DDNS clients parse a bare status token, so plain text is the
//! default. Clients that send `Accept: application/json` get a small JSON
//! object instead.
//!
//! | Status | Code | Token |
//! |---|---|---|
//! | Ok | 200 | `ok` |
//! | NoChange | 200 | `nochg` |
//! | Unauthorized | 401 | `badauth` |
//! | NotFound | 404 | `nohost` (401 `badauth` unless revealed) |
//! | InvalidRequest | 400 | `badrequest` |
//! | ProviderError | 502 | `dnserr` |

use crate::service::{UpdateResult, UpdateStatus};

const CONTENT_TYPE_TEXT: &str = "text/plain; charset=utf-8";
const CONTENT_TYPE_JSON: &str = "application/json";

/// Supported response formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Format {
    /// `<token>[ <address>]\n`
    #[default]
    Text,
    /// `{"status": "<token>", "address": "<address>"|null}`
    Json,
}

impl Format {
    /// Detect the desired format from an `Accept` header value
    pub fn from_accept(accept: Option<&str>) -> Self {
        match accept {
            Some(accept) if accept.to_ascii_lowercase().contains(CONTENT_TYPE_JSON) => Format::Json,
            _ => Format::Text,
        }
    }
}

/// A rendered response, independent of the HTTP library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedResponse {
    /// HTTP status code
    pub status_code: u16,
    /// Content-Type header value
    pub content_type: &'static str,
    /// Response body
    pub body: String,
}

/// Renders [`UpdateResult`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct ResponseFormatter {
    reveal_unknown_hostnames: bool,
}

impl ResponseFormatter {
    /// Create a formatter
    ///
    /// With `reveal_unknown_hostnames` off, an unknown hostname renders
    /// exactly like a wrong credential.
    pub fn new(reveal_unknown_hostnames: bool) -> Self {
        Self {
            reveal_unknown_hostnames,
        }
    }

    /// Status as observed by the client
    fn visible_status(&self, status: UpdateStatus) -> UpdateStatus {
        match status {
            UpdateStatus::NotFound if !self.reveal_unknown_hostnames => UpdateStatus::Unauthorized,
            other => other,
        }
    }

    /// Render `result` in `format`
    pub fn format(&self, result: &UpdateResult, format: Format) -> FormattedResponse {
        let status = self.visible_status(result.status);
        let token = status_token(status);

        let (content_type, body) = match format {
            Format::Text => {
                let body = match result.address {
                    Some(address) => format!("{} {}\n", token, address),
                    None => format!("{}\n", token),
                };
                (CONTENT_TYPE_TEXT, body)
            }
            Format::Json => {
                let body = serde_json::json!({
                    "status": token,
                    "address": result.address.map(|a| a.to_string()),
                });
                (CONTENT_TYPE_JSON, body.to_string())
            }
        };

        FormattedResponse {
            status_code: status_code(status),
            content_type,
            body,
        }
    }
}

/// Wire token for a status
pub fn status_token(status: UpdateStatus) -> &'static str {
    match status {
        UpdateStatus::Ok => "ok",
        UpdateStatus::NoChange => "nochg",
        UpdateStatus::Unauthorized => "badauth",
        UpdateStatus::NotFound => "nohost",
        UpdateStatus::InvalidRequest => "badrequest",
        UpdateStatus::ProviderError => "dnserr",
    }
}

/// HTTP status code for a status
pub fn status_code(status: UpdateStatus) -> u16 {
    match status {
        UpdateStatus::Ok | UpdateStatus::NoChange => 200,
        UpdateStatus::Unauthorized => 401,
        UpdateStatus::NotFound => 404,
        UpdateStatus::InvalidRequest => 400,
        UpdateStatus::ProviderError => 502,
    }
}
