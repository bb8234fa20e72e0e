//! Service-account key files
//!
//! One JSON key file per quota pool, as downloaded from the cloud console.
//! Only the fields needed to mint a token are read; the private key is held
//! in a `SecretString` and never printed.

use std::fmt;
use std::path::Path;

use secrecy::SecretString;
use serde::Deserialize;
use url::{Host, Url};

use super::error::{AuthError, Result};

/// Token endpoint used when the key file does not name one.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

#[derive(Deserialize)]
struct RawKey {
    #[serde(rename = "type", default)]
    key_type: Option<String>,
    client_email: String,
    private_key: String,
    #[serde(default)]
    token_uri: Option<String>,
}

/// The parts of a service-account key file used for token exchange.
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: SecretString,
    pub token_uri: String,
}

impl fmt::Debug for ServiceAccountKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceAccountKey")
            .field("client_email", &self.client_email)
            .field("private_key", &"[REDACTED]")
            .field("token_uri", &self.token_uri)
            .finish()
    }
}

impl ServiceAccountKey {
    /// Reads and parses a key file.
    ///
    /// A missing file is [`AuthError::NotFound`] so callers can skip the
    /// pool instead of aborting.
    pub async fn load(path: &Path) -> Result<Self> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AuthError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(AuthError::Io(e)),
        };
        let key = Self::from_json(&contents)?;
        tracing::debug!(path = %path.display(), client_email = %key.client_email, "loaded service account key");
        Ok(key)
    }

    /// Parses key file contents.
    pub fn from_json(contents: &str) -> Result<Self> {
        let raw: RawKey = serde_json::from_str(contents)
            .map_err(|e| AuthError::CredentialParse(format!("parsing key file: {e}")))?;

        if let Some(kind) = raw.key_type.as_deref() {
            if kind != "service_account" {
                return Err(AuthError::CredentialParse(format!(
                    "expected a service_account key, found {kind:?}"
                )));
            }
        }

        let token_uri = raw
            .token_uri
            .unwrap_or_else(|| DEFAULT_TOKEN_URI.to_string());
        check_token_uri(&token_uri)?;

        Ok(Self {
            client_email: raw.client_email,
            private_key: SecretString::from(raw.private_key),
            token_uri,
        })
    }
}

/// The assertion is sent to `token_uri`, so plain HTTP is only allowed for
/// loopback test servers.
fn check_token_uri(token_uri: &str) -> Result<()> {
    let insecure = || AuthError::InsecureTokenUri(token_uri.to_string());
    let parsed = Url::parse(token_uri).map_err(|_| insecure())?;

    match parsed.scheme() {
        "https" if parsed.host().is_some() => Ok(()),
        "http" if is_loopback(&parsed) => {
            tracing::warn!(token_uri = %token_uri, "using non-HTTPS token URI (localhost only)");
            Ok(())
        }
        _ => Err(insecure()),
    }
}

fn is_loopback(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain == "localhost",
        Some(Host::Ipv4(ip)) => ip.is_loopback(),
        Some(Host::Ipv6(ip)) => ip.is_loopback(),
        None => false,
    }
}
