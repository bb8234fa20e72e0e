//! Bearer tokens for the indexing API
//!
//! Each quota pool is one service account, identified by a JSON key file.
//! [`TokenProvider`] turns a key file path into a bearer token; the
//! orchestrator only depends on that trait.

mod credentials;
mod error;
mod token;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use secrecy::SecretString;

pub use credentials::{ServiceAccountKey, DEFAULT_TOKEN_URI};
pub use error::{AuthError, Result};
pub use token::{fetch_access_token, TokenResponse, JWT_BEARER_GRANT};

/// Key file for the pool at `index` (0-based): `account1.json`, `account2.json`, ...
pub fn credential_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("account{}.json", index + 1))
}

/// Produces a bearer token from a credential file.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self, credential_path: &Path) -> Result<SecretString>;
}

/// Mints tokens from service-account key files via the JWT bearer grant.
pub struct ServiceAccountTokenProvider {
    client: reqwest::Client,
    scope: String,
}

impl ServiceAccountTokenProvider {
    pub fn new(client: reqwest::Client, scope: impl Into<String>) -> Self {
        Self {
            client,
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for ServiceAccountTokenProvider {
    async fn token(&self, credential_path: &Path) -> Result<SecretString> {
        let key = ServiceAccountKey::load(credential_path).await?;
        fetch_access_token(&self.client, &key, &self.scope).await
    }
}
