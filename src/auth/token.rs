//! Service-account token exchange
//!
//! Implements the OAuth 2.0 JWT bearer grant: a short-lived RS256 assertion
//! signed with the account's private key is posted to the key's
//! `token_uri`, which answers with an access token for the requested scope.

use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::credentials::ServiceAccountKey;
use super::error::{AuthError, Result};

/// Grant type for the JWT bearer flow.
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Lifetime requested for each assertion; the maximum Google accepts.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct Claims {
    pub iss: String,
    pub scope: String,
    pub aud: String,
    pub iat: i64,
    pub exp: i64,
}

/// Response from the token endpoint.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

/// Builds the signed assertion for `key` and `scope`, issued at `issued_at`
/// (unix seconds).
pub(crate) fn build_assertion(
    key: &ServiceAccountKey,
    scope: &str,
    issued_at: i64,
) -> Result<String> {
    let claims = Claims {
        iss: key.client_email.clone(),
        scope: scope.to_string(),
        aud: key.token_uri.clone(),
        iat: issued_at,
        exp: issued_at + ASSERTION_LIFETIME_SECS,
    };

    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.expose_secret().as_bytes())
        .map_err(|e| AuthError::Signing(format!("invalid private key: {e}")))?;

    encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
        .map_err(|e| AuthError::Signing(e.to_string()))
}

/// Exchanges a signed assertion for an access token scoped to `scope`.
pub async fn fetch_access_token(
    client: &reqwest::Client,
    key: &ServiceAccountKey,
    scope: &str,
) -> Result<SecretString> {
    let assertion = build_assertion(key, scope, chrono::Utc::now().timestamp())?;

    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
        .send()
        .await
        .map_err(|e| AuthError::Http(format!("token request failed: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| String::from("<no body>"));
        return Err(AuthError::TokenExchange(format!(
            "token endpoint returned {status}: {body}"
        )));
    }

    let token = response
        .json::<TokenResponse>()
        .await
        .map_err(|e| AuthError::TokenExchange(format!("invalid token response: {e}")))?;

    tracing::info!(
        client_email = %key.client_email,
        expires_in = ?token.expires_in,
        "obtained access token"
    );
    Ok(SecretString::from(token.access_token))
}
