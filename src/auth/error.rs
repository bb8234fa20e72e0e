//! Error types for credential and token operations

use thiserror::Error;

/// Errors from turning a service-account key file into a bearer token.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("credential file not found: {0}")]
    NotFound(String),

    #[error("failed to read credential file: {0}")]
    Io(#[from] std::io::Error),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("token URI must use HTTPS: {0}")]
    InsecureTokenUri(String),

    #[error("failed to sign token assertion: {0}")]
    Signing(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, AuthError>;
