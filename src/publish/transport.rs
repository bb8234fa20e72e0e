//! The network seam between the sender and the publish endpoint.
//!
//! [`PublishTransport`] hides the HTTP client so the retry and fan-out
//! logic can be exercised against scripted disconnects. [`ReqwestTransport`]
//! is the production implementation; each handle owns one connection pool.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::error::Error as _;
use std::io::ErrorKind;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Notification kind sent with every submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NotificationKind {
    #[serde(rename = "URL_UPDATED")]
    UrlUpdated,
}

/// One URL submission. Serializes to the publish endpoint's JSON body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishRequest {
    url: String,
    #[serde(rename = "type")]
    kind: NotificationKind,
}

impl PublishRequest {
    /// Builds an update notification for `url`, trimming surrounding whitespace.
    pub fn updated(url: &str) -> Self {
        Self {
            url: url.trim().to_string(),
            kind: NotificationKind::UrlUpdated,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }
}

/// Failures below the HTTP response level.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The connection could not be established or was dropped mid-exchange.
    #[error("connection dropped: {0}")]
    Disconnected(String),
    #[error("request timed out")]
    Timeout,
    #[error("request failed: {0}")]
    Other(String),
    /// The HTTP client itself could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),
}

impl TransportError {
    /// Only dropped connections are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, TransportError::Disconnected(_))
    }

    fn from_reqwest(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            TransportError::Timeout
        } else if e.is_connect() || e.is_request() || e.is_body() || has_connection_io_error(&e) {
            TransportError::Disconnected(e.to_string())
        } else {
            TransportError::Other(e.to_string())
        }
    }
}

/// Walks the error chain looking for an I/O error that means the peer went away.
fn has_connection_io_error(e: &reqwest::Error) -> bool {
    let mut source = e.source();
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if matches!(
                io.kind(),
                ErrorKind::ConnectionReset
                    | ErrorKind::ConnectionAborted
                    | ErrorKind::BrokenPipe
                    | ErrorKind::UnexpectedEof
                    | ErrorKind::NotConnected
            ) {
                return true;
            }
        }
        source = err.source();
    }
    false
}

/// Sends publish requests. Clones share one connection pool.
#[async_trait]
pub trait PublishTransport: Send + Sync + Clone + 'static {
    /// Posts one request and returns the raw response body, whatever the status.
    async fn publish(
        &self,
        token: &SecretString,
        request: &PublishRequest,
    ) -> Result<String, TransportError>;

    /// A handle backed by a brand new connection pool.
    fn fresh(&self) -> Result<Self, TransportError>;
}

/// Production transport backed by `reqwest`.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    endpoint: Arc<str>,
    timeout: Duration,
}

impl ReqwestTransport {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: Arc::from(endpoint),
            timeout,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

fn build_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!("sitemap-indexer/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| TransportError::Build(e.to_string()))
}

#[async_trait]
impl PublishTransport for ReqwestTransport {
    async fn publish(
        &self,
        token: &SecretString,
        request: &PublishRequest,
    ) -> Result<String, TransportError> {
        let response = self
            .client
            .post(&*self.endpoint)
            .bearer_auth(token.expose_secret())
            .json(request)
            .send()
            .await
            .map_err(TransportError::from_reqwest)?;

        let status = response.status();
        let body = response.text().await.map_err(TransportError::from_reqwest)?;

        tracing::trace!(
            url = %request.url(),
            status = status.as_u16(),
            body_len = body.len(),
            "Publish response received"
        );

        Ok(body)
    }

    fn fresh(&self) -> Result<Self, TransportError> {
        Ok(Self {
            client: build_client(self.timeout)?,
            endpoint: Arc::clone(&self.endpoint),
            timeout: self.timeout,
        })
    }
}
