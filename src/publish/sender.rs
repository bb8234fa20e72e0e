use super::outcome::{classify_or_fail, Failure, Outcome};
use super::transport::{PublishRequest, PublishTransport};
use secrecy::SecretString;
use std::time::Duration;

/// Fixed retry policy for dropped connections.
///
/// Server responses, including 429, are never retried; the API's own
/// backoff hints are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Pause before each retry.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(2),
        }
    }
}

/// Terminal result of one URL together with the attempts it took.
#[derive(Debug, Clone)]
pub struct Submission {
    pub outcome: Outcome,
    pub attempts: u32,
}

/// Submits one URL, retrying only when the connection drops.
///
/// Any HTTP response ends the loop and its body is classified. A dropped
/// connection is retried after `policy.delay` until `policy.max_attempts`
/// is reached, at which point the result is
/// [`Failure::RetriesExhausted`]. Other transport failures (timeouts) end
/// the loop immediately.
pub async fn send_with_retry<T: PublishTransport>(
    transport: &T,
    token: &SecretString,
    request: &PublishRequest,
    policy: &RetryPolicy,
) -> Submission {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempts = 0;

    loop {
        attempts += 1;
        match transport.publish(token, request).await {
            Ok(body) => {
                let outcome = classify_or_fail(&body);
                if let Outcome::OtherError(ref failure) = outcome {
                    tracing::debug!(url = %request.url(), error = %failure, "Submission rejected");
                }
                return Submission { outcome, attempts };
            }
            Err(e) if e.is_retryable() && attempts < max_attempts => {
                tracing::warn!(
                    url = %request.url(),
                    attempt = attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %e,
                    "Connection dropped, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) if e.is_retryable() => {
                tracing::warn!(
                    url = %request.url(),
                    attempts = attempts,
                    error = %e,
                    "Connection dropped on every attempt, giving up"
                );
                return Submission {
                    outcome: Outcome::OtherError(Failure::RetriesExhausted { attempts }),
                    attempts,
                };
            }
            Err(e) => {
                tracing::debug!(url = %request.url(), error = %e, "Submission failed");
                return Submission {
                    outcome: Outcome::OtherError(Failure::Transport(e.to_string())),
                    attempts,
                };
            }
        }
    }
}
