use super::outcome::{BatchResult, Outcome};
use super::sender::{send_with_retry, RetryPolicy};
use super::transport::{PublishRequest, PublishTransport};
use futures::stream::{self, StreamExt};
use secrecy::SecretString;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;

/// Submits every URL of one quota pool concurrently and tallies the outcomes.
///
/// All submissions share `transport` (one connection pool) and run at the
/// same time with no concurrency cap. The function returns only after every
/// submission, retries included, has reached a terminal outcome; counts are
/// folded after that join so no counter is shared between tasks.
///
/// # Arguments
///
/// * `transport` - Connection pool for this quota pool only
/// * `token` - Bearer token of the pool's service account
/// * `urls` - The pool's slice of the master list (may be empty)
/// * `policy` - Retry policy applied to each URL
/// * `progress_tx` - Optional channel receiving `(completed, total)` after each URL
///
/// Completion order is unspecified; the returned counts are not.
pub async fn dispatch_pool<T: PublishTransport>(
    transport: &T,
    token: &SecretString,
    urls: &[String],
    policy: &RetryPolicy,
    progress_tx: Option<&mpsc::Sender<(usize, usize)>>,
) -> BatchResult {
    if urls.is_empty() {
        return BatchResult::default();
    }

    let total = urls.len();
    let completed = AtomicUsize::new(0);
    let completed = &completed;

    let outcomes: Vec<Outcome> = stream::iter(urls)
        .map(move |url| async move {
            let request = PublishRequest::updated(url);
            let submission = send_with_retry(transport, token, &request, policy).await;

            let done = completed.fetch_add(1, Ordering::Relaxed).saturating_add(1);
            if let Some(tx) = progress_tx {
                if let Err(e) = tx.send((done, total)).await {
                    tracing::debug!(error = %e, done = done, total = total, "Progress receiver dropped");
                }
            }

            submission.outcome
        })
        .buffer_unordered(total)
        .collect()
        .await;

    let result: BatchResult = outcomes.iter().collect();
    tracing::info!(
        attempted = result.attempted,
        successful = result.successful,
        rate_limited = result.rate_limited,
        other_errors = result.other_errors,
        "Quota pool dispatch complete"
    );
    result
}
