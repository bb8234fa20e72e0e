//! Drives quota pools one after another.
//!
//! The master URL list is cut into one fixed-size slice per pool. Pools run
//! strictly in sequence: pool `i + 1` starts only after every submission of
//! pool `i`, retries included, has finished. Each pool gets its own token and
//! its own connection pool, so one account's quota usage never overlaps the
//! next account's.

mod partition;
mod report;

use std::path::PathBuf;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::auth::{credential_path, AuthError, TokenProvider};
use crate::config::Config;
use crate::publish::{dispatch_pool, PublishTransport, RetryPolicy};

pub use partition::partition;
pub use report::{PoolReport, PoolStatus, RunSummary, SkipReason};

/// Errors that stop a run before any submission starts.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("Invalid number of accounts: {count} (must be between 1 and {max})")]
    InvalidPoolCount { count: usize, max: usize },
    #[error("No URLs to submit")]
    NoUrls,
}

/// Settings the orchestrator needs from the configuration.
#[derive(Debug, Clone)]
pub struct BatchSettings {
    pub pool_size: usize,
    pub max_pools: usize,
    pub credentials_dir: PathBuf,
    pub retry: RetryPolicy,
    /// Print a live `completed/total` counter while a pool is running.
    pub show_progress: bool,
}

impl From<&Config> for BatchSettings {
    fn from(config: &Config) -> Self {
        Self {
            pool_size: config.pool_size,
            max_pools: config.max_pools,
            credentials_dir: config.credentials_dir.clone(),
            retry: config.retry_policy(),
            show_progress: true,
        }
    }
}

/// Runs a whole batch over a transport and a token source.
///
/// `transport` is a template: every pool dispatches over
/// [`PublishTransport::fresh`], which is dropped when the pool finishes.
pub struct Orchestrator<T, P> {
    settings: BatchSettings,
    transport: T,
    tokens: P,
}

impl<T: PublishTransport, P: TokenProvider> Orchestrator<T, P> {
    pub fn new(settings: BatchSettings, transport: T, tokens: P) -> Self {
        Self {
            settings,
            transport,
            tokens,
        }
    }

    /// Submits `urls` using the first `pool_count` accounts.
    ///
    /// # Errors
    ///
    /// - [`BatchError::InvalidPoolCount`] if `pool_count` is outside `1..=max_pools`
    /// - [`BatchError::NoUrls`] if `urls` is empty
    ///
    /// Per-pool problems (missing key file, token failure) never abort the
    /// run; the pool is reported as skipped and contributes zero.
    pub async fn run(&self, pool_count: usize, urls: &[String]) -> Result<RunSummary, BatchError> {
        let max = self.settings.max_pools;
        if !(1..=max).contains(&pool_count) {
            return Err(BatchError::InvalidPoolCount {
                count: pool_count,
                max,
            });
        }
        if urls.is_empty() {
            return Err(BatchError::NoUrls);
        }

        tracing::info!(
            urls = urls.len(),
            pools = pool_count,
            pool_size = self.settings.pool_size,
            "Starting batch"
        );

        let mut summary = RunSummary::default();
        for (index, slice) in partition(urls, pool_count, self.settings.pool_size)
            .into_iter()
            .enumerate()
        {
            println!("\nProcessing URLs for Account {}...", index + 1);
            let report = self.run_pool(index, slice).await;
            report::print_pool(&report);
            summary.record(report);
            report::print_totals(&summary);
        }

        tracing::info!(
            attempted = summary.totals.attempted,
            successful = summary.totals.successful,
            rate_limited = summary.totals.rate_limited,
            other_errors = summary.totals.other_errors,
            skipped_pools = summary.pools.len() - summary.completed_pools(),
            "Batch complete"
        );
        Ok(summary)
    }

    async fn run_pool(&self, index: usize, urls: &[String]) -> PoolReport {
        let skipped = |reason: SkipReason| {
            tracing::warn!(pool = index + 1, reason = %reason, "Skipping account");
            PoolReport {
                index,
                status: PoolStatus::Skipped(reason),
            }
        };

        let path = credential_path(&self.settings.credentials_dir, index);
        if !path.exists() {
            return skipped(SkipReason::MissingCredentials(path));
        }

        if urls.is_empty() {
            tracing::debug!(pool = index + 1, "No URLs left for account");
            return PoolReport {
                index,
                status: PoolStatus::Completed(Default::default()),
            };
        }

        let token = match self.tokens.token(&path).await {
            Ok(token) => token,
            Err(AuthError::NotFound(_)) => return skipped(SkipReason::MissingCredentials(path)),
            Err(e) => return skipped(SkipReason::TokenUnavailable(e.to_string())),
        };

        let transport = match self.transport.fresh() {
            Ok(transport) => transport,
            Err(e) => return skipped(SkipReason::TransportUnavailable(e.to_string())),
        };

        let (progress_tx, printer) = if self.settings.show_progress {
            let (tx, rx) = mpsc::channel(64);
            (Some(tx), Some(tokio::spawn(print_progress(rx))))
        } else {
            (None, None)
        };

        let result = dispatch_pool(
            &transport,
            &token,
            urls,
            &self.settings.retry,
            progress_tx.as_ref(),
        )
        .await;

        drop(progress_tx);
        if let Some(printer) = printer {
            if let Err(e) = printer.await {
                tracing::debug!(error = %e, "Progress printer task failed");
            }
        }

        PoolReport {
            index,
            status: PoolStatus::Completed(result),
        }
    }
}

/// Renders `(completed, total)` updates as a single rewritten stderr line.
async fn print_progress(mut rx: mpsc::Receiver<(usize, usize)>) {
    use std::io::Write;

    let mut printed = false;
    while let Some((done, total)) = rx.recv().await {
        eprint!("\rProcessing URLs: {done}/{total}");
        if let Err(e) = std::io::stderr().flush() {
            tracing::debug!(error = %e, "Failed to flush progress line");
        }
        printed = true;
    }
    if printed {
        eprintln!();
    }
}
