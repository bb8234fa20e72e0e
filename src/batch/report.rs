use std::fmt;
use std::path::PathBuf;

use crate::publish::BatchResult;

/// Why a pool was not dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The pool's key file does not exist.
    MissingCredentials(PathBuf),
    /// A key file exists but no token could be obtained with it.
    TokenUnavailable(String),
    /// The pool's connection pool could not be created.
    TransportUnavailable(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::MissingCredentials(path) => write!(f, "{} not found", path.display()),
            SkipReason::TokenUnavailable(e) => write!(f, "could not obtain token: {e}"),
            SkipReason::TransportUnavailable(e) => write!(f, "could not open connection pool: {e}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PoolStatus {
    Completed(BatchResult),
    Skipped(SkipReason),
}

/// Result of one quota pool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolReport {
    /// 0-based pool index.
    pub index: usize,
    pub status: PoolStatus,
}

impl PoolReport {
    /// Counts for this pool; a skipped pool contributes zeros.
    pub fn result(&self) -> BatchResult {
        match &self.status {
            PoolStatus::Completed(result) => *result,
            PoolStatus::Skipped(_) => BatchResult::default(),
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, PoolStatus::Skipped(_))
    }
}

/// Every pool's report plus the running totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub pools: Vec<PoolReport>,
    pub totals: BatchResult,
}

impl RunSummary {
    pub(crate) fn record(&mut self, report: PoolReport) {
        self.totals += report.result();
        self.pools.push(report);
    }

    pub fn completed_pools(&self) -> usize {
        self.pools.iter().filter(|p| !p.is_skipped()).count()
    }
}

pub(crate) fn print_pool(report: &PoolReport) {
    match &report.status {
        PoolStatus::Completed(result) => {
            println!("\nTotal URLs Tried: {}", result.attempted);
            println!("Successful URLs: {}", result.successful);
            println!("URLs with Error 429: {}", result.rate_limited);
            println!("URLs with other errors: {}", result.other_errors);
        }
        PoolStatus::Skipped(reason) => {
            println!("Error: {reason}! Skipping account {}.", report.index + 1);
        }
    }
}

pub(crate) fn print_totals(summary: &RunSummary) {
    let totals = &summary.totals;
    println!(
        "Running total after {} account(s): {} tried, {} successful, {} rate limited, {} other errors",
        summary.pools.len(),
        totals.attempted,
        totals.successful,
        totals.rate_limited,
        totals.other_errors
    );
}
