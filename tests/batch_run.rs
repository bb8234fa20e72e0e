//! Integration tests for a full batch run: slicing, per-pool tokens,
//! sequential pools and skipped accounts.
//!
//! Submissions go through the scripted `MockTransport`; tokens come from a
//! provider that derives them from the key file name, so each pool's
//! requests can be traced back to the account that made them.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use sitemap_indexer::auth::{AuthError, TokenProvider};
use sitemap_indexer::batch::{BatchError, BatchSettings, Orchestrator, PoolStatus, SkipReason};
use sitemap_indexer::publish::mock::{MockReply, MockTransport};
use sitemap_indexer::publish::{BatchResult, RetryPolicy};

/// Token is the key file's stem, e.g. `account2`.
struct FileStemTokens;

#[async_trait]
impl TokenProvider for FileStemTokens {
    async fn token(&self, credential_path: &Path) -> Result<SecretString, AuthError> {
        let stem = credential_path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| AuthError::CredentialParse("bad path".into()))?;
        Ok(SecretString::from(stem.to_string()))
    }
}

/// Always fails, as if the key had been revoked.
struct RevokedTokens;

#[async_trait]
impl TokenProvider for RevokedTokens {
    async fn token(&self, _credential_path: &Path) -> Result<SecretString, AuthError> {
        Err(AuthError::TokenExchange("invalid_grant".into()))
    }
}

fn credentials_dir(name: &str, accounts: &[usize]) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("sitemap_indexer_batch_{name}"));
    std::fs::remove_dir_all(&dir).ok();
    std::fs::create_dir_all(&dir).unwrap();
    for n in accounts {
        std::fs::write(dir.join(format!("account{n}.json")), "{}").unwrap();
    }
    dir
}

fn settings(dir: &Path) -> BatchSettings {
    BatchSettings {
        pool_size: 200,
        max_pools: 5,
        credentials_dir: dir.to_path_buf(),
        retry: RetryPolicy {
            max_attempts: 3,
            delay: Duration::from_millis(5),
        },
        show_progress: false,
    }
}

fn urls(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("https://example.com/post/{i}")).collect()
}

#[tokio::test]
async fn test_450_urls_three_pools() {
    let dir = credentials_dir("450", &[1, 2, 3]);
    let urls = urls(450);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    let summary = orchestrator.run(3, &urls).await.unwrap();

    let per_pool: Vec<usize> = summary.pools.iter().map(|p| p.result().attempted).collect();
    assert_eq!(per_pool, vec![200, 200, 50]);
    let totals = summary.totals;
    assert_eq!(totals.attempted, 450);
    assert_eq!(
        totals.successful + totals.rate_limited + totals.other_errors,
        450
    );

    // Each URL was sent once, by the account owning its slice.
    let calls = transport.calls();
    assert_eq!(calls.len(), 450);
    for call in &calls {
        let i: usize = call.url.rsplit('/').next().unwrap().parse().unwrap();
        let expected = format!("account{}", i / 200 + 1);
        assert_eq!(call.token, expected, "wrong account for {}", call.url);
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_progress_printer_does_not_change_results() {
    let dir = credentials_dir("progress", &[1, 2]);
    let urls = urls(250);
    let mut settings = settings(&dir);
    settings.show_progress = true;
    let orchestrator = Orchestrator::new(settings, MockTransport::new(), FileStemTokens);

    let summary = orchestrator.run(2, &urls).await.unwrap();

    let per_pool: Vec<usize> = summary.pools.iter().map(|p| p.result().attempted).collect();
    assert_eq!(per_pool, vec![200, 50]);
    assert_eq!(summary.totals.attempted, 250);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_pools_run_sequentially_on_fresh_connection_pools() {
    let dir = credentials_dir("sequential", &[1, 2, 3]);
    let urls = urls(450);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    orchestrator.run(3, &urls).await.unwrap();

    // Concurrency never spans two pools.
    assert_eq!(transport.peak_in_flight(), 200);
    assert_eq!(transport.pools_opened(), 3);

    // Calls are grouped by account in pool order.
    let tokens: Vec<String> = transport.calls().into_iter().map(|c| c.token).collect();
    let first_of_two = tokens.iter().position(|t| t == "account2").unwrap();
    let last_of_one = tokens.iter().rposition(|t| t == "account1").unwrap();
    assert!(last_of_one < first_of_two);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_missing_credentials_skip_pool() {
    let dir = credentials_dir("missing", &[1, 2]);
    let urls = urls(450);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    let summary = orchestrator.run(3, &urls).await.unwrap();

    assert_eq!(summary.pools.len(), 3);
    assert_eq!(summary.completed_pools(), 2);
    assert_eq!(summary.pools[2].result(), BatchResult::default());
    match &summary.pools[2].status {
        PoolStatus::Skipped(SkipReason::MissingCredentials(path)) => {
            assert!(path.ends_with("account3.json"));
        }
        other => panic!("Expected MissingCredentials, got {:?}", other),
    }
    assert_eq!(summary.totals.attempted, 400);
    assert_eq!(transport.calls().len(), 400);
    assert_eq!(transport.pools_opened(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_token_failure_skips_pool_and_run_continues() {
    let dir = credentials_dir("revoked", &[1, 2]);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), RevokedTokens);

    let summary = orchestrator.run(2, &urls(300)).await.unwrap();

    assert_eq!(summary.completed_pools(), 0);
    assert!(summary
        .pools
        .iter()
        .all(|p| matches!(p.status, PoolStatus::Skipped(SkipReason::TokenUnavailable(_)))));
    assert_eq!(summary.totals, BatchResult::default());
    assert!(transport.calls().is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_pools_beyond_list_complete_with_zero_counts() {
    let dir = credentials_dir("short_list", &[1, 2, 3, 4, 5]);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    let summary = orchestrator.run(5, &urls(250)).await.unwrap();

    let per_pool: Vec<usize> = summary.pools.iter().map(|p| p.result().attempted).collect();
    assert_eq!(per_pool, vec![200, 50, 0, 0, 0]);
    assert_eq!(summary.completed_pools(), 5);
    assert_eq!(transport.pools_opened(), 2);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_outcomes_aggregate_across_pools() {
    let dir = credentials_dir("aggregate", &[1, 2]);
    let urls = urls(400);
    let transport = MockTransport::new();
    let rate_limited = r#"{"error":{"code":429,"message":"Quota exceeded"}}"#;
    // Second account is out of quota for its last 20 URLs.
    for url in &urls[380..400] {
        transport.push(url, MockReply::body(rate_limited));
    }
    // One URL in the first pool never gets a connection through.
    for _ in 0..3 {
        transport.push(&urls[7], MockReply::Disconnect);
    }
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    let summary = orchestrator.run(2, &urls).await.unwrap();

    assert_eq!(
        summary.totals,
        BatchResult {
            attempted: 400,
            successful: 379,
            rate_limited: 20,
            other_errors: 1,
        }
    );
    assert_eq!(summary.pools[0].result().other_errors, 1);
    assert_eq!(summary.pools[1].result().rate_limited, 20);
    assert_eq!(transport.attempts_for(&urls[7]), 3);
    assert_eq!(transport.attempts_for(&urls[390]), 1);

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_invalid_pool_count_rejected_before_work() {
    let dir = credentials_dir("invalid_count", &[1]);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    for count in [0, 6] {
        let err = orchestrator.run(count, &urls(10)).await.unwrap_err();
        assert!(matches!(err, BatchError::InvalidPoolCount { max: 5, .. }));
    }
    assert!(transport.calls().is_empty());

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_empty_url_list_rejected_before_work() {
    let dir = credentials_dir("no_urls", &[1]);
    let transport = MockTransport::new();
    let orchestrator = Orchestrator::new(settings(&dir), transport.clone(), FileStemTokens);

    let err = orchestrator.run(1, &[]).await.unwrap_err();
    assert!(matches!(err, BatchError::NoUrls));
    assert_eq!(transport.pools_opened(), 0);

    std::fs::remove_dir_all(&dir).ok();
}
