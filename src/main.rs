use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;

use sitemap_indexer::auth::ServiceAccountTokenProvider;
use sitemap_indexer::batch::{BatchSettings, Orchestrator, RunSummary};
use sitemap_indexer::config::Config;
use sitemap_indexer::prompt::{self, PromptError};
use sitemap_indexer::publish::ReqwestTransport;
use sitemap_indexer::sitemap;

/// Exit status after the user aborts at the restart prompt.
const EXIT_INTERRUPTED: i32 = 130;

/// Get the config directory path (~/.config/sitemap-indexer/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("sitemap-indexer"))
}

#[derive(Parser, Debug)]
#[command(
    name = "sitemap-indexer",
    about = "Submit sitemap URLs to the Google Indexing API across several service accounts"
)]
struct Args {
    /// Config file (default: ~/.config/sitemap-indexer/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Sitemap to read URLs from; repeat for several (replaces the configured list)
    #[arg(long = "sitemap", value_name = "URL")]
    sitemaps: Vec<String>,

    /// Number of accounts to use (skips the interactive prompt)
    #[arg(long, value_name = "N")]
    pools: Option<usize>,

    /// Directory containing account1.json, account2.json, ...
    #[arg(long, value_name = "DIR")]
    credentials_dir: Option<PathBuf>,

    /// Do not print the live progress counter
    #[arg(long)]
    no_progress: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args = Args::parse();

    let config_path = match &args.config {
        Some(path) => path.clone(),
        None => get_config_dir()?.join("config.toml"),
    };
    let mut config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    if !args.sitemaps.is_empty() {
        config.sitemaps = args.sitemaps.clone();
    }
    if let Some(dir) = &args.credentials_dir {
        config.credentials_dir = dir.clone();
    }

    if config.sitemaps.is_empty() {
        eprintln!("Error: No sitemaps configured.");
        eprintln!();
        eprintln!("Pass one or more on the command line:");
        eprintln!("  sitemap-indexer --sitemap https://example.com/post-sitemap.xml");
        eprintln!();
        eprintln!("Or list them under `sitemaps` in {}.", config_path.display());
        std::process::exit(1);
    }

    let pool_count = match resolve_pool_count(&args, config.max_pools).await {
        Ok(count) => count,
        Err(e @ (PromptError::OutOfRange { .. } | PromptError::NotANumber(_))) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
        Err(e) => return Err(e).context("Failed to read number of accounts"),
    };

    // Ctrl+C restarts the whole batch from scratch; nothing is checkpointed.
    loop {
        tokio::select! {
            result = run(&config, pool_count, !args.no_progress) => {
                let summary = result?;
                println!(
                    "\nDone. {} of {} account(s) processed: {} URLs tried, {} successful, {} rate limited, {} other errors.",
                    summary.completed_pools(),
                    summary.pools.len(),
                    summary.totals.attempted,
                    summary.totals.successful,
                    summary.totals.rate_limited,
                    summary.totals.other_errors
                );
                return Ok(());
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nRun interrupted. Press Enter to restart from the beginning or Ctrl+C again to exit.");
                if !wait_for_restart().await {
                    println!("Exiting.");
                    std::process::exit(EXIT_INTERRUPTED);
                }
                tracing::info!("Restarting batch from the beginning");
            }
        }
    }
}

async fn resolve_pool_count(args: &Args, max: usize) -> Result<usize, PromptError> {
    if let Some(count) = args.pools {
        return prompt::validate_pool_count(count, max);
    }
    tokio::task::spawn_blocking(move || {
        prompt::ask_pool_count(std::io::stdin().lock(), std::io::stdout(), max)
    })
    .await
    .map_err(|e| PromptError::Io(std::io::Error::other(e)))?
}

async fn wait_for_restart() -> bool {
    let enter = tokio::task::spawn_blocking(|| prompt::wait_for_enter(std::io::stdin().lock()));
    tokio::select! {
        pressed = enter => matches!(pressed, Ok(Ok(true))),
        _ = tokio::signal::ctrl_c() => false,
    }
}

async fn run(config: &Config, pool_count: usize, show_progress: bool) -> Result<RunSummary> {
    let client = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()
        .context("Failed to build HTTP client")?;

    let urls = sitemap::collect_urls(&client, &config.sitemaps).await;
    if urls.is_empty() {
        anyhow::bail!("No URLs found in the sitemaps!");
    }
    println!("Found {} URLs in {} sitemap(s)", urls.len(), config.sitemaps.len());

    let transport = ReqwestTransport::new(&config.endpoint, config.request_timeout())
        .context("Failed to create publish client")?;
    let tokens = ServiceAccountTokenProvider::new(client, config.scope.clone());

    let mut settings = BatchSettings::from(config);
    settings.show_progress = show_progress;

    let orchestrator = Orchestrator::new(settings, transport, tokens);
    let summary = orchestrator.run(pool_count, &urls).await?;
    Ok(summary)
}
