//! Sitemap discovery: turns sitemap URLs into the master list of page URLs.
//!
//! - [`parser`] - namespace-aware `<loc>` extraction with `quick-xml`
//! - [`fetcher`] - HTTP retrieval that never fails the run

mod fetcher;
mod parser;

use thiserror::Error;

pub use fetcher::{collect_urls, fetch_urls};
pub use parser::{parse_sitemap, SitemapDocument, SitemapKind, SITEMAP_NS};

/// Errors from fetching or parsing one sitemap.
///
/// These never reach the caller of [`fetch_urls`]; they are logged and the
/// sitemap contributes no URLs.
#[derive(Debug, Error)]
pub enum SitemapError {
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Request timed out")]
    Timeout,
    #[error("Sitemap too large (exceeds {0} bytes)")]
    TooLarge(usize),
    #[error("Parse error: {0}")]
    Parse(String),
}
