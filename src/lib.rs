//! Bulk URL submission to the Google Indexing API.
//!
//! URLs are discovered from sitemaps, split into fixed-size slices (one per
//! service-account quota pool) and published pool by pool. Inside a pool
//! every URL is submitted concurrently; across pools the work is strictly
//! sequential so one account's quota usage never overlaps the next.
//!
//! - [`sitemap`] - sitemap fetching and `<loc>` extraction
//! - [`auth`] - service-account key files and bearer tokens
//! - [`publish`] - classification, retrying sender and per-pool dispatch
//! - [`batch`] - slicing the master list and driving pools in order
//! - [`config`] - TOML configuration with defaults
//! - [`prompt`] - interactive pool-count prompt

pub mod auth;
pub mod batch;
pub mod config;
pub mod prompt;
pub mod publish;
pub mod sitemap;
