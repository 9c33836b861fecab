//! Crawler module for listing page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - Recipe extraction from listing pages
//! - Concurrent HTTP fetching with retry logic
//! - Per-domain concurrency and politeness delays
//! - Per-category crawl coordination

mod coordinator;
mod fetcher;
mod limiter;
mod parser;

pub use coordinator::{category_page_url, CategoryReport, Coordinator, RecipeBatch, RunReport};
pub use fetcher::{build_http_client, fetch_page, FetchError, Fetcher, PageOutcome, PageRequest};
pub use limiter::{DomainLimiter, DomainSlot};
pub use parser::{
    extract_recipes, parse_external_id, ExtractionError, PageExtraction, Recipe, RecipeExtractor,
};

use crate::config::Config;
use crate::storage::RecipeStore;
use crate::HarvestError;
use tokio_util::sync::CancellationToken;

/// Runs a complete harvest over every configured category
///
/// This is the main entry point for starting a harvest. It will:
/// 1. Build the HTTP client and domain limiter
/// 2. Record a new run in the store
/// 3. Crawl each category's listing pages and extract recipes
/// 4. Commit each category's records in its own transaction
///
/// # Arguments
///
/// * `config` - The harvester configuration
/// * `config_hash` - Hash of the configuration text, stored with the run
/// * `store` - The store records are written to
/// * `cancel` - Stops issuing new requests once triggered
///
/// # Returns
///
/// * `Ok((RunReport, S))` - The run report and the store handed back
/// * `Err(HarvestError)` - The run could not be started or recorded
pub async fn crawl<S: RecipeStore>(
    config: Config,
    config_hash: &str,
    store: S,
    cancel: &CancellationToken,
) -> Result<(RunReport, S), HarvestError> {
    let mut coordinator = Coordinator::new(config, store)?.with_config_hash(config_hash);
    let report = coordinator.run(cancel).await?;
    Ok((report, coordinator.into_store()))
}
