//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the harvesting process, including:
//! - Generating listing page URLs for each category
//! - Fanning page fetches out through the [`Fetcher`] and draining them
//! - Extracting and de-duplicating records per category
//! - Committing each category's batch and recording how it went

use crate::config::Config;
use crate::crawler::fetcher::{Fetcher, PageRequest};
use crate::crawler::parser::{Recipe, RecipeExtractor};
use crate::storage::{CategoryResultRecord, CategoryStatus, RecipeStore, RunStatus};
use crate::{ConfigError, ErrorKind, HarvestError};
use std::collections::{BTreeMap, HashMap};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use url::Url;

/// Accumulates one category's records across its pages
///
/// Pages arrive in completion order, but merging happens in page-number order,
/// so "last seen" for a duplicated id means the last sighting in crawl
/// sequence, not whichever response happened to land last.
#[derive(Debug, Default)]
pub struct RecipeBatch {
    pages: BTreeMap<u32, Vec<Recipe>>,
}

impl RecipeBatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the records extracted from one page
    pub fn add_page(&mut self, page: u32, records: Vec<Recipe>) {
        self.pages.entry(page).or_default().extend(records);
    }

    /// Number of records added, duplicates included
    pub fn raw_len(&self) -> usize {
        self.pages.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_len() == 0
    }

    /// Merges all pages into a list with unique external ids
    ///
    /// Each id keeps the position of its first sighting and the fields of its
    /// last one.
    pub fn into_records(self) -> Vec<Recipe> {
        let mut records: Vec<Recipe> = Vec::new();
        let mut positions: HashMap<i64, usize> = HashMap::new();

        for recipe in self.pages.into_values().flatten() {
            match positions.get(&recipe.external_id) {
                Some(&index) => records[index] = recipe,
                None => {
                    positions.insert(recipe.external_id, records.len());
                    records.push(recipe);
                }
            }
        }

        records
    }
}

/// How one category's crawl went
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryReport {
    pub category: String,
    pub status: CategoryStatus,

    /// Pages issued for this category
    pub pages_requested: u32,

    /// Pages retrieved and handed to the extractor
    pub pages_fetched: u32,

    /// Pages that failed (network, timeout, non-2xx)
    pub pages_failed: u32,

    /// Pages never requested because the run was cancelled
    pub pages_skipped: u32,

    /// Listing items that could not be turned into records
    pub extraction_errors: u32,

    /// Unique records handed to the writer
    pub records: usize,

    /// Why the category failed, if it did
    pub error: Option<String>,

    /// Propagation class of that failure
    pub error_kind: Option<ErrorKind>,
}

impl CategoryReport {
    fn new(category: &str, pages_requested: u32) -> Self {
        Self {
            category: category.to_string(),
            status: CategoryStatus::Skipped,
            pages_requested,
            pages_fetched: 0,
            pages_failed: 0,
            pages_skipped: 0,
            extraction_errors: 0,
            records: 0,
            error: None,
            error_kind: None,
        }
    }

    fn fail(&mut self, error: HarvestError) {
        self.status = CategoryStatus::Failed;
        self.error_kind = Some(error.kind());
        self.error = Some(error.to_string());
    }

    fn to_record(&self) -> CategoryResultRecord {
        CategoryResultRecord {
            category: self.category.clone(),
            status: self.status,
            records: self.records as u64,
            pages_failed: self.pages_failed as u64,
            extraction_errors: self.extraction_errors as u64,
            error_message: self.error.clone(),
        }
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: i64,
    pub categories: Vec<CategoryReport>,
    pub cancelled: bool,
    pub elapsed: Duration,
}

impl RunReport {
    fn with_status(&self, status: CategoryStatus) -> impl Iterator<Item = &CategoryReport> {
        self.categories.iter().filter(move |c| c.status == status)
    }

    pub fn committed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.with_status(CategoryStatus::Committed)
    }

    pub fn failed(&self) -> impl Iterator<Item = &CategoryReport> {
        self.with_status(CategoryStatus::Failed)
    }

    pub fn skipped(&self) -> impl Iterator<Item = &CategoryReport> {
        self.with_status(CategoryStatus::Skipped)
    }

    /// Records written across all committed categories
    pub fn total_records(&self) -> usize {
        self.committed().map(|c| c.records).sum()
    }

    /// Most severe failure among the categories, judged by exit code
    pub fn worst_error_kind(&self) -> Option<ErrorKind> {
        self.categories
            .iter()
            .filter_map(|c| c.error_kind)
            .max_by_key(ErrorKind::exit_code)
    }
}

/// Builds `<search_url>/<category>?page=<page>`
///
/// The category is pushed as a single percent-encoded path segment.
pub fn category_page_url(search_url: &Url, category: &str, page: u32) -> Result<Url, HarvestError> {
    let mut url = search_url.clone();

    url.path_segments_mut()
        .map_err(|_| {
            ConfigError::InvalidUrl(format!("{} cannot be used as a base URL", search_url))
        })?
        .pop_if_empty()
        .push(category);

    url.query_pairs_mut()
        .append_pair("page", &page.to_string());

    Ok(url)
}

/// Main crawler coordinator structure
pub struct Coordinator<S: RecipeStore> {
    config: Config,
    store: S,
    fetcher: Fetcher,
    extractor: RecipeExtractor,
    search_url: Url,
    config_hash: String,
}

impl<S: RecipeStore> Coordinator<S> {
    /// Creates a new coordinator with a fetcher built from the configuration
    ///
    /// # Arguments
    ///
    /// * `config` - The harvester configuration
    /// * `store` - An opened store; the coordinator writes through it but the
    ///   caller decides its lifetime via [`Coordinator::into_store`]
    pub fn new(config: Config, store: S) -> Result<Self, HarvestError> {
        let fetcher = Fetcher::from_config(&config.crawler, &config.user_agent)?;
        Self::with_fetcher(config, store, fetcher)
    }

    /// Creates a coordinator around an existing fetcher
    pub fn with_fetcher(config: Config, store: S, fetcher: Fetcher) -> Result<Self, HarvestError> {
        let search_url = Url::parse(&config.site.search_url)?;
        let extractor = RecipeExtractor::new()?;

        Ok(Self {
            config,
            store,
            fetcher,
            extractor,
            search_url,
            config_hash: String::new(),
        })
    }

    /// Sets the configuration hash recorded with each run
    pub fn with_config_hash(mut self, config_hash: impl Into<String>) -> Self {
        self.config_hash = config_hash.into();
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Hands the store back to the caller
    pub fn into_store(self) -> S {
        self.store
    }

    /// Builds the page requests `1..=max_pages` for a category
    pub fn page_requests(&self, category: &str) -> Result<Vec<PageRequest>, HarvestError> {
        (1..=self.config.crawler.max_pages)
            .map(|page| {
                Ok(PageRequest {
                    page,
                    url: category_page_url(&self.search_url, category, page)?,
                })
            })
            .collect()
    }

    /// Runs every configured category, one after another
    ///
    /// Fetch and extraction failures are counted per category, and a failed
    /// commit only fails its own category. Once `cancel` fires, the category in
    /// progress still commits what it collected and the remaining categories
    /// are reported as skipped.
    ///
    /// # Returns
    ///
    /// * `Ok(RunReport)` - Every category was attempted
    /// * `Err(HarvestError)` - The run could not be recorded in the store
    pub async fn run(&mut self, cancel: &CancellationToken) -> Result<RunReport, HarvestError> {
        let start_time = Instant::now();
        let run_id = self.store.create_run(&self.config_hash)?;
        tracing::info!(
            "Starting harvest run {} over {} categories",
            run_id,
            self.config.categories.len()
        );

        let categories = self.config.categories.clone();
        let mut reports = Vec::with_capacity(categories.len());

        for category in &categories {
            let report = if cancel.is_cancelled() {
                tracing::info!("Skipping category '{}': run cancelled", category);
                CategoryReport::new(category, 0)
            } else {
                self.crawl_category(category, cancel).await
            };

            if let Err(e) = self.store.record_category_result(run_id, &report.to_record()) {
                tracing::warn!("Failed to record result for '{}': {}", category, e);
            }
            reports.push(report);
        }

        let cancelled = cancel.is_cancelled();
        let status = if cancelled {
            RunStatus::Cancelled
        } else {
            RunStatus::Completed
        };
        self.store.finish_run(run_id, status)?;

        let report = RunReport {
            run_id,
            categories: reports,
            cancelled,
            elapsed: start_time.elapsed(),
        };

        tracing::info!(
            "Harvest run {} finished in {:?}: {} committed, {} failed, {} skipped, {} recipes",
            run_id,
            report.elapsed,
            report.committed().count(),
            report.failed().count(),
            report.skipped().count(),
            report.total_records()
        );

        Ok(report)
    }

    /// Crawls every page of one category, then commits the batch
    ///
    /// The commit only happens after the fetch channel has drained, i.e.
    /// every page has produced a body, a failure, or a cancellation.
    pub async fn crawl_category(
        &mut self,
        category: &str,
        cancel: &CancellationToken,
    ) -> CategoryReport {
        let requests = match self.page_requests(category) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::error!("Cannot build page URLs for '{}': {}", category, e);
                let mut report = CategoryReport::new(category, 0);
                report.fail(e);
                return report;
            }
        };

        let mut report = CategoryReport::new(category, requests.len() as u32);
        tracing::info!("Crawling category '{}' ({} pages)", category, requests.len());

        let mut batch = RecipeBatch::new();
        let mut outcomes = self.fetcher.fetch_all(requests, cancel);

        while let Some(outcome) = outcomes.recv().await {
            match outcome.result {
                Ok(body) => {
                    report.pages_fetched += 1;
                    let page = self.extractor.extract(&body, &outcome.url, category);
                    report.extraction_errors += page.errors.len() as u32;
                    tracing::debug!(
                        "Page {} of '{}': {} recipes",
                        outcome.page,
                        category,
                        page.records.len()
                    );
                    batch.add_page(outcome.page, page.records);
                }
                Err(e) if e.is_cancelled() => report.pages_skipped += 1,
                Err(e) => {
                    report.pages_failed += 1;
                    tracing::warn!("Page {} of '{}' failed: {}", outcome.page, category, e);
                }
            }
        }

        if report.pages_fetched == 0 && report.pages_skipped == report.pages_requested {
            tracing::info!("Category '{}' cancelled before any page was fetched", category);
            return report;
        }

        let raw = batch.raw_len();
        let records = batch.into_records();
        if raw > records.len() {
            tracing::debug!(
                "Collapsed {} duplicate sightings in '{}'",
                raw - records.len(),
                category
            );
        }

        match self.store.commit(category, &records) {
            Ok(written) => {
                report.status = CategoryStatus::Committed;
                report.records = written;
                tracing::info!(
                    "Category '{}' committed {} recipes ({} pages failed, {} items skipped)",
                    category,
                    written,
                    report.pages_failed,
                    report.extraction_errors
                );
            }
            Err(e) => {
                tracing::error!("Commit for '{}' rolled back: {}", category, e);
                report.fail(e.into());
            }
        }

        report
    }
}
