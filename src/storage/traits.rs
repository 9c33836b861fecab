//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::crawler::Recipe;
use crate::storage::{CategoryResultRecord, RunRecord, RunStatus, StoredRecipe};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// The store owns its connection; the crawler only ever drives one commit at a
/// time, so no transaction is shared between writers.
pub trait RecipeStore {
    // ===== Recipes =====

    /// Upserts a category's records in one transaction, stamped with `now`
    ///
    /// Rows are keyed on `external_id`. New ids get `created_at = updated_at =
    /// now`; existing ids have `title`, `slug`, `image_url`, `category` and
    /// `updated_at` overwritten while `created_at` is kept. If any row fails
    /// the whole batch is rolled back. Rows absent from `records` are never
    /// touched.
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn commit_at(
        &mut self,
        category: &str,
        records: &[Recipe],
        now: DateTime<Utc>,
    ) -> StorageResult<usize>;

    /// Upserts a category's records in one transaction, stamped with the current time
    fn commit(&mut self, category: &str, records: &[Recipe]) -> StorageResult<usize> {
        self.commit_at(category, records, Utc::now())
    }

    /// Gets a recipe by its external id
    fn get_recipe(&self, external_id: i64) -> StorageResult<Option<StoredRecipe>>;

    /// Gets total recipe count
    fn count_recipes(&self) -> StorageResult<u64>;

    /// Gets recipe counts per category, largest first
    fn count_by_category(&self) -> StorageResult<Vec<(String, u64)>>;

    /// Gets the most recently updated recipes
    fn recent_recipes(&self, limit: usize) -> StorageResult<Vec<StoredRecipe>>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Sets the final status and finish timestamp of a run
    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Records how one category of a run ended
    fn record_category_result(
        &mut self,
        run_id: i64,
        result: &CategoryResultRecord,
    ) -> StorageResult<()>;

    /// Gets every category result of a run, in the order they were recorded
    fn get_category_results(&self, run_id: i64) -> StorageResult<Vec<CategoryResultRecord>>;
}
