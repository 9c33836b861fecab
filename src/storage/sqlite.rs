//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the RecipeStore trait.

use crate::crawler::Recipe;
use crate::storage::schema::{initialize_schema, UPSERT_RECIPE_SQL};
use crate::storage::traits::{RecipeStore, StorageError, StorageResult};
use crate::storage::{
    CategoryResultRecord, CategoryStatus, RunRecord, RunStatus, StoredRecipe,
};
use crate::HarvestError;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;

const RECIPE_COLUMNS: &str =
    "external_id, title, slug, image_url, category, created_at, updated_at";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(HarvestError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, HarvestError> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, HarvestError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<StoredRecipe> {
    Ok(StoredRecipe {
        external_id: row.get(0)?,
        title: row.get(1)?,
        slug: row.get(2)?,
        image_url: row.get(3)?,
        category: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
    })
}

fn run_from_row(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
    })
}

impl RecipeStore for SqliteStorage {
    // ===== Recipes =====

    fn commit_at(
        &mut self,
        category: &str,
        records: &[Recipe],
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        let now = now.to_rfc3339();

        // Write lock is taken at BEGIN
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        {
            let mut stmt = tx.prepare_cached(UPSERT_RECIPE_SQL)?;
            for recipe in records {
                stmt.execute(params![
                    recipe.external_id,
                    recipe.title,
                    recipe.slug,
                    recipe.image_url,
                    category,
                    now
                ])
                .map_err(|e| {
                    StorageError::Database(format!(
                        "upsert of recipe {} failed: {}",
                        recipe.external_id, e
                    ))
                })?;
            }
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;

        tracing::debug!("Committed {} recipes for '{}'", records.len(), category);
        Ok(records.len())
    }

    fn get_recipe(&self, external_id: i64) -> StorageResult<Option<StoredRecipe>> {
        let recipe = self
            .conn
            .query_row(
                &format!("SELECT {} FROM recipes WHERE external_id = ?1", RECIPE_COLUMNS),
                params![external_id],
                recipe_from_row,
            )
            .optional()?;

        Ok(recipe)
    }

    fn count_recipes(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM recipes", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, COUNT(*) AS n FROM recipes GROUP BY category ORDER BY n DESC, category ASC",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)? as u64))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    fn recent_recipes(&self, limit: usize) -> StorageResult<Vec<StoredRecipe>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM recipes ORDER BY updated_at DESC, external_id DESC LIMIT ?1",
            RECIPE_COLUMNS
        ))?;

        let recipes = stmt
            .query_map(params![limit as i64], recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(recipes)
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn record_category_result(
        &mut self,
        run_id: i64,
        result: &CategoryResultRecord,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO category_results
             (run_id, category, status, records, pages_failed, extraction_errors, error_message, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT (run_id, category) DO UPDATE SET
                status = excluded.status,
                records = excluded.records,
                pages_failed = excluded.pages_failed,
                extraction_errors = excluded.extraction_errors,
                error_message = excluded.error_message,
                recorded_at = excluded.recorded_at",
            params![
                run_id,
                result.category,
                result.status.to_db_string(),
                result.records as i64,
                result.pages_failed as i64,
                result.extraction_errors as i64,
                result.error_message,
                now
            ],
        )?;
        Ok(())
    }

    fn get_category_results(&self, run_id: i64) -> StorageResult<Vec<CategoryResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT category, status, records, pages_failed, extraction_errors, error_message
             FROM category_results WHERE run_id = ?1 ORDER BY id ASC",
        )?;

        let results = stmt
            .query_map(params![run_id], |row| {
                Ok(CategoryResultRecord {
                    category: row.get(0)?,
                    status: CategoryStatus::from_db_string(&row.get::<_, String>(1)?)
                        .unwrap_or(CategoryStatus::Failed),
                    records: row.get::<_, i64>(2)? as u64,
                    pages_failed: row.get::<_, i64>(3)? as u64,
                    extraction_errors: row.get::<_, i64>(4)? as u64,
                    error_message: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }
}
