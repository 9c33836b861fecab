//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Recipe-Harvest database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Harvested recipes, keyed by the site's recipe id
CREATE TABLE IF NOT EXISTS recipes (
    external_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL CHECK (length(title) > 0),
    slug TEXT NOT NULL,
    image_url TEXT NOT NULL DEFAULT '',
    category TEXT NOT NULL,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_recipes_category ON recipes(category);
CREATE INDEX IF NOT EXISTS idx_recipes_updated_at ON recipes(updated_at);

-- Track crawl runs
CREATE TABLE IF NOT EXISTS runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- Per-category outcome of each run
CREATE TABLE IF NOT EXISTS category_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    run_id INTEGER NOT NULL REFERENCES runs(id),
    category TEXT NOT NULL,
    status TEXT NOT NULL,
    records INTEGER NOT NULL DEFAULT 0,
    pages_failed INTEGER NOT NULL DEFAULT 0,
    extraction_errors INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    recorded_at TEXT NOT NULL,
    UNIQUE(run_id, category)
);

CREATE INDEX IF NOT EXISTS idx_category_results_run ON category_results(run_id);
"#;

/// Upsert for one recipe row
///
/// `?6` is used for both timestamps on insert; on conflict only `updated_at`
/// moves, so `created_at` keeps the first-seen time.
pub const UPSERT_RECIPE_SQL: &str = "
INSERT INTO recipes (external_id, title, slug, image_url, category, created_at, updated_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
ON CONFLICT (external_id) DO UPDATE SET
    title = excluded.title,
    slug = excluded.slug,
    image_url = excluded.image_url,
    category = excluded.category,
    updated_at = excluded.updated_at
";

/// Initializes the database schema
///
/// # Arguments
///
/// * `conn` - The database connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
