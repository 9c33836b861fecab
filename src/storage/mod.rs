//! Storage module for persisting harvested recipes
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Transactional, idempotent recipe upserts per category
//! - Run and per-category outcome tracking

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{RecipeStore, StorageError, StorageResult};

/// A recipe row as stored in the database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRecipe {
    pub external_id: i64,
    pub title: String,
    pub slug: String,
    pub image_url: String,
    pub category: String,
    pub created_at: String,
    pub updated_at: String,
}

impl StoredRecipe {
    /// Builds the canonical recipe URL from the slug
    pub fn url(&self, recipe_base: &url::Url) -> Result<url::Url, url::ParseError> {
        recipe_base.join(&self.slug)
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Cancelled,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }
}

/// Outcome of one category within a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryStatus {
    /// The category's batch was committed
    Committed,
    /// The batch was rolled back; nothing from this category was written
    Failed,
    /// Cancelled before any page was fetched
    Skipped,
}

impl CategoryStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Committed => "committed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "committed" => Some(Self::Committed),
            "failed" => Some(Self::Failed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Persisted summary of one category within a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryResultRecord {
    pub category: String,
    pub status: CategoryStatus,
    pub records: u64,
    pub pages_failed: u64,
    pub extraction_errors: u64,
    pub error_message: Option<String>,
}
