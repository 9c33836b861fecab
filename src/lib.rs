//! Recipe-Harvest: a polite recipe listing harvester
//!
//! This crate crawls the paginated search listings of a recipe site for a set of
//! category keywords, extracts recipe records from each listing page, and upserts
//! them into a SQLite store keyed by the site's recipe id.

pub mod config;
pub mod crawler;
pub mod output;
pub mod storage;

use thiserror::Error;

/// Main error type for Recipe-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] crawler::FetchError),

    #[error("Extraction error: {0}")]
    Extraction(#[from] crawler::ExtractionError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Coarse classification used to decide how far an error propagates
///
/// Extraction and fetch errors are absorbed per item and per URL, persistence
/// errors fail a single category, and startup errors end the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Extraction,
    Fetch,
    Persistence,
    Startup,
}

impl HarvestError {
    /// Returns the propagation class of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Extraction(_) => ErrorKind::Extraction,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::Storage(_) | Self::Database(_) => ErrorKind::Persistence,
            Self::Config(_) | Self::UrlParse(_) | Self::Reqwest(_) | Self::Io(_) => {
                ErrorKind::Startup
            }
        }
    }
}

impl ErrorKind {
    /// Process exit status for a run that ended with this kind of error
    ///
    /// Extraction and fetch errors never fail a run on their own.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Extraction | Self::Fetch => 0,
            Self::Persistence => 1,
            Self::Startup => 2,
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Recipe-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Coordinator, Recipe};
pub use storage::{RecipeStore, SqliteStorage};
