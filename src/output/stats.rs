//! Statistics generation from the recipe database
//!
//! This module provides functionality for extracting and displaying
//! harvest statistics from the storage layer.

use crate::storage::{CategoryResultRecord, RecipeStore, RunRecord, StoredRecipe};
use crate::HarvestError;

/// Number of recently updated recipes shown by `--stats`
const RECENT_LIMIT: usize = 5;

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Total number of stored recipes
    pub total_recipes: u64,

    /// Recipe counts per category, largest first
    pub by_category: Vec<(String, u64)>,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,

    /// Per-category outcomes of the most recent run
    pub latest_results: Vec<CategoryResultRecord>,

    /// Most recently updated recipes
    pub recent: Vec<StoredRecipe>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `store` - The store to query
///
/// # Returns
///
/// * `Ok(HarvestStatistics)` - Successfully loaded statistics
/// * `Err(HarvestError)` - Failed to query statistics
pub fn load_statistics(store: &dyn RecipeStore) -> Result<HarvestStatistics, HarvestError> {
    let total_recipes = store.count_recipes()?;
    let by_category = store.count_by_category()?;
    let latest_run = store.get_latest_run()?;

    let latest_results = match &latest_run {
        Some(run) => store.get_category_results(run.id)?,
        None => Vec::new(),
    };

    let recent = store.recent_recipes(RECENT_LIMIT)?;

    Ok(HarvestStatistics {
        total_recipes,
        by_category,
        latest_run,
        latest_results,
        recent,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// `recipe_url` is the base canonical recipe URLs are built from.
pub fn print_statistics(stats: &HarvestStatistics, recipe_url: &url::Url) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Total recipes: {}", stats.total_recipes);
    println!("  Categories: {}", stats.by_category.len());
    println!();

    if !stats.by_category.is_empty() {
        println!("Recipes by Category:");
        for (category, count) in &stats.by_category {
            let percentage = if stats.total_recipes > 0 {
                (*count as f64 / stats.total_recipes as f64) * 100.0
            } else {
                0.0
            };
            println!("  {}: {} ({:.1}%)", category, count, percentage);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Config hash: {}", run.config_hash);

            for result in &stats.latest_results {
                print!(
                    "  - {}: {} ({} recipes, {} pages failed, {} items skipped)",
                    result.category,
                    result.status.to_db_string(),
                    result.records,
                    result.pages_failed,
                    result.extraction_errors
                );
                match &result.error_message {
                    Some(message) => println!(": {}", message),
                    None => println!(),
                }
            }
            println!();
        }
        None => println!("No harvest runs recorded yet\n"),
    }

    if !stats.recent.is_empty() {
        println!("Recently Updated:");
        for recipe in &stats.recent {
            match recipe.url(recipe_url) {
                Ok(url) => println!("  {} [{}] {}", recipe.title, recipe.category, url),
                Err(_) => println!("  {} [{}] {}", recipe.title, recipe.category, recipe.slug),
            }
        }
    }
}
