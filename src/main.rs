//! Recipe-Harvest main entry point
//!
//! This is the command-line interface for the Recipe-Harvest listing crawler.

use clap::Parser;
use recipe_harvest::config::{load_config_with_hash, Config};
use recipe_harvest::crawler::{category_page_url, crawl};
use recipe_harvest::output::{load_statistics, print_run_report, print_statistics};
use recipe_harvest::storage::SqliteStorage;
use recipe_harvest::{ErrorKind, HarvestError};
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Recipe-Harvest: a polite recipe listing harvester
///
/// Recipe-Harvest walks the paginated search listings of a recipe site for
/// each configured category, extracts the recipes it finds, and upserts them
/// into a SQLite database.
#[derive(Parser, Debug)]
#[command(name = "recipe-harvest")]
#[command(version = "1.0.0")]
#[command(about = "A polite recipe listing harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            std::process::exit(HarvestError::from(e).kind().exit_code());
        }
    };

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else {
        handle_harvest(config, &config_hash).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("recipe_harvest=info,warn"),
            1 => EnvFilter::new("recipe_harvest=debug,info"),
            2 => EnvFilter::new("recipe_harvest=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles the --dry-run mode: validates config and shows the URL plan
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Recipe-Harvest Dry Run ===\n");

    println!("Site:");
    println!("  Search URL: {}", config.site.search_url);
    println!("  Recipe URL: {}", config.site.recipe_url);

    println!("\nCrawler Configuration:");
    println!("  Max pages per category: {}", config.crawler.max_pages);
    println!(
        "  Max concurrent requests: {}",
        config.crawler.max_concurrent_requests
    );
    println!(
        "  Delay between requests: {}ms (+ up to {}ms jitter)",
        config.crawler.delay_ms, config.crawler.jitter_ms
    );
    println!("  Request timeout: {}s", config.crawler.request_timeout_secs);
    println!(
        "  Retries: {} (after {}ms)",
        config.crawler.retry_attempts, config.crawler.retry_delay_ms
    );

    println!("\nUser Agent:");
    println!("  {}", config.user_agent.value);

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);

    let search_url = Url::parse(&config.site.search_url)?;
    let last_page = config.crawler.max_pages;

    println!("\nCategories ({}):", config.categories.len());
    for category in &config.categories {
        let first = category_page_url(&search_url, category, 1)?;
        let last = category_page_url(&search_url, category, last_page)?;
        println!("  - {}", category);
        println!("    * {}", first);
        if last_page > 1 {
            println!("    * ... {}", last);
        }
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would request {} listing pages",
        config.categories.len() as u64 * last_page as u64
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Database: {}\n", config.output.database_path);

    // Open the database
    let storage = SqliteStorage::new(Path::new(&config.output.database_path))?;

    // Load statistics
    let stats = load_statistics(&storage)?;
    let recipe_url = Url::parse(&config.site.recipe_url)?;

    // Print statistics
    print_statistics(&stats, &recipe_url);

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(
    config: Config,
    config_hash: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Categories: {}, pages per category: {}",
        config.categories.join(", "),
        config.crawler.max_pages
    );

    let storage = match SqliteStorage::new(Path::new(&config.output.database_path)) {
        Ok(storage) => storage,
        Err(e) => {
            tracing::error!(
                "Failed to open database {}: {}",
                config.output.database_path,
                e
            );
            // An unopenable database is a startup failure, whatever its cause
            std::process::exit(ErrorKind::Startup.exit_code());
        }
    };

    // Ctrl-C stops new requests; whatever was collected is still committed
    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current category");
            signal_token.cancel();
        }
    });

    let (report, storage) = match crawl(config, config_hash, storage, &cancel).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            std::process::exit(e.kind().exit_code().max(1));
        }
    };
    drop(storage);

    print_run_report(&report);

    if let Some(kind) = report.worst_error_kind() {
        let code = kind.exit_code();
        if code != 0 {
            tracing::error!("Harvest finished with {:?} failures", kind);
            std::process::exit(code);
        }
    }

    Ok(())
}
