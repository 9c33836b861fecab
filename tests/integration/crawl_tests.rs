//! Integration tests for the harvester
//!
//! These tests use wiremock to serve listing pages and run the full
//! fetch, extract, commit cycle end-to-end against SQLite.

use chrono::{DateTime, Utc};
use recipe_harvest::ErrorKind;
use recipe_harvest::config::{Config, CrawlerConfig, OutputConfig, SiteConfig, UserAgentConfig};
use recipe_harvest::crawler::{crawl, Coordinator, Recipe};
use recipe_harvest::storage::{
    CategoryResultRecord, CategoryStatus, RecipeStore, RunRecord, RunStatus, SqliteStorage,
    StorageError, StorageResult, StoredRecipe,
};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

/// Creates a fast test configuration pointed at the mock server
fn create_test_config(server: &MockServer, categories: &[&str], max_pages: u32) -> Config {
    Config {
        categories: categories.iter().map(|c| c.to_string()).collect(),
        site: SiteConfig {
            search_url: format!("{}/cari", server.uri()),
            recipe_url: format!("{}/resep/", server.uri()),
        },
        crawler: CrawlerConfig {
            max_pages,
            max_concurrent_requests: 4,
            delay_ms: 0, // No politeness delay for testing
            jitter_ms: 0,
            request_timeout_secs: 5,
            retry_attempts: 0,
            retry_delay_ms: 0,
        },
        user_agent: UserAgentConfig::default(),
        output: OutputConfig {
            database_path: ":memory:".to_string(),
        },
    }
}

/// Renders a listing page with one `li` per (id, title) pair
fn listing_page(items: &[(i64, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(id, title)| {
            let slug = format!("{}-{}", id, title.to_lowercase().replace(' ', "-"));
            format!(
                r#"<li id="recipe_{id}">
                    <a href="/id/resep/{slug}">{title}</a>
                    <picture><img src="https://img.example.com/users/avatar_{id}.jpg"></picture>
                    <picture><img src="https://img.example.com/recipes/{id}.jpg"></picture>
                </li>"#
            )
        })
        .collect();

    format!(
        r#"<html><body><ul id="search-recipes-list">{}</ul></body></html>"#,
        items
    )
}

async fn mount_page(server: &MockServer, category: &str, page: u32, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/cari/{}", category)))
        .and(query_param("page", page.to_string()))
        .respond_with(response)
        .mount(server)
        .await;
}

fn html(body: String) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .set_body_string(body)
        .insert_header("content-type", "text/html; charset=utf-8")
}

#[tokio::test]
async fn test_single_category_end_to_end() {
    let server = MockServer::start().await;
    mount_page(&server, "ayam", 1, html(listing_page(&[(123, "Ayam Goreng")]))).await;
    mount_page(&server, "ayam", 2, html(listing_page(&[]))).await;

    let config = create_test_config(&server, &["ayam"], 2);
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage)
        .unwrap()
        .with_config_hash("test-hash");

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert!(!report.cancelled);
    assert_eq!(report.categories.len(), 1);
    let ayam = &report.categories[0];
    assert_eq!(ayam.status, CategoryStatus::Committed);
    assert_eq!(ayam.pages_requested, 2);
    assert_eq!(ayam.pages_fetched, 2);
    assert_eq!(ayam.records, 1);

    let store = coordinator.store();
    assert_eq!(store.count_recipes().unwrap(), 1);

    let recipe = store.get_recipe(123).unwrap().expect("recipe 123 stored");
    assert_eq!(recipe.title, "Ayam Goreng");
    assert_eq!(recipe.slug, "123-ayam-goreng");
    assert_eq!(recipe.category, "ayam");
    assert_eq!(recipe.image_url, "https://img.example.com/recipes/123.jpg");

    let run = store.get_latest_run().unwrap().unwrap();
    assert_eq!(run.id, report.run_id);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.config_hash, "test-hash");
    assert!(run.finished_at.is_some());

    let results = store.get_category_results(run.id).unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].status, CategoryStatus::Committed);
    assert_eq!(results[0].records, 1);
}

#[tokio::test]
async fn test_dead_pages_do_not_stop_the_category() {
    let server = MockServer::start().await;
    mount_page(&server, "ayam", 1, html(listing_page(&[(1, "Ayam Bakar")]))).await;
    mount_page(&server, "ayam", 2, ResponseTemplate::new(500)).await;
    mount_page(&server, "ayam", 3, ResponseTemplate::new(404)).await;
    mount_page(&server, "ayam", 4, html(listing_page(&[(4, "Ayam Geprek")]))).await;

    let config = create_test_config(&server, &["ayam"], 4);
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    let ayam = &report.categories[0];
    assert_eq!(ayam.status, CategoryStatus::Committed);
    assert_eq!(ayam.pages_fetched, 2);
    assert_eq!(ayam.pages_failed, 2);
    assert_eq!(ayam.records, 2);

    let store = coordinator.store();
    assert!(store.get_recipe(1).unwrap().is_some());
    assert!(store.get_recipe(4).unwrap().is_some());
}

#[tokio::test]
async fn test_bad_items_are_counted_and_skipped() {
    let server = MockServer::start().await;
    let page = r#"<html><body><ul id="recipes">
        <li id="recipe_1"><a href="/id/resep/soto-ayam">Soto Ayam</a></li>
        <li id="recipe_2"><a href="/id/resep/2-sate-ayam">Sate Ayam</a></li>
        <li id="ad_3"><a href="/id/resep/3-iklan">Iklan</a></li>
    </ul></body></html>"#;
    mount_page(&server, "ayam", 1, html(page.to_string())).await;

    let config = create_test_config(&server, &["ayam"], 1);
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    let ayam = &report.categories[0];
    assert_eq!(ayam.extraction_errors, 1);
    assert_eq!(ayam.records, 1);

    let store = coordinator.store();
    assert_eq!(store.count_recipes().unwrap(), 1);
    assert!(store.get_recipe(2).unwrap().is_some());
    assert!(store.get_recipe(3).unwrap().is_none());
}

#[tokio::test]
async fn test_duplicates_across_pages_keep_last_seen() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "ayam",
        1,
        html(listing_page(&[(7, "Ayam Goreng"), (8, "Ayam Bakar")])),
    )
    .await;
    mount_page(&server, "ayam", 2, html(listing_page(&[(7, "Ayam Goreng Kremes")]))).await;

    let config = create_test_config(&server, &["ayam"], 2);
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.categories[0].records, 2);
    let store = coordinator.store();
    assert_eq!(store.count_recipes().unwrap(), 2);
    assert_eq!(
        store.get_recipe(7).unwrap().unwrap().title,
        "Ayam Goreng Kremes"
    );
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let server = MockServer::start().await;
    mount_page(&server, "ayam", 1, html(listing_page(&[(123, "Ayam Goreng")]))).await;

    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("recipes.db");
    let config = create_test_config(&server, &["ayam"], 1);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let (first, storage) = crawl(config.clone(), "hash", storage, &CancellationToken::new())
        .await
        .unwrap();
    let before = storage.get_recipe(123).unwrap().unwrap();
    drop(storage);

    let storage = SqliteStorage::new(&db_path).unwrap();
    let (second, storage) = crawl(config, "hash", storage, &CancellationToken::new())
        .await
        .unwrap();
    let after = storage.get_recipe(123).unwrap().unwrap();

    assert_ne!(first.run_id, second.run_id);
    assert_eq!(storage.count_recipes().unwrap(), 1);
    assert_eq!(before.created_at, after.created_at);
    assert_eq!(after.title, "Ayam Goreng");
}

#[tokio::test]
async fn test_cancelled_run_skips_every_category() {
    let server = MockServer::start().await;
    mount_page(&server, "ayam", 1, html(listing_page(&[(1, "Ayam Goreng")]))).await;

    let config = create_test_config(&server, &["ayam", "ikan"], 1);
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();

    let cancel = CancellationToken::new();
    cancel.cancel();
    let report = coordinator.run(&cancel).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.skipped().count(), 2);

    let store = coordinator.store();
    assert_eq!(store.count_recipes().unwrap(), 0);
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Cancelled
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}

/// Serves a listing page and cancels the run while doing so
struct CancelWhileServing {
    body: String,
    cancel: CancellationToken,
}

impl Respond for CancelWhileServing {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        self.cancel.cancel();
        html(self.body.clone())
    }
}

#[tokio::test]
async fn test_cancel_mid_category_commits_collected_records() {
    let server = MockServer::start().await;
    let cancel = CancellationToken::new();

    Mock::given(method("GET"))
        .and(path("/cari/ayam"))
        .and(query_param("page", "1"))
        .respond_with(CancelWhileServing {
            body: listing_page(&[(123, "Ayam Goreng")]),
            cancel: cancel.clone(),
        })
        .mount(&server)
        .await;
    for page in 2..=5 {
        mount_page(&server, "ayam", page, html(listing_page(&[]))).await;
    }
    mount_page(&server, "ikan", 1, html(listing_page(&[(2, "Ikan Bakar")]))).await;

    let mut config = create_test_config(&server, &["ayam", "ikan"], 5);
    config.crawler.max_concurrent_requests = 1;
    let storage = SqliteStorage::new_in_memory().unwrap();
    let mut coordinator = Coordinator::new(config, storage).unwrap();

    let report = coordinator.run(&cancel).await.unwrap();

    assert!(report.cancelled);
    let ayam = &report.categories[0];
    assert_eq!(ayam.status, CategoryStatus::Committed);
    assert_eq!(ayam.records, 1);
    assert!(ayam.pages_fetched >= 1);
    assert_eq!(ayam.pages_fetched + ayam.pages_skipped, 5);
    assert_eq!(report.categories[1].status, CategoryStatus::Skipped);

    let store = coordinator.store();
    assert_eq!(store.count_recipes().unwrap(), 1);
    assert_eq!(store.get_recipe(123).unwrap().unwrap().category, "ayam");
    assert!(store.get_recipe(2).unwrap().is_none());
    assert_eq!(
        store.get_latest_run().unwrap().unwrap().status,
        RunStatus::Cancelled
    );

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/cari/ikan"));
}

/// Store that refuses to commit one category and delegates everything else
struct FailingStore {
    inner: SqliteStorage,
    failing_category: &'static str,
}

impl RecipeStore for FailingStore {
    fn commit_at(
        &mut self,
        category: &str,
        records: &[Recipe],
        now: DateTime<Utc>,
    ) -> StorageResult<usize> {
        if category == self.failing_category {
            return Err(StorageError::Database("database is locked".to_string()));
        }
        self.inner.commit_at(category, records, now)
    }

    fn get_recipe(&self, external_id: i64) -> StorageResult<Option<StoredRecipe>> {
        self.inner.get_recipe(external_id)
    }

    fn count_recipes(&self) -> StorageResult<u64> {
        self.inner.count_recipes()
    }

    fn count_by_category(&self) -> StorageResult<Vec<(String, u64)>> {
        self.inner.count_by_category()
    }

    fn recent_recipes(&self, limit: usize) -> StorageResult<Vec<StoredRecipe>> {
        self.inner.recent_recipes(limit)
    }

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        self.inner.create_run(config_hash)
    }

    fn finish_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        self.inner.finish_run(run_id, status)
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        self.inner.get_latest_run()
    }

    fn record_category_result(
        &mut self,
        run_id: i64,
        result: &CategoryResultRecord,
    ) -> StorageResult<()> {
        self.inner.record_category_result(run_id, result)
    }

    fn get_category_results(&self, run_id: i64) -> StorageResult<Vec<CategoryResultRecord>> {
        self.inner.get_category_results(run_id)
    }
}

#[tokio::test]
async fn test_persistence_failure_does_not_stop_next_category() {
    let server = MockServer::start().await;
    mount_page(&server, "ayam", 1, html(listing_page(&[(1, "Ayam Goreng")]))).await;
    mount_page(&server, "ikan", 1, html(listing_page(&[(2, "Ikan Bakar")]))).await;

    let config = create_test_config(&server, &["ayam", "ikan"], 1);
    let store = FailingStore {
        inner: SqliteStorage::new_in_memory().unwrap(),
        failing_category: "ayam",
    };
    let mut coordinator = Coordinator::new(config, store).unwrap();

    let report = coordinator.run(&CancellationToken::new()).await.unwrap();

    assert_eq!(report.failed().count(), 1);
    assert_eq!(report.committed().count(), 1);
    let ayam = &report.categories[0];
    assert_eq!(ayam.status, CategoryStatus::Failed);
    assert_eq!(ayam.error_kind, Some(ErrorKind::Persistence));
    assert_eq!(report.worst_error_kind(), Some(ErrorKind::Persistence));
    assert!(ayam
        .error
        .as_deref()
        .unwrap_or_default()
        .contains("database is locked"));

    let store = coordinator.store();
    assert!(store.get_recipe(1).unwrap().is_none());
    assert_eq!(store.get_recipe(2).unwrap().unwrap().category, "ikan");

    let results = store.get_category_results(report.run_id).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].status, CategoryStatus::Failed);
    assert_eq!(results[1].status, CategoryStatus::Committed);
}
