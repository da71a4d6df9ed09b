//! Offline tests for hotdeal-db configuration and row mapping.
//! These tests do not require a live database connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::PathBuf;

use chrono::Utc;
use hotdeal_core::{AppConfig, Category, Deal, Environment, StorageBackend};
use hotdeal_db::{DealRow, JsonStore, PoolConfig, Storage};

fn app_config(storage: StorageBackend, data_dir: PathBuf) -> AppConfig {
    AppConfig {
        env: Environment::Test,
        storage,
        database_url: None,
        data_dir,
        bind_addr: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 3000),
        log_level: "info".to_string(),
        sources_path: PathBuf::from("./config/sources.yaml"),
        db_max_connections: 42,
        db_min_connections: 7,
        db_acquire_timeout_secs: 9,
        scraper_request_timeout_secs: 10,
        scraper_user_agent: "ua".to_string(),
        scraper_max_retries: 2,
        scraper_retry_backoff_base_secs: 1,
        max_items_per_source: 15,
        cache_ttl_minutes: 10,
        cache_cleanup_interval_secs: 300,
        collect_cron: "0 */10 * * * *".to_string(),
        retention_days: 30,
    }
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let config = app_config(StorageBackend::Postgres, PathBuf::from("./data-local"));
    let pool_config = PoolConfig::from_app_config(&config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

#[test]
fn deal_row_maps_to_deal() {
    let now = Utc::now();
    let row = DealRow {
        id: "ruliweb-3".to_string(),
        title: "PS5 (498,000원/무료)".to_string(),
        price: Some(498_000),
        original_price: Some(498_000),
        discount_rate: 0,
        has_price: true,
        price_text: "498,000원".to_string(),
        mall_name: "루리웹".to_string(),
        mall_logo: "🎮".to_string(),
        category: "gaming".to_string(),
        tags: vec!["🚚 무배".to_string()],
        url: "https://bbs.ruliweb.com/market/board/1020/read/3".to_string(),
        description: String::new(),
        pub_date: now,
        source: "RSS-루리웹".to_string(),
        delivery_info: "무료배송".to_string(),
        crawled_at: now,
        created_at: now,
        updated_at: now,
    };

    let deal = Deal::from(row);
    assert_eq!(deal.id, "ruliweb-3");
    assert_eq!(deal.category, Category::Gaming);
    assert_eq!(deal.tags, vec!["🚚 무배"]);
}

#[test]
fn unknown_category_column_maps_to_general() {
    let now = Utc::now();
    let row = DealRow {
        id: "x-1".to_string(),
        title: "t".to_string(),
        price: None,
        original_price: None,
        discount_rate: 0,
        has_price: false,
        price_text: "가격 정보 없음".to_string(),
        mall_name: String::new(),
        mall_logo: String::new(),
        category: "electronics".to_string(),
        tags: vec![],
        url: String::new(),
        description: String::new(),
        pub_date: now,
        source: String::new(),
        delivery_info: "원문 확인".to_string(),
        crawled_at: now,
        created_at: now,
        updated_at: now,
    };
    assert_eq!(Deal::from(row).category, Category::General);
}

#[tokio::test]
async fn connect_json_backend_creates_data_dir() {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().join("data-local");
    let storage = Storage::connect(&app_config(StorageBackend::Json, data_dir.clone()))
        .await
        .expect("json backend connects");

    assert_eq!(storage.backend(), StorageBackend::Json);
    assert!(data_dir.is_dir());
}

#[tokio::test]
async fn connect_postgres_without_url_fails() {
    let config = app_config(StorageBackend::Postgres, PathBuf::from("./data-local"));
    let result = Storage::connect(&config).await;
    assert!(matches!(result, Err(hotdeal_db::DbError::MissingDatabaseUrl)));
}

#[tokio::test]
async fn json_store_is_usable_through_storage() {
    let dir = tempfile::tempdir().expect("tempdir");
    let storage = Storage::Json(JsonStore::new(dir.path()));
    assert!(storage.deal_by_id("missing").await.unwrap().is_none());
}
