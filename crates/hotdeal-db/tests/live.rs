//! Live integration tests for hotdeal-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/hotdeal-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use chrono::{DateTime, Duration, TimeZone, Utc};
use hotdeal_core::{Category, CrawlLog, Deal, PriceHistoryEntry};
use hotdeal_db::{
    cleanup_old_data, crawl_stats, get_deal_by_id, insert_crawl_log, insert_price_history,
    list_latest_deals, list_price_history, upsert_deals,
};

fn at(mins: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 1, 12, 0, 0).unwrap() + Duration::minutes(mins)
}

fn make_deal(id: &str, price: Option<i64>, crawled_min: i64) -> Deal {
    Deal {
        id: id.to_string(),
        title: format!("deal {id}"),
        price,
        original_price: price,
        discount_rate: 0,
        has_price: price.is_some(),
        price_text: "가격 정보 없음".to_string(),
        mall_name: "뽐뿌".to_string(),
        mall_logo: "💰".to_string(),
        category: Category::Tech,
        tags: vec!["🚚 무배".to_string()],
        url: format!("https://example.com/{id}"),
        description: String::new(),
        pub_date: at(crawled_min),
        source: "RSS-뽐뿌".to_string(),
        delivery_info: "원문 확인".to_string(),
        crawled_at: at(crawled_min),
    }
}

#[sqlx::test(migrations = "../../migrations")]
async fn upsert_deals_overwrites_by_id(pool: sqlx::PgPool) {
    upsert_deals(&pool, &[make_deal("ppomppu-1", Some(1_000), 0)])
        .await
        .expect("first upsert");

    let mut changed = make_deal("ppomppu-1", Some(800), 10);
    changed.title = "changed".to_string();
    upsert_deals(&pool, &[changed]).await.expect("second upsert");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM deals")
        .fetch_one(&pool)
        .await
        .expect("count");
    assert_eq!(count, 1);

    let deal = get_deal_by_id(&pool, "ppomppu-1")
        .await
        .expect("query")
        .expect("deal exists");
    assert_eq!(deal.title, "changed");
    assert_eq!(deal.price, Some(800));
    assert_eq!(deal.category, Category::Tech);
    assert_eq!(deal.tags, vec!["🚚 무배"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_latest_deals_orders_priced_first(pool: sqlx::PgPool) {
    upsert_deals(
        &pool,
        &[
            make_deal("a-1", Some(1_000), 0),
            make_deal("a-2", None, 30),
            make_deal("a-3", Some(2_000), 20),
        ],
    )
    .await
    .expect("upsert");

    let ids: Vec<_> = list_latest_deals(&pool, 10)
        .await
        .expect("list")
        .into_iter()
        .map(|d| d.id)
        .collect();
    assert_eq!(ids, vec!["a-3", "a-1", "a-2"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_deal_by_id_missing_is_none(pool: sqlx::PgPool) {
    assert!(get_deal_by_id(&pool, "nope").await.expect("query").is_none());
}

#[sqlx::test(migrations = "../../migrations")]
async fn price_history_newest_first(pool: sqlx::PgPool) {
    upsert_deals(&pool, &[make_deal("a-1", Some(1_000), 0)])
        .await
        .expect("upsert");

    let entry = |price: i64, min: i64| PriceHistoryEntry {
        deal_id: "a-1".to_string(),
        price: Some(price),
        original_price: Some(price),
        discount_rate: 0,
        crawled_at: at(min),
    };
    insert_price_history(&pool, &[entry(1_000, 0), entry(900, 10)])
        .await
        .expect("insert history");

    let history = list_price_history(&pool, "a-1", 30).await.expect("list");
    let prices: Vec<_> = history.iter().map(|h| h.price).collect();
    assert_eq!(prices, vec![Some(900), Some(1_000)]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn crawl_stats_and_cleanup(pool: sqlx::PgPool) {
    for (success, items, min) in [(true, 15, 0), (false, 0, 10), (true, 12, -600)] {
        insert_crawl_log(
            &pool,
            &CrawlLog {
                source: "뽐뿌".to_string(),
                success,
                items_count: items,
                error_message: (!success).then(|| "boom".to_string()),
                crawled_at: at(min),
            },
        )
        .await
        .expect("insert log");
    }

    let stats = crawl_stats(&pool, at(-60)).await.expect("stats");
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].total_crawls, 2);
    assert_eq!(stats[0].successful_crawls, 1);
    assert_eq!(stats[0].total_items, 15);
    assert_eq!(stats[0].last_crawl, Some(at(10)));

    let report = cleanup_old_data(&pool, at(-60)).await.expect("cleanup");
    assert_eq!(report.logs_deleted, 1);
    assert_eq!(report.history_deleted, 0);
}
